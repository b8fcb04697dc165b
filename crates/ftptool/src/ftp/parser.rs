//! Unix-style `LIST` response parser.
//!
//! A line looks like `drwxr-xr-x  2 owner group 4096 Feb 24 07:23 name`.
//! The first character of the mode field decides the entry kind; the name is
//! everything after the 8th whitespace-delimited token, rejoined with single
//! spaces, so names with embedded spaces survive.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::{DirListing, FtpEntry, FtpEntryKind};

/// Tokens before the name: mode, links, owner, group, size, month, day, time/year.
const NAME_FIELD: usize = 8;

/// Parse a full listing, skipping lines that do not have the `ls -l` shape
/// (such as the leading `total N`).
pub fn parse_listing<S: AsRef<str>>(lines: &[S]) -> Vec<FtpEntry> {
    lines
        .iter()
        .map(|l| l.as_ref().trim_end_matches(['\r', '\n']))
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match parse_line(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("skipping listing line {:?}: {}", line, e.message);
                None
            }
        })
        .filter(|e| e.name != "." && e.name != "..")
        .collect()
}

/// Split a listing into directory and regular file names, in server order.
pub fn classify<S: AsRef<str>>(lines: &[S]) -> DirListing {
    DirListing::from_entries(parse_listing(lines))
}

/// Parse a single listing line.
pub fn parse_line(line: &str) -> FtpResult<FtpEntry> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() <= NAME_FIELD {
        return Err(FtpError::parse(format!(
            "expected at least {} fields, found {}",
            NAME_FIELD + 1,
            tokens.len()
        )));
    }

    let permissions = tokens[0];
    let kind = match permissions.chars().next() {
        Some('d') => FtpEntryKind::Directory,
        Some('-') => FtpEntryKind::File,
        Some('l') => FtpEntryKind::Symlink,
        _ => FtpEntryKind::Other,
    };

    let mut name = tokens[NAME_FIELD..].join(" ");
    let mut link_target = None;
    if kind == FtpEntryKind::Symlink {
        if let Some((link, target)) = name.split_once(" -> ") {
            link_target = Some(target.to_string());
            name = link.to_string();
        }
    }

    Ok(FtpEntry {
        name,
        kind,
        permissions: permissions.to_string(),
        size: tokens[4].parse().ok(),
        link_target,
        raw: line.to_string(),
    })
}
