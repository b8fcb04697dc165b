//! Depth-first tree walks with consumer-prunable subdirectory lists.
//!
//! Both walkers are cursors: `next()` lends the current node mutably, and
//! its (possibly edited) `subdirs` are only scheduled for descent when
//! `next()` is called again. Removing a name from `subdirs` therefore stops
//! the walk from entering that directory.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::host::FtpHost;
use crate::ftp::paths::posix_join;
use crate::ftp::transport::FtpTransport;
use crate::ftp::types::WalkEntry;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ─── Remote ──────────────────────────────────────────────────────────

/// Walk of a remote tree, parent before children, subdirectories in the
/// order the server lists them. One `LIST` per visited directory; nothing
/// is cached between walks. Symbolic-link cycles are not detected.
#[derive(Debug)]
pub struct RemoteWalk {
    pending: Vec<String>,
    current: Option<WalkEntry<String>>,
}

impl RemoteWalk {
    pub fn new(root: &str) -> Self {
        Self {
            pending: vec![root.to_string()],
            current: None,
        }
    }

    /// Advance to the next directory, or `None` once the tree is exhausted.
    pub async fn next<T: FtpTransport>(
        &mut self,
        host: &mut FtpHost<T>,
    ) -> FtpResult<Option<&mut WalkEntry<String>>> {
        if let Some(prev) = self.current.take() {
            self.pending
                .extend(prev.subdirs.iter().rev().map(|d| posix_join(&prev.path, d)));
        }
        let Some(path) = self.pending.pop() else {
            return Ok(None);
        };

        let listing = host.listdir(&path).await?;
        log::trace!(
            "walk {}: {} dirs, {} files",
            path,
            listing.subdirs.len(),
            listing.files.len()
        );
        self.current = Some(WalkEntry {
            path,
            subdirs: listing.subdirs,
            files: listing.files,
        });
        Ok(self.current.as_mut())
    }
}

// ─── Local ───────────────────────────────────────────────────────────

/// The same walk over the local filesystem.
///
/// Names are sorted. Symbolic links to directories appear in `subdirs` but
/// are never descended into. Entries whose names are not valid UTF-8 are
/// skipped, and so are subdirectories that cannot be read. Only a failure
/// to read the root is an error.
#[derive(Debug)]
pub struct LocalWalk {
    pending: Vec<PathBuf>,
    current: Option<WalkEntry<PathBuf>>,
    linked_dirs: HashSet<String>,
    below_root: bool,
}

impl LocalWalk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            pending: vec![root.into()],
            current: None,
            linked_dirs: HashSet::new(),
            below_root: false,
        }
    }

    pub async fn next(&mut self) -> FtpResult<Option<&mut WalkEntry<PathBuf>>> {
        if let Some(prev) = self.current.take() {
            let linked = std::mem::take(&mut self.linked_dirs);
            self.pending.extend(
                prev.subdirs
                    .iter()
                    .rev()
                    .filter(|d| !linked.contains(*d))
                    .map(|d| prev.path.join(d)),
            );
        }
        loop {
            let Some(path) = self.pending.pop() else {
                return Ok(None);
            };
            match read_local_dir(&path).await {
                Ok((subdirs, files, linked)) => {
                    self.below_root = true;
                    self.linked_dirs = linked;
                    self.current = Some(WalkEntry {
                        path,
                        subdirs,
                        files,
                    });
                    return Ok(self.current.as_mut());
                }
                Err(e) if self.below_root => {
                    log::warn!("skipping unreadable directory {}: {}", path.display(), e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn read_local_dir(path: &Path) -> FtpResult<(Vec<String>, Vec<String>, HashSet<String>)> {
    let mut reader = tokio::fs::read_dir(path)
        .await
        .map_err(|e| FtpError::local_io(path, e))?;

    let mut subdirs = Vec::new();
    let mut files = Vec::new();
    let mut linked = HashSet::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| FtpError::local_io(path, e))?
    {
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                log::warn!("skipping non-UTF-8 entry {:?} in {}", raw, path.display());
                continue;
            }
        };
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| FtpError::local_io(&entry.path(), e))?;

        if file_type.is_dir() {
            subdirs.push(name);
        } else if file_type.is_symlink() {
            // Follow the link only to classify it.
            match tokio::fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_dir() => {
                    linked.insert(name.clone());
                    subdirs.push(name);
                }
                _ => files.push(name),
            }
        } else {
            files.push(name);
        }
    }
    subdirs.sort();
    files.sort();
    Ok((subdirs, files, linked))
}
