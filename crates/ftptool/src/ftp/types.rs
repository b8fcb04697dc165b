//! Shared types for the FTP crate.

use crate::ftp::error::{FtpError, FtpResult};
use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

// ─── Connection / Session ────────────────────────────────────────────

/// How the data channel is negotiated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DataChannelMode {
    /// `PASV`: server opens a port, client connects.
    #[default]
    Passive,
    /// `EPSV`: extended passive, connects back to the control host.
    ExtendedPassive,
    /// `PORT`: client listens, server connects.
    Active,
}

/// Configuration for a single FTP connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FtpConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login name. An empty name skips the login step entirely.
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    /// Answer to a `332 Need account` reply.
    #[serde(default)]
    pub account: Option<String>,
    /// Directory to enter right after login.
    #[serde(default)]
    pub initial_directory: Option<String>,
    /// Control connection timeout in seconds (0 = wait forever).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    /// Data-channel timeout in seconds (0 = wait forever).
    #[serde(default = "default_data_timeout")]
    pub data_timeout_sec: u64,
    #[serde(default)]
    pub data_channel_mode: DataChannelMode,
    /// Local address to bind for active-mode data connections.
    #[serde(default)]
    pub active_bind_address: Option<String>,
    /// Extension rewriting applied to every file proxy name.
    #[serde(default)]
    pub extension_map: Option<ExtensionMap>,
}

fn default_port() -> u16 {
    21
}
fn default_username() -> String {
    "anonymous".into()
}
fn default_password() -> String {
    "anonymous@".into()
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_data_timeout() -> u64 {
    30
}

impl Default for FtpConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: default_username(),
            password: default_password(),
            account: None,
            initial_directory: None,
            connect_timeout_sec: default_connect_timeout(),
            data_timeout_sec: default_data_timeout(),
            data_channel_mode: DataChannelMode::Passive,
            active_bind_address: None,
            extension_map: None,
        }
    }
}

impl FtpConnectionConfig {
    /// Build a config from `ftp://[user[:password]@]host[:port][/dir]`.
    pub fn from_url(raw: &str) -> FtpResult<Self> {
        let url = Url::parse(raw)
            .map_err(|e| FtpError::configuration(format!("Invalid FTP URL '{}': {}", raw, e)))?;
        if url.scheme() != "ftp" {
            return Err(FtpError::configuration(format!(
                "Unsupported URL scheme '{}'",
                url.scheme()
            )));
        }
        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(FtpError::configuration("FTP URL has no host")),
        };

        let mut config = Self {
            host,
            port: url.port().unwrap_or(21),
            ..Self::default()
        };
        if !url.username().is_empty() {
            config.username = percent_decode(url.username())?;
            config.password = match url.password() {
                Some(p) => percent_decode(p)?,
                None => String::new(),
            };
        }
        let dir = percent_decode(url.path())?;
        if !dir.is_empty() && dir != "/" {
            config.initial_directory = Some(dir);
        }
        Ok(config)
    }
}

fn percent_decode(s: &str) -> FtpResult<String> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| FtpError::configuration(format!("URL component '{}' is not UTF-8: {}", s, e)))
}

/// Information about a connected session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpSessionInfo {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub connected: bool,
    pub server_banner: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub bytes_uploaded: u64,
    pub bytes_downloaded: u64,
}

// ─── FTP Response ────────────────────────────────────────────────────

/// A single FTP response (may be multi-line).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    /// Full response text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether the response code is not a negative reply (1xx–3xx).
    pub fn is_success(&self) -> bool {
        self.code < 400
    }

    /// Positive-preliminary reply (1xx).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Positive-completion reply (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Positive-intermediate reply (3xx).
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }
}

// ─── Directory Listing ───────────────────────────────────────────────

/// Type of a remote filesystem entry, taken from the mode indicator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FtpEntryKind {
    File,
    Directory,
    Symlink,
    /// Devices, sockets, pipes and anything else.
    Other,
}

/// One parsed line of a `LIST` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FtpEntry {
    pub name: String,
    pub kind: FtpEntryKind,
    pub permissions: String,
    pub size: Option<u64>,
    pub link_target: Option<String>,
    /// Raw line from the server.
    pub raw: String,
}

/// Classified content of one directory, in server order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirListing {
    pub subdirs: Vec<String>,
    pub files: Vec<String>,
}

impl DirListing {
    /// Keep directories and regular files; everything else is dropped.
    pub fn from_entries(entries: Vec<FtpEntry>) -> Self {
        let mut listing = Self::default();
        for entry in entries {
            match entry.kind {
                FtpEntryKind::Directory => listing.subdirs.push(entry.name),
                FtpEntryKind::File => listing.files.push(entry.name),
                FtpEntryKind::Symlink | FtpEntryKind::Other => {}
            }
        }
        listing
    }
}

/// One node produced by a tree walk.
///
/// `subdirs` may be edited by the consumer before the walk resumes; names
/// removed from it are not descended into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry<P> {
    pub path: P,
    pub subdirs: Vec<String>,
    pub files: Vec<String>,
}

impl<P> WalkEntry<P> {
    /// Drop every subdirectory and file whose name starts with a dot.
    pub fn retain_visible(&mut self) {
        self.subdirs.retain(|d| !d.starts_with('.'));
        self.files.retain(|f| !f.starts_with('.'));
    }
}

// ─── Mirroring ───────────────────────────────────────────────────────

/// What to do when creating a directory fails during mkdir-style
/// best-effort operations (`makedirs`, mirror directory creation).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DirConflictPolicy {
    /// Log the rejection and continue.
    #[default]
    Ignore,
    /// Return the server's rejection to the caller.
    Propagate,
}

/// Options for [`FtpHost::mirror_to_remote`](crate::ftp::FtpHost::mirror_to_remote).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MirrorOptions {
    /// Create the destination directory (and its parents) first.
    #[serde(default)]
    pub create_destination: bool,
    /// Neither upload nor descend into entries whose name starts with a dot.
    #[serde(default = "default_true")]
    pub ignore_dotfiles: bool,
    #[serde(default)]
    pub on_directory_error: DirConflictPolicy,
}

fn default_true() -> bool {
    true
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            create_destination: false,
            ignore_dotfiles: true,
            on_directory_error: DirConflictPolicy::Ignore,
        }
    }
}

/// Counters reported by a finished mirror run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MirrorSummary {
    pub directories_created: u64,
    pub files_transferred: u64,
    pub bytes_transferred: u64,
}

// ─── Extension mapping ───────────────────────────────────────────────

/// Rewrites file extensions before a file proxy is created.
///
/// Keys and values carry no leading dot. An empty value drops the extension
/// (`"notes.txt"` with `txt → ""` becomes `"notes"`). When several keys
/// match, the longest one wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ExtensionMap(BTreeMap<String, String>);

impl ExtensionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.0.insert(from.into(), to.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply the mapping to `filename`.
    pub fn apply(&self, filename: &str) -> String {
        let best = self
            .0
            .iter()
            .filter(|(ext, _)| {
                filename
                    .strip_suffix(ext.as_str())
                    .is_some_and(|stem| stem.ends_with('.'))
            })
            .max_by_key(|(ext, _)| ext.len());

        match best {
            None => filename.to_string(),
            Some((ext, new_ext)) => {
                let stem = &filename[..filename.len() - ext.len() - 1];
                if new_ext.is_empty() {
                    stem.to_string()
                } else {
                    format!("{}.{}", stem, new_ext)
                }
            }
        }
    }
}
