//! Directory operations: mkdir, listdir, makedirs.

use crate::ftp::error::{FtpError, FtpErrorKind, FtpResult};
use crate::ftp::host::FtpHost;
use crate::ftp::parser;
use crate::ftp::paths::accumulated_prefixes;
use crate::ftp::transport::FtpTransport;
use crate::ftp::types::{DirConflictPolicy, DirListing};

impl<T: FtpTransport> FtpHost<T> {
    // ─── MKD ─────────────────────────────────────────────────────

    /// Create a single remote directory.
    pub async fn mkdir(&mut self, path: &str) -> FtpResult<()> {
        self.transport_mut().make_directory(path).await
    }

    // ─── LIST ────────────────────────────────────────────────────

    /// Subdirectories and regular files of `path`, relative to the working
    /// directory (an empty path lists the working directory itself).
    pub async fn listdir(&mut self, path: &str) -> FtpResult<DirListing> {
        let lines = self.transport_mut().list_entries(path).await?;
        Ok(parser::classify(&lines))
    }

    // ─── makedirs ────────────────────────────────────────────────

    /// Ensure every segment of `path` exists, ignoring segments that cannot
    /// be created.
    pub async fn makedirs(&mut self, path: &str) -> FtpResult<()> {
        self.makedirs_with(path, DirConflictPolicy::Ignore).await
    }

    /// Ensure every segment of `path` exists.
    ///
    /// A `CWD` probe detects a path that already exists; the working
    /// directory is restored afterwards whether or not the probe succeeded.
    /// Otherwise each accumulated prefix is created root to leaf and
    /// per-segment failures are handled according to `policy`.
    pub async fn makedirs_with(&mut self, path: &str, policy: DirConflictPolicy) -> FtpResult<()> {
        let saved = self.current_directory().await?;
        let probe = self.set_current_directory(path).await;
        let restored = self.set_current_directory(&saved).await;

        match probe {
            Ok(()) => return restored,
            Err(e) if e.kind == FtpErrorKind::RemoteOperation => restored?,
            Err(e) => return Err(e),
        }

        for prefix in accumulated_prefixes(path) {
            if let Err(e) = self.transport_mut().make_directory(&prefix).await {
                directory_error(policy, &prefix, e)?;
            }
        }
        Ok(())
    }
}

/// Apply `policy` to a failed directory creation.
pub(crate) fn directory_error(
    policy: DirConflictPolicy,
    path: &str,
    err: FtpError,
) -> FtpResult<()> {
    match policy {
        DirConflictPolicy::Propagate => Err(err),
        DirConflictPolicy::Ignore if err.kind == FtpErrorKind::RemoteOperation => {
            log::debug!("ignoring failure to create {}: {}", path, err);
            Ok(())
        }
        DirConflictPolicy::Ignore => Err(err),
    }
}
