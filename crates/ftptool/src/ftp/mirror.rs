//! One-way, additive tree mirroring between the local filesystem and the
//! remote host. Nothing is ever deleted on the destination side, and a
//! failure part-way leaves whatever was already copied in place.

use crate::ftp::directory::directory_error;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::host::FtpHost;
use crate::ftp::paths::{
    has_dot_segment, local_to_remote_relative, posix_join, remote_relative, remote_to_local,
    trim_trailing_slashes,
};
use crate::ftp::transport::FtpTransport;
use crate::ftp::types::{MirrorOptions, MirrorSummary};
use crate::ftp::walk::{LocalWalk, RemoteWalk};
use std::path::Path;

impl<T: FtpTransport> FtpHost<T> {
    /// Download the remote tree at `source` into the local directory `dest`.
    ///
    /// `dest` is created if missing. Local directories that already exist
    /// are reused and local files are overwritten.
    pub async fn mirror_to_local(&mut self, source: &str, dest: &Path) -> FtpResult<MirrorSummary> {
        let source = trim_trailing_slashes(source).to_string();
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| FtpError::local_io(dest, e))?;

        let mut summary = MirrorSummary::default();
        let mut walk = RemoteWalk::new(&source);
        while let Some(entry) = walk.next(&mut *self).await? {
            let local_dir = remote_to_local(dest, remote_relative(&source, &entry.path));

            for subdir in &entry.subdirs {
                let target = local_dir.join(subdir);
                let exists = tokio::fs::try_exists(&target)
                    .await
                    .map_err(|e| FtpError::local_io(&target, e))?;
                if !exists {
                    tokio::fs::create_dir(&target)
                        .await
                        .map_err(|e| FtpError::local_io(&target, e))?;
                    summary.directories_created += 1;
                }
            }

            for file in &entry.files {
                let remote = posix_join(&entry.path, file);
                let local = local_dir.join(file);
                let n = self
                    .file_proxy(&remote)
                    .await?
                    .download_to_file(&local)
                    .await?;
                summary.files_transferred += 1;
                summary.bytes_transferred += n;
            }
        }

        log::info!(
            "mirrored {} to {}: {} dirs, {} files, {} bytes",
            if source.is_empty() { "." } else { source.as_str() },
            dest.display(),
            summary.directories_created,
            summary.files_transferred,
            summary.bytes_transferred
        );
        Ok(summary)
    }

    /// Upload the local tree at `source` to the remote directory `dest`.
    ///
    /// Directory creation failures follow `options.on_directory_error`;
    /// upload failures always propagate. With `ignore_dotfiles`, dot-named
    /// entries are neither uploaded nor descended into, and a destination
    /// containing a dot-named segment is refused before any command is sent.
    pub async fn mirror_to_remote(
        &mut self,
        source: &Path,
        dest: &str,
        options: MirrorOptions,
    ) -> FtpResult<MirrorSummary> {
        let dest = trim_trailing_slashes(dest).to_string();
        if options.ignore_dotfiles && has_dot_segment(&dest) {
            return Err(FtpError::configuration(format!(
                "Destination '{}' contains a dot-named segment while dotfiles are ignored",
                dest
            )));
        }

        let policy = options.on_directory_error;
        if options.create_destination && !dest.is_empty() {
            if let Err(e) = self.makedirs_with(&dest, policy).await {
                directory_error(policy, &dest, e)?;
            }
        }

        let root = if source.as_os_str().is_empty() {
            Path::new(".")
        } else {
            source
        };

        let mut summary = MirrorSummary::default();
        let mut walk = LocalWalk::new(root);
        while let Some(entry) = walk.next().await? {
            if options.ignore_dotfiles {
                entry.retain_visible();
            }
            let remote_dir = posix_join(&dest, &local_to_remote_relative(root, &entry.path));

            for subdir in &entry.subdirs {
                let target = posix_join(&remote_dir, subdir);
                match self.mkdir(&target).await {
                    Ok(()) => summary.directories_created += 1,
                    Err(e) => directory_error(policy, &target, e)?,
                }
            }

            for file in &entry.files {
                let remote = posix_join(&remote_dir, file);
                let local = entry.path.join(file);
                let n = self
                    .file_proxy(&remote)
                    .await?
                    .upload_from_file(&local)
                    .await?;
                summary.files_transferred += 1;
                summary.bytes_transferred += n;
            }
        }

        log::info!(
            "mirrored {} to {}: {} dirs, {} files, {} bytes",
            root.display(),
            if dest.is_empty() { "." } else { dest.as_str() },
            summary.directories_created,
            summary.files_transferred,
            summary.bytes_transferred
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftp::transport::SimulatedTransport;
    use crate::ftp::types::DirConflictPolicy;
    use tempfile::TempDir;

    #[tokio::test]
    async fn mirror_to_local_maps_directories() {
        let mut sim = SimulatedTransport::new();
        sim.add_file("/site/index.html", "<html/>")
            .add_file("/site/img/logo.png", vec![0u8, 1, 2])
            .add_dir("/site/empty");
        let mut host = FtpHost::from_transport(sim);
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("copy");

        let summary = host.mirror_to_local("/site/", &dest).await.unwrap();
        assert_eq!(summary.files_transferred, 2);
        assert_eq!(summary.bytes_transferred, 10);
        assert_eq!(std::fs::read(dest.join("index.html")).unwrap(), b"<html/>");
        assert_eq!(std::fs::read(dest.join("img").join("logo.png")).unwrap(), [0, 1, 2]);
        assert!(dest.join("empty").is_dir());
    }

    #[tokio::test]
    async fn mirror_to_local_reuses_existing_directories() {
        let mut sim = SimulatedTransport::new();
        sim.add_file("/img/logo.png", "png");
        let mut host = FtpHost::from_transport(sim);
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("img")).unwrap();

        let summary = host.mirror_to_local("/", dir.path()).await.unwrap();
        assert_eq!(summary.directories_created, 0);
        assert_eq!(std::fs::read(dir.path().join("img/logo.png")).unwrap(), b"png");
    }

    #[tokio::test]
    async fn dotted_destination_is_refused_up_front() {
        let dir = TempDir::new().unwrap();
        let mut host = FtpHost::from_transport(SimulatedTransport::new());
        let err = host
            .mirror_to_remote(dir.path(), "/srv/.cache/www", MirrorOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::ftp::FtpErrorKind::Configuration);
        assert!(host.transport().commands().is_empty());
    }

    #[tokio::test]
    async fn dotted_destination_allowed_without_filtering() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "x").unwrap();
        let mut sim = SimulatedTransport::new();
        sim.add_dir("/.cache");
        let mut host = FtpHost::from_transport(sim);
        let options = MirrorOptions {
            ignore_dotfiles: false,
            ..Default::default()
        };
        host.mirror_to_remote(dir.path(), "/.cache", options).await.unwrap();
        assert_eq!(host.transport().file_contents("/.cache/.env"), Some(&b"x"[..]));
    }

    #[tokio::test]
    async fn existing_remote_directories_follow_policy() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.txt"), "a").unwrap();
        let mut sim = SimulatedTransport::new();
        sim.add_dir("/dest/sub");
        let mut host = FtpHost::from_transport(sim);

        let summary = host
            .mirror_to_remote(dir.path(), "/dest", MirrorOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.directories_created, 0);
        assert_eq!(summary.files_transferred, 1);

        let strict = MirrorOptions {
            on_directory_error: DirConflictPolicy::Propagate,
            ..Default::default()
        };
        let err = host.mirror_to_remote(dir.path(), "/dest", strict).await.unwrap_err();
        assert_eq!(err.command.as_deref(), Some("MKD /dest/sub"));
    }

    #[tokio::test]
    async fn create_destination_builds_missing_parents() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), "f").unwrap();
        let mut host = FtpHost::from_transport(SimulatedTransport::new());
        let options = MirrorOptions {
            create_destination: true,
            ..Default::default()
        };
        host.mirror_to_remote(dir.path(), "/srv/www/", options).await.unwrap();
        assert_eq!(host.transport().file_contents("/srv/www/f.txt"), Some(&b"f"[..]));
    }
}
