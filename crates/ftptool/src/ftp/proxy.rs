//! File transfer proxy: a handle bound to one absolute remote path.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::paths::{posix_basename, posix_dirname, posix_join};
use crate::ftp::transport::FtpTransport;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

/// Transfers, deletes and renames a single remote file.
///
/// The proxy borrows the session mutably, so no other command can be issued
/// on the connection while it is alive.
pub struct FileProxy<'a, T: FtpTransport> {
    transport: &'a mut T,
    path: String,
}

impl<'a, T: FtpTransport> FileProxy<'a, T> {
    pub fn new(transport: &'a mut T, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
        }
    }

    /// The remote path this proxy is bound to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final component of the remote path.
    pub fn name(&self) -> &str {
        posix_basename(&self.path)
    }

    // ─── Streaming ───────────────────────────────────────────────

    /// Store everything `source` yields under this path.
    pub async fn upload(&mut self, source: &mut (dyn AsyncRead + Unpin + Send)) -> FtpResult<u64> {
        let n = self.transport.store(&self.path, source).await?;
        log::debug!("uploaded {} ({} bytes)", self.path, n);
        Ok(n)
    }

    /// Stream the remote file into `sink`.
    pub async fn download(&mut self, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> FtpResult<u64> {
        let n = self.transport.retrieve(&self.path, sink).await?;
        log::debug!("downloaded {} ({} bytes)", self.path, n);
        Ok(n)
    }

    // ─── Buffers ─────────────────────────────────────────────────

    /// Upload an in-memory buffer. Not meant for very large payloads.
    pub async fn upload_from_bytes(&mut self, data: &[u8]) -> FtpResult<u64> {
        let mut source = data;
        self.upload(&mut source).await
    }

    /// Download the whole file into memory.
    pub async fn download_to_bytes(&mut self) -> FtpResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.download(&mut buf).await?;
        Ok(buf)
    }

    // ─── Local files ─────────────────────────────────────────────

    /// Upload the contents of a local file. The file is closed when this
    /// returns, whatever the outcome.
    pub async fn upload_from_file(&mut self, local: &Path) -> FtpResult<u64> {
        let file = File::open(local)
            .await
            .map_err(|e| FtpError::local_io(local, e))?;
        let mut reader = BufReader::new(file);
        self.upload(&mut reader)
            .await
            .map_err(|e| e.with_local_path(local))
    }

    /// Download into a local file, creating or truncating it.
    pub async fn download_to_file(&mut self, local: &Path) -> FtpResult<u64> {
        let file = File::create(local)
            .await
            .map_err(|e| FtpError::local_io(local, e))?;
        let mut writer = BufWriter::new(file);
        let n = self
            .download(&mut writer)
            .await
            .map_err(|e| e.with_local_path(local))?;
        writer
            .flush()
            .await
            .map_err(|e| FtpError::local_io(local, e))?;
        Ok(n)
    }

    // ─── Remote file management ──────────────────────────────────

    /// `DELE` the remote file.
    pub async fn delete(&mut self) -> FtpResult<()> {
        self.transport.delete(&self.path).await?;
        log::debug!("deleted {}", self.path);
        Ok(())
    }

    /// Rename within the same remote directory and return a proxy bound to
    /// the new path. `new_name` is joined onto this file's directory, not
    /// onto the session's working directory.
    pub async fn rename(self, new_name: &str) -> FtpResult<FileProxy<'a, T>> {
        let target = posix_join(posix_dirname(&self.path), new_name);
        self.transport.rename(&self.path, &target).await?;
        log::debug!("renamed {} to {}", self.path, target);
        Ok(FileProxy {
            transport: self.transport,
            path: target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftp::transport::SimulatedTransport;
    use tempfile::TempDir;

    fn sim() -> SimulatedTransport {
        let mut sim = SimulatedTransport::new();
        sim.add_file("/pub/test.txt", "Hello world!").add_dir("/other");
        sim
    }

    #[tokio::test]
    async fn bytes_round_trip() {
        let mut sim = sim();
        let mut proxy = FileProxy::new(&mut sim, "/pub/test.txt");
        assert_eq!(proxy.name(), "test.txt");
        assert_eq!(proxy.download_to_bytes().await.unwrap(), b"Hello world!");
        proxy.upload_from_bytes(b"replaced").await.unwrap();
        assert_eq!(sim.file_contents("/pub/test.txt"), Some(&b"replaced"[..]));
    }

    #[tokio::test]
    async fn local_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("copy.txt");
        let mut sim = sim();

        let mut proxy = FileProxy::new(&mut sim, "/pub/test.txt");
        assert_eq!(proxy.download_to_file(&local).await.unwrap(), 12);
        assert_eq!(std::fs::read(&local).unwrap(), b"Hello world!");

        let mut proxy = FileProxy::new(&mut sim, "/other/up.txt");
        proxy.upload_from_file(&local).await.unwrap();
        assert_eq!(sim.file_contents("/other/up.txt"), Some(&b"Hello world!"[..]));
    }

    #[tokio::test]
    async fn missing_local_file_is_a_local_error() {
        let dir = TempDir::new().unwrap();
        let mut sim = sim();
        let mut proxy = FileProxy::new(&mut sim, "/pub/x");
        let err = proxy
            .upload_from_file(&dir.path().join("absent"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::ftp::FtpErrorKind::LocalIo);
        assert!(sim.commands().is_empty());
    }

    #[tokio::test]
    async fn rename_stays_in_parent_directory() {
        let mut sim = sim();
        sim.change_directory("/other").await.unwrap();
        let proxy = FileProxy::new(&mut sim, "/pub/test.txt");
        let renamed = proxy.rename("new.txt").await.unwrap();
        assert_eq!(renamed.path(), "/pub/new.txt");
        assert!(sim.exists("/pub/new.txt"));
        assert!(!sim.exists("/pub/test.txt"));
    }

    #[tokio::test]
    async fn delete_reports_rejection() {
        let mut sim = sim();
        let mut proxy = FileProxy::new(&mut sim, "/pub/test.txt");
        proxy.delete().await.unwrap();
        let err = proxy.delete().await.unwrap_err();
        assert_eq!(err.code, Some(550));
        assert_eq!(err.command.as_deref(), Some("DELE /pub/test.txt"));
    }
}
