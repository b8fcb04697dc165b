//! Client-style file operations: get, put, delete and their batch forms.
//!
//! Batch forms stop at the first failure; files handled before it stay
//! transferred (or deleted).

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::host::FtpHost;
use crate::ftp::paths::posix_basename;
use crate::ftp::transport::FtpTransport;
use std::path::Path;

impl<T: FtpTransport> FtpHost<T> {
    /// Download `remote` to the local file `local`.
    pub async fn get(&mut self, remote: &str, local: &Path) -> FtpResult<u64> {
        self.file_proxy(remote).await?.download_to_file(local).await
    }

    /// Upload the local file `local` to `remote`.
    pub async fn put(&mut self, local: &Path, remote: &str) -> FtpResult<u64> {
        self.file_proxy(remote).await?.upload_from_file(local).await
    }

    /// Delete a remote file.
    pub async fn delete(&mut self, remote: &str) -> FtpResult<()> {
        self.file_proxy(remote).await?.delete().await
    }

    /// Download each remote file into `local_dir` under its base name.
    pub async fn mget<S: AsRef<str>>(&mut self, remotes: &[S], local_dir: &Path) -> FtpResult<Vec<u64>> {
        let mut sizes = Vec::with_capacity(remotes.len());
        for remote in remotes {
            let remote = remote.as_ref();
            let local = local_dir.join(posix_basename(remote));
            sizes.push(self.get(remote, &local).await?);
        }
        Ok(sizes)
    }

    /// Upload each local file under its base name, relative to the working
    /// directory.
    pub async fn mput<P: AsRef<Path>>(&mut self, locals: &[P]) -> FtpResult<Vec<u64>> {
        let mut sizes = Vec::with_capacity(locals.len());
        for local in locals {
            let local = local.as_ref();
            let name = local_basename(local)?;
            sizes.push(self.put(local, &name).await?);
        }
        Ok(sizes)
    }

    /// Delete each remote file.
    pub async fn mdelete<S: AsRef<str>>(&mut self, remotes: &[S]) -> FtpResult<()> {
        for remote in remotes {
            self.delete(remote.as_ref()).await?;
        }
        Ok(())
    }
}

fn local_basename(local: &Path) -> FtpResult<String> {
    local
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            FtpError::configuration(format!(
                "'{}' has no usable file name",
                local.display()
            ))
        })
}
