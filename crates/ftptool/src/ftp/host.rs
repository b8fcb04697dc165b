//! `FtpHost` wraps a logged-in transport with the client-side state it
//! lacks, namely the cached working directory and the file-name transform
//! applied before proxies are created.

use crate::ftp::client::FtpClient;
use crate::ftp::error::FtpResult;
use crate::ftp::paths::posix_join;
use crate::ftp::proxy::FileProxy;
use crate::ftp::transport::FtpTransport;
use crate::ftp::types::{ExtensionMap, FtpConnectionConfig};
use crate::ftp::walk::RemoteWalk;
use std::sync::Arc;

/// Maps a requested file name to the name actually used on the server.
pub type PathTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A remote host reached through an [`FtpTransport`].
pub struct FtpHost<T: FtpTransport = FtpClient> {
    transport: T,
    cwd: Option<String>,
    path_transform: Option<PathTransform>,
}

impl FtpHost<FtpClient> {
    /// Connect, log in (unless the username is empty), install the
    /// configured extension map and enter the initial directory.
    pub async fn connect(config: FtpConnectionConfig) -> FtpResult<Self> {
        let username = config.username.clone();
        let password = config.password.clone();
        let account = config.account.clone();
        let initial = config.initial_directory.clone();
        let extensions = config.extension_map.clone();

        let client = FtpClient::connect(config).await?;
        let mut host = Self::from_transport(client);
        if let Some(map) = extensions.filter(|m| !m.is_empty()) {
            host = host.with_extension_map(map);
        }
        match host
            .start_session(&username, &password, account.as_deref(), initial.as_deref())
            .await
        {
            Ok(()) => Ok(host),
            Err(e) => {
                host.try_quit().await;
                Err(e)
            }
        }
    }
}

impl<T: FtpTransport> FtpHost<T> {
    /// Wrap an already logged-in transport.
    pub fn from_transport(transport: T) -> Self {
        Self {
            transport,
            cwd: None,
            path_transform: None,
        }
    }

    /// Log in (unless `username` is empty) and enter `initial`. The caller
    /// ends the session if this fails.
    async fn start_session(
        &mut self,
        username: &str,
        password: &str,
        account: Option<&str>,
        initial: Option<&str>,
    ) -> FtpResult<()> {
        if !username.is_empty() {
            self.transport.login(username, password, account).await?;
        }
        if let Some(dir) = initial.filter(|d| !d.is_empty()) {
            self.set_current_directory(dir).await?;
        }
        Ok(())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Direct access to the transport. Directory changes made through it
    /// bypass the working-directory cache; call
    /// [`set_current_directory`](Self::set_current_directory) instead.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Install a file-name transform applied by [`file_proxy`](Self::file_proxy).
    pub fn with_path_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.path_transform = Some(Arc::new(transform));
        self
    }

    /// Rewrite file extensions through `map` before proxies are created.
    pub fn with_extension_map(self, map: ExtensionMap) -> Self {
        self.with_path_transform(move |name| map.apply(name))
    }

    // ─── Working directory ───────────────────────────────────────

    /// The cached working directory, querying the server only when the
    /// cache is empty.
    pub async fn current_directory(&mut self) -> FtpResult<String> {
        if let Some(cwd) = &self.cwd {
            return Ok(cwd.clone());
        }
        let cwd = self.transport.current_directory().await?;
        log::debug!("working directory is {}", cwd);
        self.cwd = Some(cwd.clone());
        Ok(cwd)
    }

    /// The cached working directory without touching the network.
    pub fn cached_directory(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    /// `CWD path` followed by `PWD`; the server's answer becomes the cached
    /// working directory. A rejected `CWD` leaves the cache untouched.
    pub async fn set_current_directory(&mut self, path: &str) -> FtpResult<()> {
        self.transport.change_directory(path).await?;
        match self.transport.current_directory().await {
            Ok(cwd) => {
                log::debug!("changed directory to {}", cwd);
                self.cwd = Some(cwd);
                Ok(())
            }
            Err(e) => {
                self.cwd = None;
                Err(e)
            }
        }
    }

    /// Resolve a file name to the absolute path a proxy would bind to.
    pub async fn resolve_path(&mut self, name: &str) -> FtpResult<String> {
        let effective = match &self.path_transform {
            Some(transform) => transform(name),
            None => name.to_string(),
        };
        if effective.starts_with('/') {
            return Ok(effective);
        }
        let cwd = self.current_directory().await?;
        Ok(posix_join(&cwd, &effective))
    }

    /// A transfer handle for `name`. Relative names are taken relative to
    /// the working directory.
    pub async fn file_proxy(&mut self, name: &str) -> FtpResult<FileProxy<'_, T>> {
        let path = self.resolve_path(name).await?;
        Ok(FileProxy::new(&mut self.transport, path))
    }

    /// Start a fresh depth-first walk below `root`.
    pub fn walk(&self, root: &str) -> RemoteWalk {
        RemoteWalk::new(root)
    }

    // ─── Session end ─────────────────────────────────────────────

    /// Say goodbye to the server.
    pub async fn quit(&mut self) -> FtpResult<()> {
        self.cwd = None;
        self.transport.quit().await
    }

    /// Drop the connection without `QUIT`.
    pub async fn close(&mut self) -> FtpResult<()> {
        self.cwd = None;
        self.transport.close().await
    }

    /// Attempt a polite `QUIT`, then close regardless. Never fails.
    pub async fn try_quit(&mut self) {
        if let Err(e) = self.quit().await {
            log::debug!("QUIT failed, closing: {}", e);
        }
        if let Err(e) = self.close().await {
            log::debug!("close failed: {}", e);
        }
    }
}
