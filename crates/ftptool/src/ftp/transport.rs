//! FTP transport abstraction.
//!
//! `FtpHost` only ever talks to the server through the [`FtpTransport`]
//! trait: a raw, stateless-looking set of primitives (CWD, PWD, MKD, LIST,
//! RETR, STOR, ...). [`FtpClient`](crate::ftp::FtpClient) implements it over
//! a real control connection; [`SimulatedTransport`] implements it over an
//! in-memory tree and records every command it receives.

use crate::ftp::error::{mask_command, FtpError, FtpResult};
use crate::ftp::paths::{posix_basename, posix_dirname, posix_join};
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Transport trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Primitive FTP session operations.
///
/// Every method takes `&mut self`: a control connection carries one
/// command at a time. Negative replies surface as `RemoteOperation`
/// errors carrying the server's reply.
#[async_trait::async_trait]
pub trait FtpTransport: Send {
    /// `USER` / `PASS` / `ACCT`.
    async fn login(&mut self, user: &str, password: &str, account: Option<&str>) -> FtpResult<()>;

    /// `CWD path`.
    async fn change_directory(&mut self, path: &str) -> FtpResult<()>;

    /// `PWD`, returning the quoted path from the reply.
    async fn current_directory(&mut self) -> FtpResult<String>;

    /// `MKD path`.
    async fn make_directory(&mut self, path: &str) -> FtpResult<()>;

    /// `LIST [path]`, returning raw listing lines. An empty path lists the
    /// working directory.
    async fn list_entries(&mut self, path: &str) -> FtpResult<Vec<String>>;

    /// `RETR path`, streaming the file into `sink`. Returns bytes written.
    async fn retrieve(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> FtpResult<u64>;

    /// `STOR path`, streaming `source` to the server. Returns bytes sent.
    async fn store(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> FtpResult<u64>;

    /// `DELE path`.
    async fn delete(&mut self, path: &str) -> FtpResult<()>;

    /// `RNFR from` + `RNTO to`.
    async fn rename(&mut self, from: &str, to: &str) -> FtpResult<()>;

    /// `QUIT`; the session is closed afterwards.
    async fn quit(&mut self) -> FtpResult<()>;

    /// Drop the connection without saying goodbye.
    async fn close(&mut self) -> FtpResult<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Simulated transport (for testing & offline use)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
enum SimNode {
    /// Child names in creation order.
    Dir(Vec<String>),
    File(Vec<u8>),
    Symlink(String),
}

/// An in-memory FTP server useful for unit tests and demos.
///
/// Paths are resolved against a simulated working directory, `..` and `.`
/// included. Listings come back as Unix `ls -l` lines preceded by a
/// `total N` line.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    nodes: HashMap<String, SimNode>,
    /// CWD into the key lands in the value (server-side normalisation).
    aliases: HashMap<String, String>,
    cwd: String,
    user: Option<String>,
    commands: Vec<String>,
    closed: bool,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    /// An empty server with only `/`.
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert("/".to_string(), SimNode::Dir(Vec::new()));
        Self {
            nodes,
            aliases: HashMap::new(),
            cwd: "/".into(),
            user: None,
            commands: Vec::new(),
            closed: false,
        }
    }

    // ─── Fixture builders ────────────────────────────────────────

    /// Create a directory and any missing parents.
    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        let abs = self.resolve(path);
        self.ensure_dir(&abs);
        self
    }

    /// Create (or replace) a file, creating missing parent directories.
    pub fn add_file(&mut self, path: &str, contents: impl Into<Vec<u8>>) -> &mut Self {
        let abs = self.resolve(path);
        self.ensure_dir(posix_dirname(&abs));
        self.insert_node(&abs, SimNode::File(contents.into()));
        self
    }

    /// Create a symbolic link entry (listed with an `l` mode indicator).
    pub fn add_symlink(&mut self, path: &str, target: &str) -> &mut Self {
        let abs = self.resolve(path);
        self.ensure_dir(posix_dirname(&abs));
        self.insert_node(&abs, SimNode::Symlink(target.to_string()));
        self
    }

    /// Make `CWD path` land in `real`, so `PWD` reports `real`.
    pub fn add_alias(&mut self, path: &str, real: &str) -> &mut Self {
        let abs = self.resolve(path);
        let real = self.resolve(real);
        self.ensure_dir(&real);
        self.aliases.insert(abs, real);
        self
    }

    // ─── Inspection ──────────────────────────────────────────────

    /// Every command received so far, in order (`PASS` masked).
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn file_contents(&self, path: &str) -> Option<&[u8]> {
        match self.nodes.get(&self.resolve(path)) {
            Some(SimNode::File(data)) => Some(data),
            _ => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(&self.resolve(path))
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.nodes.get(&self.resolve(path)), Some(SimNode::Dir(_)))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn logged_in_user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Absolute paths of every stored file, sorted.
    pub fn file_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, n)| matches!(n, SimNode::File(_)))
            .map(|(p, _)| p.clone())
            .collect();
        paths.sort();
        paths
    }

    // ─── Internals ───────────────────────────────────────────────

    /// Resolve `path` against the working directory into a normalised
    /// absolute path.
    fn resolve(&self, path: &str) -> String {
        let joined = posix_join(&self.cwd, path);
        let mut parts: Vec<&str> = Vec::new();
        for seg in joined.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        format!("/{}", parts.join("/"))
    }

    fn ensure_dir(&mut self, abs: &str) {
        if matches!(self.nodes.get(abs), Some(SimNode::Dir(_))) {
            return;
        }
        let parent = posix_dirname(abs).to_string();
        self.ensure_dir(&parent);
        self.insert_node(abs, SimNode::Dir(Vec::new()));
    }

    fn insert_node(&mut self, abs: &str, node: SimNode) {
        let name = posix_basename(abs).to_string();
        let is_new = self.nodes.insert(abs.to_string(), node).is_none();
        if is_new && abs != "/" {
            if let Some(SimNode::Dir(children)) = self.nodes.get_mut(posix_dirname(abs)) {
                children.push(name);
            }
        }
    }

    fn remove_node(&mut self, abs: &str) -> Option<SimNode> {
        let node = self.nodes.remove(abs)?;
        let name = posix_basename(abs);
        if let Some(SimNode::Dir(children)) = self.nodes.get_mut(posix_dirname(abs)) {
            children.retain(|c| c != name);
        }
        Some(node)
    }

    fn record(&mut self, cmd: String) -> FtpResult<String> {
        if self.closed {
            return Err(FtpError::disconnected("Connection closed").with_command(&cmd));
        }
        log::trace!(">>> {}", mask_command(&cmd));
        self.commands.push(mask_command(&cmd));
        Ok(cmd)
    }

    fn parent_is_dir(&self, abs: &str) -> bool {
        matches!(self.nodes.get(posix_dirname(abs)), Some(SimNode::Dir(_)))
    }

    fn list_line(&self, name: &str, node: &SimNode) -> String {
        match node {
            SimNode::Dir(_) => format!(
                "drwxr-xr-x   2 ftp      ftp          4096 Jan  1 12:00 {}",
                name
            ),
            SimNode::File(data) => format!(
                "-rw-r--r--   1 ftp      ftp      {:>8} Jan  1 12:00 {}",
                data.len(),
                name
            ),
            SimNode::Symlink(target) => format!(
                "lrwxrwxrwx   1 ftp      ftp      {:>8} Jan  1 12:00 {} -> {}",
                target.len(),
                name,
                target
            ),
        }
    }
}

fn reject(cmd: &str, code: u16, text: &str) -> FtpError {
    FtpError::from_reply(code, &format!("{} {}", code, text)).with_command(cmd)
}

#[async_trait::async_trait]
impl FtpTransport for SimulatedTransport {
    async fn login(&mut self, user: &str, password: &str, _account: Option<&str>) -> FtpResult<()> {
        self.record(format!("USER {}", user))?;
        self.record(format!("PASS {}", password))?;
        self.user = Some(user.to_string());
        Ok(())
    }

    async fn change_directory(&mut self, path: &str) -> FtpResult<()> {
        let cmd = self.record(format!("CWD {}", path))?;
        let abs = self.resolve(path);
        let target = self.aliases.get(&abs).cloned().unwrap_or(abs);
        match self.nodes.get(&target) {
            Some(SimNode::Dir(_)) => {
                self.cwd = target;
                Ok(())
            }
            _ => Err(reject(&cmd, 550, "No such directory.")),
        }
    }

    async fn current_directory(&mut self) -> FtpResult<String> {
        self.record("PWD".to_string())?;
        Ok(self.cwd.clone())
    }

    async fn make_directory(&mut self, path: &str) -> FtpResult<()> {
        let cmd = self.record(format!("MKD {}", path))?;
        let abs = self.resolve(path);
        if self.nodes.contains_key(&abs) {
            return Err(reject(&cmd, 550, "File exists."));
        }
        if !self.parent_is_dir(&abs) {
            return Err(reject(&cmd, 550, "No such file or directory."));
        }
        self.insert_node(&abs, SimNode::Dir(Vec::new()));
        Ok(())
    }

    async fn list_entries(&mut self, path: &str) -> FtpResult<Vec<String>> {
        let cmd = if path.is_empty() {
            self.record("LIST".to_string())?
        } else {
            self.record(format!("LIST {}", path))?
        };
        let abs = self.resolve(path);
        let lines = match self.nodes.get(&abs) {
            Some(SimNode::Dir(children)) => children
                .iter()
                .filter_map(|name| {
                    let child = self.nodes.get(&posix_join(&abs, name))?;
                    Some(self.list_line(name, child))
                })
                .collect::<Vec<_>>(),
            Some(node) => vec![self.list_line(posix_basename(&abs), node)],
            None => return Err(reject(&cmd, 550, "No such file or directory.")),
        };
        let mut out = Vec::with_capacity(lines.len() + 1);
        out.push(format!("total {}", lines.len()));
        out.extend(lines);
        Ok(out)
    }

    async fn retrieve(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> FtpResult<u64> {
        let cmd = self.record(format!("RETR {}", path))?;
        let data = match self.nodes.get(&self.resolve(path)) {
            Some(SimNode::File(data)) => data.clone(),
            _ => return Err(reject(&cmd, 550, "Failed to open file.")),
        };
        sink.write_all(&data).await.map_err(FtpError::local_stream)?;
        sink.flush().await.map_err(FtpError::local_stream)?;
        Ok(data.len() as u64)
    }

    async fn store(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> FtpResult<u64> {
        let cmd = self.record(format!("STOR {}", path))?;
        let abs = self.resolve(path);
        if !self.parent_is_dir(&abs) || matches!(self.nodes.get(&abs), Some(SimNode::Dir(_))) {
            return Err(reject(&cmd, 553, "Could not create file."));
        }
        let mut data = Vec::new();
        source
            .read_to_end(&mut data)
            .await
            .map_err(FtpError::local_stream)?;
        let len = data.len() as u64;
        self.insert_node(&abs, SimNode::File(data));
        Ok(len)
    }

    async fn delete(&mut self, path: &str) -> FtpResult<()> {
        let cmd = self.record(format!("DELE {}", path))?;
        let abs = self.resolve(path);
        match self.nodes.get(&abs) {
            Some(SimNode::File(_)) | Some(SimNode::Symlink(_)) => {
                self.remove_node(&abs);
                Ok(())
            }
            _ => Err(reject(&cmd, 550, "Delete operation failed.")),
        }
    }

    async fn rename(&mut self, from: &str, to: &str) -> FtpResult<()> {
        let rnfr = self.record(format!("RNFR {}", from))?;
        let src = self.resolve(from);
        if !self.nodes.contains_key(&src) {
            return Err(reject(&rnfr, 550, "RNFR command failed."));
        }
        let rnto = self.record(format!("RNTO {}", to))?;
        let dst = self.resolve(to);
        if !self.parent_is_dir(&dst) || self.nodes.contains_key(&dst) {
            return Err(reject(&rnto, 553, "Rename failed."));
        }

        let prefix = format!("{}/", src);
        let moved: Vec<String> = self
            .nodes
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        for old in moved {
            if let Some(node) = self.nodes.remove(&old) {
                self.nodes.insert(format!("{}/{}", dst, &old[prefix.len()..]), node);
            }
        }
        if let Some(node) = self.remove_node(&src) {
            self.insert_node(&dst, node);
        }
        Ok(())
    }

    async fn quit(&mut self) -> FtpResult<()> {
        self.record("QUIT".to_string())?;
        self.closed = true;
        Ok(())
    }

    async fn close(&mut self) -> FtpResult<()> {
        self.closed = true;
        Ok(())
    }
}
