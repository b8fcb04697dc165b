//! FTP-specific error type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Categorised FTP error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    /// Human readable message. For rejected commands this is the literal
    /// reply text sent by the server.
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
    /// The command the server rejected (`PASS` arguments are masked).
    pub command: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FtpErrorKind {
    /// Server answered a command with a 4xx/5xx reply.
    RemoteOperation,
    /// Caller-supplied arguments contradict each other.
    Configuration,
    /// Connection-level failure: I/O, disconnect, timeout, malformed reply.
    Transport,
    /// A directory listing line does not have the expected shape.
    Parse,
    /// Reading or writing the local filesystem failed.
    LocalIo,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
            command: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.command = Some(mask_command(command));
        self
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Configuration, msg)
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Transport, msg)
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::transport(msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::transport(msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Parse, msg)
    }

    pub fn local_io(path: &Path, err: std::io::Error) -> Self {
        Self::new(
            FtpErrorKind::LocalIo,
            format!("{}: {}", path.display(), err),
        )
    }

    /// The local side of a data transfer failed (sink write or source read).
    pub fn local_stream(err: std::io::Error) -> Self {
        Self::new(FtpErrorKind::LocalIo, format!("local stream: {}", err))
    }

    /// Name the local file in a `LocalIo` error raised mid-transfer.
    pub fn with_local_path(mut self, path: &Path) -> Self {
        if self.kind == FtpErrorKind::LocalIo {
            self.message = format!("{}: {}", path.display(), self.message);
        }
        self
    }

    /// A command was answered with a negative reply.
    pub fn from_reply(code: u16, text: &str) -> Self {
        Self::new(FtpErrorKind::RemoteOperation, text).with_code(code)
    }

    /// Whether the server (rather than the connection) refused the operation.
    pub fn is_rejection(&self) -> bool {
        self.kind == FtpErrorKind::RemoteOperation
    }
}

/// Hide the password argument of a `PASS` command.
pub(crate) fn mask_command(command: &str) -> String {
    match command.split_once(' ') {
        Some((verb, _)) if verb.eq_ignore_ascii_case("PASS") => format!("{} ****", verb),
        _ => command.to_string(),
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.command, self.code) {
            (Some(cmd), Some(code)) => {
                write!(f, "[FTP {:?} {}] {}: {}", self.kind, code, cmd, self.message)
            }
            (None, Some(code)) => write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message),
            (Some(cmd), None) => write!(f, "[FTP {:?}] {}: {}", self.kind, cmd, self.message),
            (None, None) => write!(f, "[FTP {:?}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::transport(e.to_string())
        }
    }
}

impl From<FtpError> for String {
    fn from(e: FtpError) -> String {
        e.to_string()
    }
}
