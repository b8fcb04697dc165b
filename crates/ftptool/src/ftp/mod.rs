//! # FTP convenience layer
//!
//! Plain FTP (RFC 959, plus EPSV from RFC 2428) with the client-side state
//! needed for tree operations.
//!
//! Architecture:
//! - `types`: config, replies, listing entries, walk and mirror types
//! - `error`: FTP-specific error type
//! - `protocol`: low-level command/response codec
//! - `connection`: TCP control connection with connect timeout
//! - `transfer`: data channel management (PASV/EPSV/PORT)
//! - `client`: real transport over a control connection
//! - `transport`: transport trait and an in-memory simulated server
//! - `parser`: `LIST` response parsing
//! - `paths`: POSIX path helpers and local/remote path mapping
//! - `host`: working-directory cache, path transform, file proxies
//! - `directory`: mkdir, listdir, makedirs
//! - `walk`: remote and local tree walks
//! - `proxy`: per-file transfer handle
//! - `mirror`: remote ↔ local mirroring
//! - `batch`: get/put/delete and their multi-file forms

pub mod types;
pub mod error;
pub mod protocol;
pub mod connection;
pub mod transfer;
pub mod client;
pub mod transport;
pub mod parser;
pub mod paths;
pub mod host;
pub mod directory;
pub mod walk;
pub mod proxy;
pub mod mirror;
pub mod batch;

// Re-exports for lib.rs consumers
pub use types::*;
pub use error::{FtpError, FtpErrorKind, FtpResult};
pub use client::FtpClient;
pub use transport::{FtpTransport, SimulatedTransport};
pub use host::{FtpHost, PathTransform};
pub use walk::{LocalWalk, RemoteWalk};
pub use proxy::FileProxy;
