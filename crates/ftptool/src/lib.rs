//! # ftptool – FTP convenience layer
//!
//! Higher-level operations over a plain FTP session:
//!
//! - **Listing Parser** – Unix `ls -l` style `LIST` output, names with spaces
//! - **Working Directory** – cached `PWD`, `CWD` resolved through the server
//! - **Tree Walk** – lazy depth-first walk whose subdirectory lists can be pruned
//! - **File Proxies** – upload/download/delete/rename bound to one remote path
//! - **Mirroring** – remote → local and local → remote tree copies
//! - **makedirs** – recursive remote directory creation

pub mod ftp;
