//! TCP control connection setup.
//!
//! The connect timeout from `FtpConnectionConfig` is applied directly to the
//! socket connect and to the welcome banner read.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::types::{FtpConnectionConfig, FtpResponse};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Establish the control connection and return a ready-to-use codec
/// **plus** the server welcome banner.
pub async fn connect(config: &FtpConnectionConfig) -> FtpResult<(FtpCodec, FtpResponse)> {
    if config.host.is_empty() {
        return Err(FtpError::configuration("Host must not be empty"));
    }
    let addr = format!("{}:{}", config.host, config.port);
    let limit = seconds(config.connect_timeout_sec);

    let tcp = with_timeout(limit, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::timeout(format!("TCP connect to {} timed out", addr)))?
        .map_err(|e| FtpError::transport(format!("TCP connect to {}: {}", addr, e)))?;
    tcp.set_nodelay(true).ok();

    let mut codec = FtpCodec::from_tcp(tcp);
    let banner = with_timeout(limit, codec.read_response())
        .await
        .map_err(|_| FtpError::timeout(format!("No welcome banner from {}", addr)))??;
    if !banner.is_completion() {
        return Err(FtpError::from_reply(banner.code, &banner.text()));
    }
    Ok((codec, banner))
}

/// `0` disables the timeout.
pub(crate) fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Run `fut`, bounded by `limit` when one is set.
pub(crate) async fn with_timeout<F: Future>(
    limit: Option<Duration>,
    fut: F,
) -> Result<F::Output, tokio::time::error::Elapsed> {
    match limit {
        Some(d) => timeout(d, fut).await,
        None => Ok(fut.await),
    }
}
