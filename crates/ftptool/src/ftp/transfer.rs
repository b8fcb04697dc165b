//! Data-channel management for FTP transfers.
//!
//! Supports three modes (RFC 959 + RFC 2428):
//! - **PASV**: server opens a port, client connects
//! - **EPSV**: extended passive, client connects back to the control host
//! - **PORT**: client opens a port, server connects once the transfer
//!   command has been issued

use crate::ftp::connection::with_timeout;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::types::DataChannelMode;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

lazy_static! {
    static ref PASV_RE: Regex =
        Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").expect("valid PASV regex");
    static ref EPSV_RE: Regex = Regex::new(r"\|\|\|(\d+)\|").expect("valid EPSV regex");
}

/// A data channel that is either already connected (passive modes) or
/// waiting for the server to connect (active mode).
pub enum DataChannel {
    Connected(TcpStream),
    Listening {
        listener: TcpListener,
        limit: Option<Duration>,
    },
}

impl DataChannel {
    /// Obtain the connected stream. Call only after the transfer command
    /// has been acknowledged with a preliminary reply.
    pub async fn into_stream(self) -> FtpResult<TcpStream> {
        match self {
            DataChannel::Connected(tcp) => Ok(tcp),
            DataChannel::Listening { listener, limit } => {
                let (tcp, peer) = with_timeout(limit, listener.accept())
                    .await
                    .map_err(|_| FtpError::timeout("PORT accept timed out"))?
                    .map_err(|e| FtpError::transport(format!("PORT accept: {}", e)))?;
                log::trace!("data connection from {}", peer);
                Ok(tcp)
            }
        }
    }
}

/// Negotiate a data channel according to the configured mode.
pub async fn open_data_channel(
    codec: &mut FtpCodec,
    mode: DataChannelMode,
    host: &str,
    limit: Option<Duration>,
    active_bind: Option<&str>,
) -> FtpResult<DataChannel> {
    match mode {
        DataChannelMode::Passive => {
            let resp = codec.expect_completion("PASV").await?;
            let addr = parse_pasv_response(&resp.text())?;
            connect_data(addr.to_string(), limit).await
        }
        DataChannelMode::ExtendedPassive => {
            let resp = codec.expect_completion("EPSV").await?;
            let port = parse_epsv_response(&resp.text())?;
            connect_data(format!("{}:{}", host, port), limit).await
        }
        DataChannelMode::Active => open_port(codec, active_bind, limit).await,
    }
}

async fn connect_data(addr: String, limit: Option<Duration>) -> FtpResult<DataChannel> {
    let tcp = with_timeout(limit, TcpStream::connect(&addr))
        .await
        .map_err(|_| FtpError::timeout(format!("Data connect to {} timed out", addr)))?
        .map_err(|e| FtpError::transport(format!("Data connect to {}: {}", addr, e)))?;
    Ok(DataChannel::Connected(tcp))
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 response.
fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let caps = PASV_RE
        .captures(text)
        .ok_or_else(|| FtpError::transport(format!("Cannot parse PASV: {}", text)))?;

    let nums = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::transport("PASV number out of range"))
        })
        .collect::<FtpResult<Vec<u8>>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = u16::from(nums[4]) * 256 + u16::from(nums[5]);
    Ok(SocketAddr::new(ip, port))
}

/// Parse `(|||port|)` from a 229 response.
fn parse_epsv_response(text: &str) -> FtpResult<u16> {
    let caps = EPSV_RE
        .captures(text)
        .ok_or_else(|| FtpError::transport(format!("Cannot parse EPSV: {}", text)))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| FtpError::transport("EPSV port out of range"))
}

/// Bind a local listener and announce it with `PORT h1,h2,h3,h4,p1,p2`.
///
/// Without an explicit bind address the listener sits on the interface the
/// control connection uses, which is also the address announced.
async fn open_port(
    codec: &mut FtpCodec,
    bind_addr: Option<&str>,
    limit: Option<Duration>,
) -> FtpResult<DataChannel> {
    let control_ip = codec.local_addr().map(|a| a.ip());
    let bound = match (bind_addr, control_ip) {
        (Some(addr), _) => TcpListener::bind(format!("{}:0", addr)).await,
        (None, Some(ip)) => TcpListener::bind(SocketAddr::new(ip, 0)).await,
        (None, None) => TcpListener::bind("0.0.0.0:0").await,
    };
    let listener = bound.map_err(|e| FtpError::transport(format!("PORT bind: {}", e)))?;
    let local = listener
        .local_addr()
        .map_err(|e| FtpError::transport(format!("PORT local_addr: {}", e)))?;

    let ip = announced_ip(local.ip(), control_ip)?;
    codec.expect_completion(&port_command(ip.octets(), local.port())).await?;
    Ok(DataChannel::Listening { listener, limit })
}

/// The IPv4 address to put in a `PORT` command for a listener bound to
/// `bound`. A wildcard bind announces the control connection's address.
fn announced_ip(bound: IpAddr, control: Option<IpAddr>) -> FtpResult<Ipv4Addr> {
    let ip = match control {
        Some(control) if bound.is_unspecified() => control,
        _ => bound,
    };
    let v4 = match ip {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .ok_or_else(|| FtpError::configuration("PORT requires an IPv4 address"))?,
    };
    if v4.is_unspecified() {
        return Err(FtpError::configuration(
            "PORT has no routable address to announce; set active_bind_address",
        ));
    }
    Ok(v4)
}

fn port_command(octets: [u8; 4], port: u16) -> String {
    format!(
        "PORT {},{},{},{},{},{}",
        octets[0],
        octets[1],
        octets[2],
        octets[3],
        port / 256,
        port % 256
    )
}
