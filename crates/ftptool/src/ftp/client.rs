//! Stateful FTP client. Owns the control connection and issues commands.
//!
//! Lifecycle: `connect()` → `login()` → commands → `quit()` / `close()`.
//! Transfers switch the session to binary (`TYPE I`) once, then negotiate a
//! fresh data channel per `LIST` / `RETR` / `STOR`.

use crate::ftp::connection::{self, seconds};
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::{parse_quoted_path, FtpCodec};
use crate::ftp::transfer::{self, DataChannel};
use crate::ftp::transport::FtpTransport;
use crate::ftp::types::*;
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use uuid::Uuid;

/// A connected FTP client session.
pub struct FtpClient {
    pub id: String,
    pub info: FtpSessionInfo,
    codec: FtpCodec,
    config: FtpConnectionConfig,
    binary: bool,
}

impl FtpClient {
    /// Open the control connection and read the welcome banner.
    /// Does not log in.
    pub async fn connect(config: FtpConnectionConfig) -> FtpResult<Self> {
        let (codec, banner) = connection::connect(&config).await?;
        let id = Uuid::new_v4().to_string();
        log::info!(
            "FTP session {} connected to {}:{}",
            id,
            config.host,
            config.port
        );

        let now = Utc::now();
        let info = FtpSessionInfo {
            id: id.clone(),
            host: config.host.clone(),
            port: config.port,
            username: String::new(),
            connected: true,
            server_banner: Some(banner.text()),
            connected_at: now,
            last_activity: now,
            bytes_uploaded: 0,
            bytes_downloaded: 0,
        };

        Ok(Self {
            id,
            info,
            codec,
            config,
            binary: false,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.info.connected
    }

    fn touch(&mut self) {
        self.info.last_activity = Utc::now();
    }

    fn ensure_connected(&self) -> FtpResult<()> {
        if self.info.connected {
            Ok(())
        } else {
            Err(FtpError::disconnected(format!(
                "FTP session {} is closed",
                self.id
            )))
        }
    }

    /// Send a command; any 4xx/5xx reply is an error.
    async fn command(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.ensure_connected()?;
        let resp = self.codec.expect_success(cmd).await?;
        self.touch();
        Ok(resp)
    }

    async fn ensure_binary(&mut self) -> FtpResult<()> {
        if !self.binary {
            self.codec.expect_completion("TYPE I").await?;
            self.binary = true;
        }
        Ok(())
    }

    /// Negotiate a data channel, issue `cmd`, and hand back the connected
    /// data stream once the server has answered with a preliminary reply.
    async fn start_transfer(&mut self, cmd: &str) -> FtpResult<TcpStream> {
        self.ensure_connected()?;
        self.ensure_binary().await?;
        let channel: DataChannel = transfer::open_data_channel(
            &mut self.codec,
            self.config.data_channel_mode,
            &self.config.host,
            seconds(self.config.data_timeout_sec),
            self.config.active_bind_address.as_deref(),
        )
        .await?;

        let resp = self.codec.execute(cmd).await?;
        if !resp.is_preliminary() {
            return Err(if resp.is_success() {
                FtpError::transport(format!("Unexpected reply to {}: {}", cmd, resp.text()))
            } else {
                FtpError::from_reply(resp.code, &resp.text()).with_command(cmd)
            });
        }
        channel.into_stream().await
    }

    /// Consume the reply to a transfer whose data stream failed, so the
    /// next command does not read it as its own answer. If no reply
    /// arrives the control channel is unusable and the session is closed.
    async fn abandon_transfer(&mut self, cmd: &str, err: FtpError) -> FtpError {
        let limit = seconds(self.config.connect_timeout_sec);
        match connection::with_timeout(limit, self.codec.read_response()).await {
            Ok(Ok(resp)) => {
                log::debug!("{} abandoned ({}), server replied: {}", cmd, err, resp.text());
            }
            _ => {
                log::warn!(
                    "FTP session {} lost sync after failed {}, closing",
                    self.id,
                    cmd
                );
                self.info.connected = false;
                let _ = self.codec.shutdown().await;
            }
        }
        err.with_command(cmd)
    }

    /// Read the `226` that follows a finished data transfer.
    async fn finish_transfer(&mut self, cmd: &str) -> FtpResult<()> {
        let done = self.codec.read_response().await?;
        if !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()).with_command(cmd));
        }
        self.touch();
        Ok(())
    }
}

/// Which end of a data transfer is the server.
#[derive(Clone, Copy)]
enum Direction {
    Download,
    Upload,
}

impl Direction {
    fn read_error(self, e: std::io::Error) -> FtpError {
        match self {
            Direction::Download => FtpError::from(e),
            Direction::Upload => FtpError::local_stream(e),
        }
    }

    fn write_error(self, e: std::io::Error) -> FtpError {
        match self {
            Direction::Download => FtpError::local_stream(e),
            Direction::Upload => FtpError::from(e),
        }
    }
}

/// Copy `reader` into `writer`, blaming failures on the side that raised them.
async fn relay<R, W>(reader: &mut R, writer: &mut W, direction: Direction) -> FtpResult<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; RELAY_BUFFER];
    let mut total = 0u64;
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| direction.read_error(e))?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buf[..n])
            .await
            .map_err(|e| direction.write_error(e))?;
        total += n as u64;
    }
    writer.flush().await.map_err(|e| direction.write_error(e))?;
    Ok(total)
}

const RELAY_BUFFER: usize = 64 * 1024;

#[async_trait::async_trait]
impl FtpTransport for FtpClient {
    async fn login(&mut self, user: &str, password: &str, account: Option<&str>) -> FtpResult<()> {
        self.ensure_connected()?;
        let mut resp = self.codec.expect_success(&format!("USER {}", user)).await?;
        if resp.code == 331 {
            resp = self.codec.expect_success(&format!("PASS {}", password)).await?;
        }
        if resp.code == 332 {
            let acct = account.unwrap_or("");
            resp = self.codec.expect_success(&format!("ACCT {}", acct)).await?;
        }
        if !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()).with_command("USER"));
        }
        self.info.username = user.to_string();
        self.touch();
        log::info!("FTP session {} logged in as {}", self.id, user);
        Ok(())
    }

    async fn change_directory(&mut self, path: &str) -> FtpResult<()> {
        self.command(&format!("CWD {}", path)).await.map(|_| ())
    }

    async fn current_directory(&mut self) -> FtpResult<String> {
        let resp = self.command("PWD").await?;
        parse_quoted_path(&resp.text())
    }

    async fn make_directory(&mut self, path: &str) -> FtpResult<()> {
        self.command(&format!("MKD {}", path)).await.map(|_| ())
    }

    async fn list_entries(&mut self, path: &str) -> FtpResult<Vec<String>> {
        let cmd = if path.is_empty() {
            "LIST".to_string()
        } else {
            format!("LIST {}", path)
        };
        let mut data = self.start_transfer(&cmd).await?;
        let mut buf = Vec::new();
        let read = data.read_to_end(&mut buf).await;
        drop(data);
        if let Err(e) = read {
            return Err(self.abandon_transfer(&cmd, FtpError::from(e)).await);
        }
        self.finish_transfer(&cmd).await?;

        let text = String::from_utf8_lossy(&buf);
        Ok(text
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    async fn retrieve(
        &mut self,
        path: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> FtpResult<u64> {
        let cmd = format!("RETR {}", path);
        let mut data = self.start_transfer(&cmd).await?;
        let copied = relay(&mut data, &mut *sink, Direction::Download).await;
        drop(data);
        let n = match copied {
            Ok(n) => n,
            Err(e) => return Err(self.abandon_transfer(&cmd, e).await),
        };
        self.finish_transfer(&cmd).await?;
        self.info.bytes_downloaded += n;
        Ok(n)
    }

    async fn store(
        &mut self,
        path: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> FtpResult<u64> {
        let cmd = format!("STOR {}", path);
        let mut data = self.start_transfer(&cmd).await?;
        let copied = match relay(&mut *source, &mut data, Direction::Upload).await {
            Ok(n) => data.shutdown().await.map(|_| n).map_err(FtpError::from),
            Err(e) => Err(e),
        };
        drop(data);
        let n = match copied {
            Ok(n) => n,
            Err(e) => return Err(self.abandon_transfer(&cmd, e).await),
        };
        self.finish_transfer(&cmd).await?;
        self.info.bytes_uploaded += n;
        Ok(n)
    }

    async fn delete(&mut self, path: &str) -> FtpResult<()> {
        self.command(&format!("DELE {}", path)).await.map(|_| ())
    }

    async fn rename(&mut self, from: &str, to: &str) -> FtpResult<()> {
        let rnfr = format!("RNFR {}", from);
        let resp = self.command(&rnfr).await?;
        if !resp.is_intermediate() {
            return Err(FtpError::transport(format!(
                "Unexpected reply to {}: {}",
                rnfr,
                resp.text()
            )));
        }
        self.command(&format!("RNTO {}", to)).await.map(|_| ())
    }

    async fn quit(&mut self) -> FtpResult<()> {
        self.ensure_connected()?;
        let result = self.codec.expect_success("QUIT").await.map(|_| ());
        self.info.connected = false;
        let _ = self.codec.shutdown().await;
        log::info!("FTP session {} quit", self.id);
        result
    }

    async fn close(&mut self) -> FtpResult<()> {
        if self.info.connected {
            self.info.connected = false;
            let _ = self.codec.shutdown().await;
            log::info!("FTP session {} closed", self.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncBufReadExt, BufReader, ReadBuf};
    use tokio::net::TcpListener;

    /// A scripted control-channel peer: for each expected command, reply
    /// with the given lines.
    async fn scripted_server(script: Vec<(&'static str, &'static str)>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            let (rd, mut wr) = sock.into_split();
            let mut rd = BufReader::new(rd);
            wr.write_all(b"220 Hi.\r\n").await.unwrap();
            for (expected, reply) in script {
                let mut line = String::new();
                rd.read_line(&mut line).await.unwrap();
                assert_eq!(line.trim_end(), expected);
                wr.write_all(reply.as_bytes()).await.unwrap();
            }
        });
        port
    }

    async fn client_for(port: u16) -> FtpClient {
        FtpClient::connect(FtpConnectionConfig {
            host: "127.0.0.1".into(),
            port,
            ..Default::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn login_with_password() {
        let port = scripted_server(vec![
            ("USER fbi", "331 Give password.\r\n"),
            ("PASS SecretPassword", "230-Fine!\r\n230 You're now logged in.\r\n"),
        ])
        .await;
        let mut client = client_for(port).await;
        assert_eq!(client.info.server_banner.as_deref(), Some("220 Hi."));
        client.login("fbi", "SecretPassword", None).await.unwrap();
        assert_eq!(client.info.username, "fbi");
    }

    #[tokio::test]
    async fn login_with_account() {
        let port = scripted_server(vec![
            ("USER fbi", "331 Give password.\r\n"),
            ("PASS pw", "332 Need account.\r\n"),
            ("ACCT acme", "230 Logged in.\r\n"),
        ])
        .await;
        let mut client = client_for(port).await;
        client.login("fbi", "pw", Some("acme")).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_login_masks_password() {
        let port = scripted_server(vec![
            ("USER fbi", "331 Give password.\r\n"),
            ("PASS wrong", "530 Login incorrect.\r\n"),
        ])
        .await;
        let mut client = client_for(port).await;
        let err = client.login("fbi", "wrong", None).await.unwrap_err();
        assert_eq!(err.code, Some(530));
        assert_eq!(err.command.as_deref(), Some("PASS ****"));
    }

    #[tokio::test]
    async fn cwd_pwd_and_mkd() {
        let port = scripted_server(vec![
            ("CWD /test", "250 OK. Current directory is /test\r\n"),
            ("PWD", "257 \"/test\" is your current location.\r\n"),
            ("MKD testd", "257 \"testd\" : The directory was successfully created\r\n"),
            ("CWD /nope", "550 No such directory.\r\n"),
        ])
        .await;
        let mut client = client_for(port).await;
        client.change_directory("/test").await.unwrap();
        assert_eq!(client.current_directory().await.unwrap(), "/test");
        client.make_directory("testd").await.unwrap();
        let err = client.change_directory("/nope").await.unwrap_err();
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn rename_and_delete() {
        let port = scripted_server(vec![
            ("RNFR /a.txt", "350 Ready for destination name.\r\n"),
            ("RNTO /b.txt", "250 Rename successful.\r\n"),
            ("DELE /b.txt", "250 Deleted.\r\n"),
            ("QUIT", "221 Bye.\r\n"),
        ])
        .await;
        let mut client = client_for(port).await;
        client.rename("/a.txt", "/b.txt").await.unwrap();
        client.delete("/b.txt").await.unwrap();
        client.quit().await.unwrap();
        assert!(!client.is_connected());
        let err = client.delete("/b.txt").await.unwrap_err();
        assert_eq!(err.kind, crate::ftp::FtpErrorKind::Transport);
    }

    /// Passive data peer that sends `payload`, half-closes, then drains
    /// whatever the client uploads. Returns the matching `227` reply.
    async fn passive_data_peer(payload: &'static [u8]) -> &'static str {
        let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let data_port = data_listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut sock, _) = data_listener.accept().await.unwrap();
            let _ = sock.write_all(payload).await;
            let _ = sock.shutdown().await;
            let mut rest = Vec::new();
            let _ = sock.read_to_end(&mut rest).await;
        });
        let pasv = format!(
            "227 Entering passive mode (127,0,0,1,{},{})\r\n",
            data_port / 256,
            data_port % 256
        );
        Box::leak(pasv.into_boxed_str())
    }

    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(
            self: Pin<&mut Self>,
            _: &mut Context<'_>,
            _: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct UnreadableSource;

    impl AsyncRead for UnreadableSource {
        fn poll_read(
            self: Pin<&mut Self>,
            _: &mut Context<'_>,
            _: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, "bad sector")))
        }
    }

    #[tokio::test]
    async fn failed_sink_keeps_control_channel_in_sync() {
        let pasv = passive_data_peer(b"Hello world!").await;
        let port = scripted_server(vec![
            ("TYPE I", "200 TYPE is now 8-bit binary\r\n"),
            ("PASV", pasv),
            ("RETR /f", "150 go\r\n226 Done.\r\n"),
            ("PWD", "257 \"/home\" is your current location.\r\n"),
        ])
        .await;
        let mut client = client_for(port).await;
        let err = client.retrieve("/f", &mut FullDisk).await.unwrap_err();
        assert_eq!(err.kind, crate::ftp::FtpErrorKind::LocalIo);
        assert_eq!(err.command.as_deref(), Some("RETR /f"));
        assert!(client.is_connected());
        assert_eq!(client.current_directory().await.unwrap(), "/home");
        assert_eq!(client.info.bytes_downloaded, 0);
    }

    #[tokio::test]
    async fn failed_source_keeps_control_channel_in_sync() {
        let pasv = passive_data_peer(b"").await;
        let port = scripted_server(vec![
            ("TYPE I", "200 TYPE is now 8-bit binary\r\n"),
            ("PASV", pasv),
            (
                "STOR /up",
                "150 Ok to send data.\r\n426 Connection closed; transfer aborted.\r\n",
            ),
            ("PWD", "257 \"/home\"\r\n"),
        ])
        .await;
        let mut client = client_for(port).await;
        let err = client.store("/up", &mut UnreadableSource).await.unwrap_err();
        assert_eq!(err.kind, crate::ftp::FtpErrorKind::LocalIo);
        assert_eq!(client.current_directory().await.unwrap(), "/home");
    }

    #[tokio::test]
    async fn missing_completion_reply_closes_session() {
        let pasv = passive_data_peer(b"Hello world!").await;
        // The script ends after the preliminary reply, so the server hangs up.
        let port = scripted_server(vec![
            ("TYPE I", "200 TYPE is now 8-bit binary\r\n"),
            ("PASV", pasv),
            ("RETR /f", "150 go\r\n"),
        ])
        .await;
        let mut client = client_for(port).await;
        let err = client.retrieve("/f", &mut FullDisk).await.unwrap_err();
        assert_eq!(err.kind, crate::ftp::FtpErrorKind::LocalIo);
        assert!(!client.is_connected());
        let err = client.current_directory().await.unwrap_err();
        assert_eq!(err.kind, crate::ftp::FtpErrorKind::Transport);
    }

    #[tokio::test]
    async fn passive_download() {
        let pasv = passive_data_peer(b"Hello world!").await;
        let port = scripted_server(vec![
            ("TYPE I", "200 TYPE is now 8-bit binary\r\n"),
            ("PASV", pasv),
            (
                "RETR /test.txt",
                "150 Accepted connection\r\n226-File successfully transferred\r\n226 Done.\r\n",
            ),
        ])
        .await;
        let mut client = client_for(port).await;
        let mut out = Vec::new();
        let n = client.retrieve("/test.txt", &mut out).await.unwrap();
        assert_eq!(n, 12);
        assert_eq!(out, b"Hello world!");
        assert_eq!(client.info.bytes_downloaded, 12);
    }
}
