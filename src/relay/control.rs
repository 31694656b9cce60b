//! Module `control`
//!
//! The proxy's own connection to the origin's control port. Commands go out
//! as CRLF lines and replies come back either line by line or as complete
//! (possibly multi-line) FTP replies.

use log::{debug, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time;

use crate::error::RelayError;
use crate::protocol::parser::{LineRead, read_bounded_line};
use crate::protocol::responses::{Reply, is_final_reply_line, reply_code, trim_eol};

/// Longest origin reply line accepted, terminator included.
pub const MAX_REPLY_LINE: usize = 64 * 1024;

pub struct ControlRelay {
    origin: String,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ControlRelay {
    /// Opens the control connection to `origin`, bounded by `timeout`.
    pub async fn connect(origin: &str, timeout: Duration) -> Result<Self, RelayError> {
        let stream = match time::timeout(timeout, TcpStream::connect(origin)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(RelayError::ConnectFailed(origin.to_string(), e)),
            Err(_) => return Err(RelayError::ConnectTimeout(origin.to_string())),
        };
        Self::from_stream(origin, stream)
    }

    /// Wraps an already established origin connection.
    pub fn from_stream(origin: &str, stream: TcpStream) -> Result<Self, RelayError> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;
        let (read_half, writer) = stream.into_split();

        info!("Control relay {} -> {} established", local_addr, peer_addr);

        Ok(Self {
            origin: origin.to_string(),
            local_addr,
            peer_addr,
            reader: BufReader::new(read_half),
            writer,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The proxy's end of the origin connection; this is the address the
    /// origin can reach us on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Sends one command line, adding CRLF when missing. The body goes out
    /// byte for byte.
    pub async fn send_line(&mut self, line: impl AsRef<[u8]>) -> Result<(), RelayError> {
        let body = trim_eol(line.as_ref());
        if body.starts_with(b"PASS ") {
            debug!("-> origin: PASS ****");
        } else {
            debug!("-> origin: {}", String::from_utf8_lossy(body));
        }
        self.writer.write_all(body).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Reads one raw line, terminator included.
    pub async fn read_line(&mut self) -> Result<Vec<u8>, RelayError> {
        match read_bounded_line(&mut self.reader, MAX_REPLY_LINE).await? {
            LineRead::Line(line) => {
                debug!("<- origin: {}", String::from_utf8_lossy(trim_eol(&line)));
                Ok(line)
            }
            LineRead::TooLong { .. } => Err(RelayError::LineTooLong(MAX_REPLY_LINE)),
            LineRead::Closed => Err(RelayError::OriginClosed),
        }
    }

    /// Reads one complete reply.
    pub async fn read_reply(&mut self) -> Result<Reply, RelayError> {
        let first = self.read_line().await?;
        let code = reply_code(&first).ok_or_else(|| {
            RelayError::MalformedReply(String::from_utf8_lossy(trim_eol(&first)).into_owned())
        })?;

        let mut lines = vec![first];
        while !lines
            .last()
            .is_some_and(|line| is_final_reply_line(code, line))
        {
            lines.push(self.read_line().await?);
        }

        Ok(Reply { code, lines })
    }

    /// Sends a command and reads its reply.
    pub async fn exchange(&mut self, line: impl AsRef<[u8]>) -> Result<Reply, RelayError> {
        self.send_line(line).await?;
        self.read_reply().await
    }
}
