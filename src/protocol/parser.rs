//! FTP Command parsing
//!
//! Splits a raw control-channel line into verb and parameter, and reads
//! lines off the wire with an upper bound on their length.
//!
//! Lines are bytes. Only the verb has to be ASCII; parameters such as
//! Latin-1 paths are forwarded exactly as received.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::protocol::responses::trim_eol;

/// One command line received from the client.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandLine {
    /// The line exactly as read, terminator included
    pub raw: Vec<u8>,
    /// Uppercased verb
    pub verb: String,
    /// Everything after the first space, decoded lossily, possibly empty
    pub param: String,
}

/// Parses a raw line into a [`CommandLine`].
///
/// Trailing CR/LF are stripped first, then the line is split on the first space.
pub fn parse_line(raw: &[u8]) -> CommandLine {
    let body = trim_eol(raw);
    let (verb, param) = match body.iter().position(|b| *b == b' ') {
        Some(i) => (&body[..i], &body[i + 1..]),
        None => (body, &body[body.len()..]),
    };

    CommandLine {
        raw: raw.to_vec(),
        verb: String::from_utf8_lossy(verb).to_ascii_uppercase(),
        param: String::from_utf8_lossy(param).into_owned(),
    }
}

impl CommandLine {
    /// Line to forward upstream, always CRLF terminated.
    pub fn wire_line(&self) -> Vec<u8> {
        let mut line = trim_eol(&self.raw).to_vec();
        line.extend_from_slice(b"\r\n");
        line
    }

    /// Text safe to write to logs.
    pub fn log_line(&self) -> String {
        if self.verb == "PASS" {
            "PASS ****".to_string()
        } else {
            String::from_utf8_lossy(trim_eol(&self.raw)).into_owned()
        }
    }
}

/// Outcome of one bounded line read.
#[derive(Debug, PartialEq)]
pub enum LineRead {
    /// A line, terminator included when the peer sent one
    Line(Vec<u8>),
    /// Longer than the limit. Unless `terminated`, the rest of the line
    /// is still unread.
    TooLong { terminated: bool },
    /// End of stream before any byte
    Closed,
}

/// Reads one `\n`-terminated line of at most `limit` bytes.
///
/// Never buffers more than `limit + 1` bytes, whatever the peer sends.
pub async fn read_bounded_line<R>(reader: &mut R, limit: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let n = reader.take(cap).read_until(b'\n', &mut line).await?;

    if n == 0 {
        Ok(LineRead::Closed)
    } else if line.len() > limit {
        Ok(LineRead::TooLong {
            terminated: line.ends_with(b"\n"),
        })
    } else {
        Ok(LineRead::Line(line))
    }
}

/// Discards input up to and including the next `\n`. Returns false on EOF.
pub async fn skip_line<R>(reader: &mut R) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (consumed, found) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(false);
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(consumed);
        if found {
            return Ok(true);
        }
    }
}
