//! Client control stream
//!
//! The client's control socket, plaintext or TLS-wrapped after AUTH. The
//! session reads and writes through this one type so an upgrade swaps the
//! transport without touching the read loop.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

pub enum ControlStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    /// Placeholder while the socket is handed to the TLS handshake
    Detached,
}

impl ControlStream {
    pub fn is_tls(&self) -> bool {
        matches!(self, ControlStream::Tls(_))
    }
}

fn detached() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "control stream detached")
}

impl AsyncRead for ControlStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            ControlStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
            ControlStream::Detached => Poll::Ready(Err(detached())),
        }
    }
}

impl AsyncWrite for ControlStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            ControlStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            ControlStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
            ControlStream::Detached => Poll::Ready(Err(detached())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            ControlStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
            ControlStream::Detached => Poll::Ready(Err(detached())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            ControlStream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
            ControlStream::Detached => Poll::Ready(Ok(())),
        }
    }
}
