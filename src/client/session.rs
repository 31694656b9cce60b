//! Client session
//!
//! One `ClientSession` per accepted connection. It owns the client control
//! stream, the control relay to the origin once USER has been seen, the
//! current transfer declaration and the protocol state. Command handlers
//! work through the methods below; the read loop lives in `handler.rs`.

use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

use crate::client::state::SessionState;
use crate::client::stream::ControlStream;
use crate::error::CommandError;
use crate::protocol::responses::{Reply, format_response, trim_eol};
use crate::protocol::{CommandLine, parse_line};
use crate::relay::ControlRelay;
use crate::server::config::ProxyConfig;
use crate::server::connections::ConnectionGuard;
use crate::server::context::ProxyContext;
use crate::transfer::Transfer;

pub struct ClientSession {
    pub(super) id: u32,
    pub(super) connected_at: SystemTime,
    pub(super) peer_addr: SocketAddr,
    pub(super) local_addr: SocketAddr,
    pub(super) conn: BufReader<ControlStream>,
    pub(super) context: Arc<ProxyContext>,
    pub(super) state: SessionState,
    pub(super) control: Option<ControlRelay>,
    pub(super) transfer: Transfer,
    pub(super) guard: ConnectionGuard,
}

impl ClientSession {
    pub fn new(
        id: u32,
        stream: TcpStream,
        context: Arc<ProxyContext>,
        guard: ConnectionGuard,
    ) -> std::io::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;

        Ok(Self {
            id,
            connected_at: SystemTime::now(),
            peer_addr,
            local_addr,
            conn: BufReader::new(ControlStream::Plain(stream)),
            context,
            state: SessionState::default(),
            control: None,
            transfer: Transfer::default(),
            guard,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// The proxy's end of the client control connection.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.context.config
    }

    pub fn tls_acceptor(&self) -> Option<TlsAcceptor> {
        self.context.tls.clone()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// The command currently being processed.
    pub fn command(&self) -> CommandLine {
        self.state
            .line()
            .cloned()
            .unwrap_or_else(|| parse_line(b""))
    }

    // --------------------
    // Origin control relay
    // --------------------

    pub fn has_control(&self) -> bool {
        self.control.is_some()
    }

    pub fn control_mut(&mut self) -> Result<&mut ControlRelay, CommandError> {
        self.control.as_mut().ok_or(CommandError::NotConnected)
    }

    pub fn bind_control(&mut self, relay: ControlRelay) {
        self.control = Some(relay);
    }

    pub fn drop_control(&mut self) {
        if let Some(relay) = self.control.take() {
            info!("Session {}: dropping control relay to {}", self.id, relay.origin());
        }
    }

    // --------------------
    // Data transfer
    // --------------------

    pub fn transfer(&self) -> &Transfer {
        &self.transfer
    }

    pub fn transfer_mut(&mut self) -> &mut Transfer {
        &mut self.transfer
    }

    /// Installs a new transfer declaration, closing the previous one.
    pub fn set_transfer(&mut self, next: Transfer) {
        self.transfer.replace(next);
    }

    // --------------------
    // Client I/O
    // --------------------

    pub async fn write_raw(&mut self, data: &[u8]) -> Result<(), CommandError> {
        self.conn.write_all(data).await?;
        self.conn.flush().await?;
        Ok(())
    }

    pub async fn reply(&mut self, code: u16, text: &str) -> Result<(), CommandError> {
        self.write_raw(format_response(code, text).as_bytes()).await
    }

    /// Writes one line from the origin, normalising its terminator.
    pub async fn write_line(&mut self, line: &[u8]) -> Result<(), CommandError> {
        let mut out = trim_eol(line).to_vec();
        out.extend_from_slice(b"\r\n");
        self.write_raw(&out).await
    }

    pub async fn relay_reply(&mut self, reply: &Reply) -> Result<(), CommandError> {
        self.write_raw(&reply.to_wire()).await
    }

    // --------------------
    // TLS
    // --------------------

    pub fn is_secure(&self) -> bool {
        self.conn.get_ref().is_tls()
    }

    /// Bytes already read from the socket but not yet consumed as lines.
    pub fn has_buffered_input(&self) -> bool {
        !self.conn.buffer().is_empty()
    }

    /// Runs the server-side handshake on the client socket and swaps the
    /// session over to the encrypted stream.
    ///
    /// Callers must check `has_buffered_input` first: anything buffered
    /// would be plaintext that arrived before the handshake.
    pub async fn upgrade_tls(&mut self, acceptor: TlsAcceptor) -> Result<(), CommandError> {
        let previous = std::mem::replace(&mut self.conn, BufReader::new(ControlStream::Detached));
        match previous.into_inner() {
            ControlStream::Plain(tcp) => {
                let secure = acceptor.accept(tcp).await?;
                self.conn = BufReader::new(ControlStream::Tls(Box::new(secure)));
                info!("Session {}: control connection upgraded to TLS", self.id);
                Ok(())
            }
            other => {
                self.conn = BufReader::new(other);
                Err(CommandError::BadSequence("TLS already active".into()))
            }
        }
    }
}
