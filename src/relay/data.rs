//! Module `data`
//!
//! Bridges one data connection between the client-facing and origin-facing
//! sockets. The copy runs on its own task so the control loop can keep
//! reading replies while bytes flow.

use log::{debug, info, warn};
use std::net::SocketAddr;
use tokio::io::copy_bidirectional;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

/// Sockets waiting for `start`, or the task bridging them.
enum RelayState {
    Pending {
        client_side: TcpStream,
        origin_side: TcpStream,
    },
    Running(JoinHandle<()>),
    Closed,
}

pub struct DataRelay {
    client_peer: Option<SocketAddr>,
    origin_peer: Option<SocketAddr>,
    state: RelayState,
}

impl DataRelay {
    pub fn new(client_side: TcpStream, origin_side: TcpStream) -> Self {
        Self {
            client_peer: client_side.peer_addr().ok(),
            origin_peer: origin_side.peer_addr().ok(),
            state: RelayState::Pending {
                client_side,
                origin_side,
            },
        }
    }

    /// Spawns the bridge. Calling it again on a running relay does nothing.
    ///
    /// With `tls` set the client-facing socket is wrapped in server-side TLS
    /// before any byte is copied.
    pub fn start(&mut self, tls: Option<TlsAcceptor>) {
        let state = std::mem::replace(&mut self.state, RelayState::Closed);
        self.state = match state {
            RelayState::Pending {
                client_side,
                origin_side,
            } => {
                let label = format!(
                    "{} <-> {}",
                    display_peer(self.client_peer),
                    display_peer(self.origin_peer)
                );
                RelayState::Running(tokio::spawn(bridge(client_side, origin_side, tls, label)))
            }
            other => {
                debug!("Data relay already started; reusing it");
                other
            }
        };
    }

    pub fn is_running(&self) -> bool {
        match &self.state {
            RelayState::Running(handle) => !handle.is_finished(),
            _ => false,
        }
    }

    /// Aborts an in-flight bridge and drops any sockets not yet bridged.
    pub fn close(&mut self) {
        if self.is_running() {
            debug!("Aborting in-flight data relay");
        }
        if let RelayState::Running(handle) = &self.state {
            handle.abort();
        }
        self.state = RelayState::Closed;
    }
}

fn display_peer(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn bridge(
    mut client_side: TcpStream,
    mut origin_side: TcpStream,
    tls: Option<TlsAcceptor>,
    label: String,
) {
    let result = match tls {
        Some(acceptor) => match acceptor.accept(client_side).await {
            Ok(mut secure) => copy_bidirectional(&mut secure, &mut origin_side).await,
            Err(e) => Err(e),
        },
        None => copy_bidirectional(&mut client_side, &mut origin_side).await,
    };

    match result {
        Ok((to_origin, to_client)) => info!(
            "Data relay {} finished: {} bytes to origin, {} bytes to client",
            label, to_origin, to_client
        ),
        Err(e) => warn!("Data relay {} failed: {}", label, e),
    }
}
