//! Active mode (PORT) transfers
//!
//! The client announced where it listens. The proxy opens its own listener,
//! tells the origin to connect there, and on the first data command accepts
//! the origin's connection and dials out to the client's declared address.

use log::info;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time;

use crate::error::TransferError;
use crate::relay::DataRelay;

/// Conventional FTP data port used when ephemeral ports are disabled.
pub const DEFAULT_DATA_PORT: u16 = 20;

pub struct ActiveTransfer {
    listener: TcpListener,
    local_addr: SocketAddr,
    client_addr: SocketAddrV4,
    relay: Option<DataRelay>,
}

impl ActiveTransfer {
    /// Binds the origin-facing listener.
    ///
    /// `ephemeral` picks any free port; otherwise the listener takes port 20.
    pub async fn bind(ephemeral: bool, client_addr: SocketAddrV4) -> Result<Self, TransferError> {
        let port = if ephemeral { 0 } else { DEFAULT_DATA_PORT };
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| TransferError::PortBindingFailed(bind_addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransferError::PortBindingFailed(bind_addr, e))?;

        info!(
            "Active transfer listening on {} for client data address {}",
            local_addr,
            client_addr
        );

        Ok(Self {
            listener,
            local_addr,
            client_addr,
            relay: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address the client declared with PORT.
    pub fn client_addr(&self) -> SocketAddrV4 {
        self.client_addr
    }

    /// Accepts the origin's data connection and dials the client, once.
    /// Later calls hand back the relay built by the first one.
    pub async fn open(&mut self, timeout: Duration) -> Result<&mut DataRelay, TransferError> {
        let relay = match self.relay.take() {
            Some(relay) => relay,
            None => {
                let local = self.local_addr;
                let (origin_side, origin_peer) = time::timeout(timeout, self.listener.accept())
                    .await
                    .map_err(|_| TransferError::AcceptTimeout(local))?
                    .map_err(TransferError::AcceptFailed)?;

                let target = SocketAddr::V4(self.client_addr);
                let client_side = time::timeout(timeout, TcpStream::connect(target))
                    .await
                    .map_err(|_| TransferError::DialTimeout(target))?
                    .map_err(|e| TransferError::DialFailed(target, e))?;

                info!(
                    "Active data connection: origin {} -> proxy {} -> client {}",
                    origin_peer, local, target
                );
                DataRelay::new(client_side, origin_side)
            }
        };

        Ok(self.relay.insert(relay))
    }

    /// Drops the relay if one was built. Safe on a handler never opened.
    pub fn close(&mut self) {
        if let Some(mut relay) = self.relay.take() {
            relay.close();
        }
    }
}
