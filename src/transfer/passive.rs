//! Passive mode (PASV/EPSV) transfers
//!
//! The origin told the proxy where it listens; the proxy listens in turn on
//! the client-facing interface and, on the first data command, accepts the
//! client's connection and dials the origin's data address.

use log::info;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time;

use crate::error::TransferError;
use crate::relay::DataRelay;

pub struct PassiveTransfer {
    listener: TcpListener,
    local_addr: SocketAddr,
    origin_addr: SocketAddr,
    relay: Option<DataRelay>,
}

impl PassiveTransfer {
    /// Binds an ephemeral client-facing listener on `bind_ip`.
    pub async fn bind(bind_ip: IpAddr, origin_addr: SocketAddr) -> Result<Self, TransferError> {
        let bind_addr = SocketAddr::new(bind_ip, 0);
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| TransferError::PortBindingFailed(bind_addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransferError::PortBindingFailed(bind_addr, e))?;

        info!(
            "Passive transfer listening on {} for origin data address {}",
            local_addr,
            origin_addr
        );

        Ok(Self {
            listener,
            local_addr,
            origin_addr,
            relay: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn origin_addr(&self) -> SocketAddr {
        self.origin_addr
    }

    /// Accepts the client's data connection and dials the origin, once.
    pub async fn open(&mut self, timeout: Duration) -> Result<&mut DataRelay, TransferError> {
        let relay = match self.relay.take() {
            Some(relay) => relay,
            None => {
                let local = self.local_addr;
                let (client_side, client_peer) = time::timeout(timeout, self.listener.accept())
                    .await
                    .map_err(|_| TransferError::AcceptTimeout(local))?
                    .map_err(TransferError::AcceptFailed)?;

                let target = self.origin_addr;
                let origin_side = time::timeout(timeout, TcpStream::connect(target))
                    .await
                    .map_err(|_| TransferError::DialTimeout(target))?
                    .map_err(|e| TransferError::DialFailed(target, e))?;

                info!(
                    "Passive data connection: client {} -> proxy {} -> origin {}",
                    client_peer, local, target
                );
                DataRelay::new(client_side, origin_side)
            }
        };

        Ok(self.relay.insert(relay))
    }

    pub fn close(&mut self) {
        if let Some(mut relay) = self.relay.take() {
            relay.close();
        }
    }
}
