use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::net::TcpListener;

use crate::client::ClientSession;
use crate::error::StartupError;
use crate::protocol::CommandRegistry;
use crate::server::config::ProxyConfig;
use crate::server::connections::ConnectionCounter;
use crate::server::context::ProxyContext;
use crate::server::tls::load_tls_acceptor;

pub struct Server {
    listener: TcpListener,
    context: Arc<ProxyContext>,
    next_id: AtomicU32,
}

impl Server {
    /// Binds the control listener with the standard command set.
    ///
    /// The configuration is used as given; `ProxyConfig::load` validates.
    pub async fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        Self::with_registry(config, CommandRegistry::standard()).await
    }

    /// Binds the control listener with a caller-supplied command set.
    pub async fn with_registry(
        config: ProxyConfig,
        registry: CommandRegistry,
    ) -> Result<Self, StartupError> {
        let tls = match (&config.tls_cert_path, &config.tls_key_path) {
            (Some(cert), Some(key)) => {
                let acceptor = load_tls_acceptor(cert, key)?;
                Some(acceptor)
            }
            _ => {
                warn!("No TLS certificate configured: AUTH TLS will be refused");
                None
            }
        };

        let socket = config.control_socket();
        let listener = match TcpListener::bind(&socket).await {
            Ok(listener) => {
                info!("Proxy bound to {}", socket);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", socket, e);
                return Err(StartupError::Bind(socket, e));
            }
        };

        Ok(Self {
            listener,
            context: Arc::new(ProxyContext::new(config, registry, tls)),
            next_id: AtomicU32::new(1),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn connections(&self) -> ConnectionCounter {
        self.context.connections.clone()
    }

    /// Accepts clients forever, one task per session.
    pub async fn start(&self) {
        let config = &self.context.config;
        info!(
            "Starting RAX FTP proxy on {} for origin {} (max {} clients)",
            config.control_socket(),
            config.origin_address,
            config.max_connections
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let guard = self.context.connections.acquire();
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    info!(
                        "Session {}: accepted {} ({} live)",
                        id,
                        addr,
                        guard.count_at_accept()
                    );

                    match ClientSession::new(id, stream, Arc::clone(&self.context), guard) {
                        Ok(session) => {
                            tokio::spawn(session.run());
                        }
                        Err(e) => warn!("Failed to set up session for {}: {}", addr, e),
                    }
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}
