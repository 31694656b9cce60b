//! Shared proxy context
//!
//! Everything sessions read but never mutate, plus the live-connection counter.

use tokio_rustls::TlsAcceptor;

use crate::protocol::CommandRegistry;
use crate::server::config::ProxyConfig;
use crate::server::connections::ConnectionCounter;

pub struct ProxyContext {
    pub config: ProxyConfig,
    pub registry: CommandRegistry,
    /// Absent when no certificate is configured; AUTH is then refused
    pub tls: Option<TlsAcceptor>,
    pub connections: ConnectionCounter,
}

impl ProxyContext {
    pub fn new(config: ProxyConfig, registry: CommandRegistry, tls: Option<TlsAcceptor>) -> Self {
        Self {
            config,
            registry,
            tls,
            connections: ConnectionCounter::new(),
        }
    }
}
