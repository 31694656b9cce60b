//! Proxy configuration
//!
//! Loads `config.toml` with environment overrides and validates the result.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::StartupError;

/// Complete proxy configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProxyConfig {
    /// IP address the control listener binds to
    pub bind_address: String,

    /// Port for the client-facing control listener
    pub control_port: u16,

    /// `host:port` of the origin FTP server's control port
    pub origin_address: String,

    /// Live sessions beyond this count are declined at greeting time
    pub max_connections: usize,

    /// Seconds a client may stay silent before being disconnected; 0 disables
    pub idle_timeout_secs: u64,

    /// Bound on origin connect, data accept and data dial
    pub proxy_timeout_secs: u64,

    /// true: active-mode listeners take any free port; false: port 20
    pub use_unknown_active_data_port: bool,

    pub max_command_length: usize,

    /// PEM certificate chain; AUTH TLS is refused unless both paths are set
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            control_port: 2121,
            origin_address: "127.0.0.1:2321".to_string(),
            max_connections: 10,
            idle_timeout_secs: 300,
            proxy_timeout_secs: 30,
            use_unknown_active_data_port: true,
            max_command_length: 512,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from config.toml with environment overrides.
    ///
    /// Both file locations are optional; missing keys fall back to defaults.
    pub fn load() -> Result<Self, StartupError> {
        let settings = Config::builder()
            .add_source(File::with_name("rax-ftp-proxy/config").required(false))
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("RAX_PROXY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ProxyConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), StartupError> {
        if self.control_port == 0 {
            return Err(StartupError::Invalid("control_port cannot be 0".into()));
        }

        if self.max_connections == 0 {
            return Err(StartupError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.origin_address.parse::<SocketAddr>().is_err()
            && !self.origin_address.contains(':')
        {
            return Err(StartupError::Invalid(format!(
                "origin_address must be host:port, got {:?}",
                self.origin_address
            )));
        }

        if self.tls_cert_path.is_some() != self.tls_key_path.is_some() {
            return Err(StartupError::Invalid(
                "tls_cert_path and tls_key_path must be set together".into(),
            ));
        }

        if self.max_command_length < 16 {
            return Err(StartupError::Invalid(
                "max_command_length must be at least 16".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and control port as socket address string
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }
}
