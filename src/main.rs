//! RAX FTP Proxy - Entry Point
//!
//! Sits between FTP clients and one origin FTP server, relaying the control
//! channel and rewriting data-connection addresses.

use env_logger::Env;
use log::{error, info};

use rax_ftp_proxy::{ProxyConfig, Server};

#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default level
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Launching FTP proxy...");

    let config = match ProxyConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Proxy startup failed: {}", e);
            std::process::exit(1);
        }
    };

    server.start().await;
}
