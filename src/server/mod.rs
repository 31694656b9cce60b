//! Server core functionality
//!
//! The control listener, its configuration, TLS provisioning and the state
//! shared by every session.

pub mod config;
pub mod connections;
pub mod context;
pub mod core;
pub mod tls;

pub use config::ProxyConfig;
pub use connections::{ConnectionCounter, ConnectionGuard};
pub use core::Server;
