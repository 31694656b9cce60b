pub mod client;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod transfer;

pub use server::{ProxyConfig, Server};
