//! Transfer module for the FTP proxy
//!
//! Owns the data-connection side of the protocol: active (PORT) and passive
//! (PASV/EPSV) setups behind one `Transfer` sum type.

pub mod active;
pub mod handler;
pub mod passive;

pub use active::{ActiveTransfer, DEFAULT_DATA_PORT};
pub use handler::Transfer;
pub use passive::PassiveTransfer;
