//! Relay module for the FTP proxy
//!
//! Moves lines and bytes between the proxy and the origin: one control relay
//! per session, one data relay per transfer.

pub mod control;
pub mod data;

pub use control::ControlRelay;
pub use data::DataRelay;
