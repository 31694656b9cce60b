//! Error handling
//!
//! Defines error types and their mapping to FTP replies.

pub mod handlers;
pub mod types;

pub use handlers::{error_reply, error_to_ftp_code, handle_error, is_terminal};
pub use types::*;
