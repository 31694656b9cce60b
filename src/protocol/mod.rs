//! FTP Protocol implementation
//!
//! Handles command parsing, reply framing, the address wire format and the
//! handlers for intercepted commands.

pub mod address;
pub mod commands;
pub mod handlers;
pub mod parser;
pub mod responses;

pub use commands::{CommandRegistry, CommandResult, CommandSpec, CommandStatus, Handler, HandlerFuture};
pub use parser::{CommandLine, parse_line};
pub use responses::Reply;
