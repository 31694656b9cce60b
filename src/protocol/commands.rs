//! Module `commands`
//!
//! The command registry: verb to handler lookup, built once at startup and
//! shared read-only by every session.

use futures::future::BoxFuture;
use std::collections::HashMap;

use crate::client::ClientSession;
use crate::error::CommandError;
use crate::protocol::handlers;

/// What the session does with the raw line once the handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Relay the line to the origin and its reply to the client
    Forward,
    /// The handler answered the client itself
    Handled,
    /// End the session after this command
    CloseConnection,
}

pub type CommandResult = Result<CommandStatus, CommandError>;

pub type HandlerFuture<'a> = BoxFuture<'a, CommandResult>;

pub type Handler = for<'a> fn(&'a mut ClientSession) -> HandlerFuture<'a>;

/// One registry entry.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub verb: &'static str,
    /// Usable before login. Recorded but not enforced.
    pub open: bool,
    pub handler: Handler,
}

#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandSpec>,
}

impl CommandRegistry {
    /// An empty registry: every verb passes straight through.
    pub fn new() -> Self {
        Self::default()
    }

    /// The proxy's intercepted command set.
    pub fn standard() -> Self {
        Self::new()
            .with("USER", true, handlers::handle_cmd_user)
            .with("AUTH", true, handlers::handle_cmd_auth)
            .with("PBSZ", true, handlers::handle_cmd_pbsz)
            .with("PROT", true, handlers::handle_cmd_prot)
            .with("FEAT", true, handlers::handle_cmd_feat)
            .with("QUIT", true, handlers::handle_cmd_quit)
            .with("PORT", false, handlers::handle_cmd_port)
            .with("PASV", false, handlers::handle_cmd_pasv)
            .with("EPSV", false, handlers::handle_cmd_pasv)
            .with("LIST", false, handlers::handle_cmd_data)
            .with("NLST", false, handlers::handle_cmd_data)
            .with("MLSD", false, handlers::handle_cmd_data)
            .with("RETR", false, handlers::handle_cmd_data)
            .with("STOR", false, handlers::handle_cmd_data)
            .with("STOU", false, handlers::handle_cmd_data)
            .with("APPE", false, handlers::handle_cmd_data)
            .with("REST", false, handlers::handle_cmd_rest)
            .with("RNFR", false, handlers::handle_cmd_rnfr)
            .with("RNTO", false, handlers::handle_cmd_rnto)
    }

    /// Adds or replaces the entry for `verb`.
    pub fn with(mut self, verb: &'static str, open: bool, handler: Handler) -> Self {
        self.commands
            .insert(verb, CommandSpec { verb, open, handler });
        self
    }

    /// Looks up an uppercase verb.
    pub fn get(&self, verb: &str) -> Option<&CommandSpec> {
        self.commands.get(verb)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
