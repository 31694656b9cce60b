//! Module `state`
//!
//! Defines the `SessionState` struct holding the protocol-level state of one
//! client session: the command being processed and the context commands
//! leave behind for later ones.

use crate::protocol::CommandLine;

/// Protocol state of a connected FTP client.
#[derive(Debug, Default)]
pub struct SessionState {
    line: Option<CommandLine>,
    rename_from: Option<String>,
    restart_offset: u64,
    transfer_tls: bool,
}

impl SessionState {
    // --------------------
    // Getter methods
    // --------------------

    /// Returns the command currently being processed.
    pub fn line(&self) -> Option<&CommandLine> {
        self.line.as_ref()
    }

    /// Returns the path given by the last RNFR, if no RNTO followed it yet.
    pub fn rename_from(&self) -> Option<&str> {
        self.rename_from.as_deref()
    }

    /// Returns the byte offset given by the last REST.
    pub fn restart_offset(&self) -> u64 {
        self.restart_offset
    }

    /// Returns whether data connections must be TLS-protected (PROT P).
    pub fn transfer_tls(&self) -> bool {
        self.transfer_tls
    }

    // --------------------
    // Setter methods
    // --------------------

    pub fn set_line(&mut self, line: CommandLine) {
        self.line = Some(line);
    }

    pub fn set_rename_from(&mut self, path: Option<String>) {
        self.rename_from = path;
    }

    pub fn set_restart_offset(&mut self, offset: u64) {
        self.restart_offset = offset;
    }

    pub fn set_transfer_tls(&mut self, enabled: bool) {
        self.transfer_tls = enabled;
    }
}
