//! Transfer handler
//!
//! The session's current data-connection setup. Exactly one exists at a
//! time; declaring a new one closes the previous.

use std::time::Duration;

use crate::error::TransferError;
use crate::relay::DataRelay;
use crate::transfer::active::ActiveTransfer;
use crate::transfer::passive::PassiveTransfer;

#[derive(Default)]
pub enum Transfer {
    /// No PORT/PASV issued since the last reset
    #[default]
    None,
    Active(ActiveTransfer),
    Passive(PassiveTransfer),
}

impl Transfer {
    pub fn is_declared(&self) -> bool {
        !matches!(self, Transfer::None)
    }

    /// Passive transfers need the client's connection before the origin
    /// will answer a data command, so they are opened first.
    pub fn opens_before_reply(&self) -> bool {
        matches!(self, Transfer::Passive(_))
    }

    /// Builds (or returns the already built) data relay.
    pub async fn open(&mut self, timeout: Duration) -> Result<&mut DataRelay, TransferError> {
        match self {
            Transfer::None => Err(TransferError::NoTransferDeclared),
            Transfer::Active(active) => active.open(timeout).await,
            Transfer::Passive(passive) => passive.open(timeout).await,
        }
    }

    /// Closes the current relay, keeping the declaration.
    pub fn close(&mut self) {
        match self {
            Transfer::None => {}
            Transfer::Active(active) => active.close(),
            Transfer::Passive(passive) => passive.close(),
        }
    }

    /// Closes and discards the current declaration in favour of `next`.
    pub fn replace(&mut self, next: Transfer) {
        self.close();
        *self = next;
    }
}
