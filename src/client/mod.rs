//! Client session management
//!
//! Handles the client control connection, per-session state and the
//! read-dispatch loop.

pub mod handler;
pub mod session;
pub mod state;
pub mod stream;

pub use session::ClientSession;
pub use state::SessionState;
pub use stream::ControlStream;
