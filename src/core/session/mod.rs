/*!
Attestation sessions.

This module provides the per-handshake state machine and the manager that
owns all live sessions.
*/

// State machine
pub mod state;

// One handshake
pub mod session;

// Session registry
pub mod manager;

// Re-export main session types
pub use self::manager::SessionManager;
pub use self::session::Session;
pub use self::state::{Handshake, SessionState};
