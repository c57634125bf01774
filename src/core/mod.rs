//! Core components of the attestation server.
//!
//! This module contains the building blocks of the handshake: the wire
//! codec and key derivation, message layouts, quote verification, sessions,
//! configuration and error handling.

// Cryptographic primitives
pub mod crypto;

// Message types and layouts
pub mod message;

// Quote verification
pub mod attestation;

// Session state machine and registry
pub mod session;

// Constant-time helpers
pub mod security;

// Configuration loading
pub mod config;

// Protocol constants
pub mod constants;

// Error handling
pub mod error;

// Re-exports for convenience
pub use self::config::{Configuration, SessionConfig};
pub use self::error::{ConfigError, CryptoError, Error, KeyExchangeError, Result};
pub use self::session::{Session, SessionManager, SessionState};
