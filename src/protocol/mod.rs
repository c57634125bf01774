//! Protocol surface of the attestation server.
//!
//! This module exposes the session manager to transports, either as typed
//! messages or as raw SGX structures.

// Server implementation
pub mod server;

// Re-export for convenience
pub use server::AttestationServer;
