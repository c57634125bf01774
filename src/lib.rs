/*!
# SGX Remote Attestation Server

The service-provider side of the Intel SGX EPID remote attestation handshake.

## Overview

A remote enclave proves its identity and patch level to this server and, if
it is trusted, receives a secret that only it can decrypt:

- `start_attestation` opens a session and returns a challenge
- message 1 carries the enclave's ephemeral P-256 key; the server answers
  with its own key, signed with its long-term key (message 2)
- message 3 carries the enclave's quote, which is checked against the key
  exchange, the attestation authority and the local policy
- message 4 carries the verdict and, when trusted, the secret encrypted
  under the session key

The attestation authority (Intel Attestation Service or a stand-in) is an
external collaborator behind the [`AttestationAuthority`] trait. Transports
host the [`AttestationServer`] trait, which [`SessionManager`] implements.
*/

// Core protocol components
pub mod core;

// Protocol surface
pub mod protocol;

// Re-export commonly used types for convenience
pub use core::attestation::{
    AttestationAuthority, IdentityPolicy, QuoteStatus, QuoteVerdict, StaticAuthority,
};
pub use core::config::{Configuration, SessionConfig};
pub use core::constants::sizes;
pub use core::crypto::LongTermKey;
pub use core::error::{ConfigError, CryptoError, Error, KeyExchangeError, Result};
pub use core::message::{
    AttestationResult, Challenge, EncryptedSecret, Msg1, Msg2, Msg3, Msg4, QuoteType, Request,
    WirePublicKey, WireSignature,
};
pub use core::session::{SessionManager, SessionState};
pub use protocol::server::AttestationServer;
