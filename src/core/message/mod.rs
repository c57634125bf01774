/*!
Message handling for the attestation protocol.

This module provides the request and response types of the four protocol
operations and their little-endian byte layouts.
*/

pub mod types;
pub mod format;

// Re-export commonly used items
pub use types::{
    AttestationResult, Challenge, EncryptedSecret, Msg1, Msg2, Msg3, Msg4, QuoteType, Request,
    WirePublicKey, WireSignature,
};
pub use format::msg4_transcript;
