/*!
Cryptographic components for the attestation protocol.

This module provides the wire coordinate codec, ECDH key exchange, the
CMAC-based key derivation tree, long-term ECDSA signing and the AES-GCM
encryption of the delivered secret.
*/

// Big-endian <-> little-endian coordinate conversion
pub mod codec;

// ECDH key exchange
pub mod key_exchange;

// CMAC and the label KDF
pub mod kdf;

// Long-term signing key
pub mod signing;

// Secret encryption
pub mod cipher;

pub use codec::{decode_point, decode_public_key, encode_point, encode_public_key};
pub use kdf::{DerivedKey, KeyLabel, cmac_128, derive_key, derive_label_key};
pub use key_exchange::{EphemeralKeyPair, exchange, kdk};
pub use signing::LongTermKey;
