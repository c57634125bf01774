/*!
AES-CMAC based key derivation.

The key derivation key (KDK) is the AES-128 CMAC of the little-endian ECDH
shared secret under an all-zero key. Every other key is a CMAC of a fixed
derivation string under the KDK: a single-counter SP 800-108 construction
with the output length (128 bits) encoded as a little-endian 16-bit field.
*/

use std::fmt;

use aes::Aes128;
use cmac::{Cmac, Mac};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::{
    constants::{labels, sizes::{KEY_SIZE, MAC_SIZE}},
    error::{CryptoError, Error, Result},
};

/// A 128-bit key from the derivation tree. Wiped on drop, never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// CMAC `data` under this key
    pub fn mac(&self, data: &[u8]) -> Result<[u8; MAC_SIZE]> {
        cmac_128(&self.0, data)
    }

    /// Check `tag` against the CMAC of `data` in constant time
    pub fn verify(&self, data: &[u8], tag: &[u8]) -> Result<bool> {
        let mut mac = new_cmac(&self.0)?;
        mac.update(data);
        Ok(mac.verify_slice(tag).is_ok())
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// The four keys hanging off the KDK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLabel {
    /// Session MAC key
    Smk,
    /// Session key
    Sk,
    /// MAC key
    Mk,
    /// Verification key
    Vk,
}

impl KeyLabel {
    /// The literal derivation label
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            KeyLabel::Smk => labels::SMK,
            KeyLabel::Sk => labels::SK,
            KeyLabel::Mk => labels::MK,
            KeyLabel::Vk => labels::VK,
        }
    }
}

fn new_cmac(key: &[u8]) -> Result<Cmac<Aes128>> {
    <Cmac<Aes128> as Mac>::new_from_slice(key)
        .map_err(|_| Error::Crypto(CryptoError::KeyDerivationFailed))
}

/// One-shot AES-128 CMAC
pub fn cmac_128(key: &[u8; KEY_SIZE], data: &[u8]) -> Result<[u8; MAC_SIZE]> {
    let mut mac = new_cmac(key)?;
    mac.update(data);
    let mut tag = [0u8; MAC_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Derive the KDK from a 32-byte little-endian shared secret.
pub fn kdk_from_shared(shared: &[u8; 32]) -> Result<DerivedKey> {
    let zero_key = [0u8; KEY_SIZE];
    cmac_128(&zero_key, shared).map(DerivedKey)
}

/// Build the derivation input `0x01 || label || 0x00 || 0x80 || 0x00`.
pub fn key_derivation_string(label: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; 4 + label.len()];
    out[0] = 0x01;
    out[1..1 + label.len()].copy_from_slice(label);
    let len = out.len();
    out[len - 2] = 0x80;
    out
}

/// Derive a sub-key from `base` for an arbitrary label.
pub fn derive_label_key(base: &DerivedKey, label: &[u8]) -> Result<DerivedKey> {
    base.mac(&key_derivation_string(label)).map(DerivedKey)
}

/// Derive one of the named protocol keys from the KDK.
pub fn derive_key(kdk: &DerivedKey, label: KeyLabel) -> Result<DerivedKey> {
    derive_label_key(kdk, label.as_bytes())
}
