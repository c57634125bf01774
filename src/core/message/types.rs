/*!
Request and response types of the four attestation operations.
*/

use std::fmt;

use bytes::Bytes;

use crate::core::constants::sizes::{
    CHALLENGE_SIZE, COORDINATE_SIZE, GCM_IV_SIZE, GCM_TAG_SIZE, GROUP_ID_SIZE, MAC_SIZE,
    PS_SECURITY_PROPERTIES_SIZE, PUBLIC_KEY_SIZE, SIGNATURE_SIZE, SPID_SIZE,
};

/// A P-256 public key in wire form: both coordinates little-endian
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WirePublicKey {
    /// x-coordinate, little-endian
    pub x: [u8; COORDINATE_SIZE],
    /// y-coordinate, little-endian
    pub y: [u8; COORDINATE_SIZE],
}

impl WirePublicKey {
    /// `x || y`
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let mut out = [0u8; PUBLIC_KEY_SIZE];
        out[..COORDINATE_SIZE].copy_from_slice(&self.x);
        out[COORDINATE_SIZE..].copy_from_slice(&self.y);
        out
    }

    /// Split a 64-byte `x || y` buffer
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_SIZE]) -> Self {
        let mut x = [0u8; COORDINATE_SIZE];
        let mut y = [0u8; COORDINATE_SIZE];
        x.copy_from_slice(&bytes[..COORDINATE_SIZE]);
        y.copy_from_slice(&bytes[COORDINATE_SIZE..]);
        Self { x, y }
    }
}

impl fmt::Debug for WirePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WirePublicKey({})", hex::encode(self.to_bytes()))
    }
}

/// An ECDSA signature in wire form
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WireSignature {
    /// r, little-endian
    pub r: [u8; COORDINATE_SIZE],
    /// s, little-endian
    pub s: [u8; COORDINATE_SIZE],
}

impl WireSignature {
    /// `r || s`
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        let mut out = [0u8; SIGNATURE_SIZE];
        out[..COORDINATE_SIZE].copy_from_slice(&self.r);
        out[COORDINATE_SIZE..].copy_from_slice(&self.s);
        out
    }
}

impl fmt::Debug for WireSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WireSignature({})", hex::encode(self.to_bytes()))
    }
}

/// Linkability of the EPID signature the enclave's quote should carry
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteType {
    /// Unlinkable signatures
    #[default]
    Unlinkable = 0,
    /// Linkable signatures
    Linkable = 1,
}

impl QuoteType {
    /// Convert a u16 value to a QuoteType
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(QuoteType::Unlinkable),
            1 => Some(QuoteType::Linkable),
            _ => None,
        }
    }

    /// Get the u16 value of this QuoteType
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Request to start an attestation
#[derive(Debug, Clone, Default)]
pub struct Request {}

/// Response to [`Request`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Id to quote in every following message
    pub session_id: u64,
    /// Fresh random challenge
    pub challenge: [u8; CHALLENGE_SIZE],
}

/// Message 1: the enclave's ephemeral key and EPID group
#[derive(Debug, Clone)]
pub struct Msg1 {
    pub session_id: u64,
    /// EPID group id of the platform
    pub group_id: [u8; GROUP_ID_SIZE],
    /// Enclave ephemeral public key
    pub ga: WirePublicKey,
}

/// Message 2: our ephemeral key, signed and MAC'd
#[derive(Debug, Clone)]
pub struct Msg2 {
    /// Server ephemeral public key
    pub gb: WirePublicKey,
    pub spid: [u8; SPID_SIZE],
    pub quote_type: QuoteType,
    pub kdf_id: u16,
    /// Long-term key signature over `gb || ga`
    pub signature: WireSignature,
    /// CMAC under SMK of the fields above
    pub cmac: [u8; MAC_SIZE],
    /// Signature revocation list for the enclave's group, possibly empty
    pub sig_rl: Bytes,
}

/// Message 3: the quote
#[derive(Debug, Clone)]
pub struct Msg3 {
    pub session_id: u64,
    /// CMAC under SMK of `ga || ps_security_properties || quote`
    pub cmac: [u8; MAC_SIZE],
    /// Echo of the enclave ephemeral public key
    pub ga: WirePublicKey,
    pub ps_security_properties: [u8; PS_SECURITY_PROPERTIES_SIZE],
    /// Raw `sgx_quote_t`
    pub quote: Bytes,
}

/// The attestation verdict reported back to the enclave
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttestationResult {
    pub enclave_trusted: bool,
    pub pse_trusted: bool,
    /// Platform info blob, present only when the verdict is not fully trusted
    pub platform_info_blob: Option<Bytes>,
    /// Advisory ids returned by the authority
    pub advisories: Vec<String>,
}

impl AttestationResult {
    /// A verdict with every flag cleared
    pub fn denied() -> Self {
        Self::default()
    }
}

/// The secret encrypted under SK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSecret {
    pub iv: [u8; GCM_IV_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; GCM_TAG_SIZE],
}

/// Message 4: the verdict and, if trusted, the secret
#[derive(Debug, Clone)]
pub struct Msg4 {
    pub result: AttestationResult,
    /// Absent unless the enclave is trusted
    pub encrypted_secret: Option<EncryptedSecret>,
    /// CMAC under MK of the transcript; all zero when no secret is released
    pub final_cmac: [u8; MAC_SIZE],
}
