/*!
Constants for the attestation protocol.

Sizes and offsets follow the SGX SDK structure layouts (`sgx_ra_msg2_t`,
`sgx_ra_msg3_t`, `sgx_quote_t`, `sgx_report_body_t`).
*/

/// Key derivation function id announced in message 2 (AES-CMAC KDF)
pub const KDF_ID: u16 = 0x0001;

/// Default time allowed for a single call to the attestation authority
pub const DEFAULT_AUTHORITY_TIMEOUT_SECS: u64 = 30;

/// Derivation labels for the keys hanging off the KDK
pub mod labels {
    /// Session MAC key, authenticates messages 2 and 3
    pub const SMK: &[u8] = b"SMK";
    /// Session key, encrypts the delivered secret
    pub const SK: &[u8] = b"SK";
    /// MAC key, authenticates message 4
    pub const MK: &[u8] = b"MK";
    /// Verification key, bound into the quote's report data
    pub const VK: &[u8] = b"VK";
}

/// Size constants for the protocol
pub mod sizes {
    /// Size of one curve coordinate on the wire
    pub const COORDINATE_SIZE: usize = 32;

    /// Size of an uncompressed public key on the wire (x || y)
    pub const PUBLIC_KEY_SIZE: usize = 2 * COORDINATE_SIZE;

    /// Size of an ECDSA signature on the wire (r || s)
    pub const SIGNATURE_SIZE: usize = 2 * COORDINATE_SIZE;

    /// Size of every symmetric key in the derivation tree
    pub const KEY_SIZE: usize = 16;

    /// Size of a CMAC tag
    pub const MAC_SIZE: usize = 16;

    /// Size of the service provider id
    pub const SPID_SIZE: usize = 16;

    /// Size of an EPID group id
    pub const GROUP_ID_SIZE: usize = 4;

    /// Size of the session challenge
    pub const CHALLENGE_SIZE: usize = 32;

    /// Size of the platform service security properties in message 3
    pub const PS_SECURITY_PROPERTIES_SIZE: usize = 256;

    /// Size of an enclave measurement (MRENCLAVE / MRSIGNER)
    pub const MEASUREMENT_SIZE: usize = 32;

    /// Size of the AES-GCM IV used for the delivered secret
    pub const GCM_IV_SIZE: usize = 12;

    /// Size of the AES-GCM authentication tag
    pub const GCM_TAG_SIZE: usize = 16;

    /// Size of the signed part of message 2:
    /// gb || spid || quote_type || kdf_id || signature
    pub const MSG2_PAYLOAD_SIZE: usize = PUBLIC_KEY_SIZE + SPID_SIZE + 2 + 2 + SIGNATURE_SIZE;
}

/// Byte offsets inside an `sgx_quote_t`
pub mod quote {
    /// Quote structure up to (excluding) the signature length field
    pub const BODY_SIZE: usize = 432;

    /// Smallest acceptable quote: body plus the signature length field
    pub const MIN_SIZE: usize = 436;

    /// Offset of the EPID group id
    pub const GROUP_ID_OFFSET: usize = 4;

    /// Offset of the report body
    pub const REPORT_BODY_OFFSET: usize = 48;

    /// Offset of the enclave attribute flags
    pub const ATTRIBUTES_OFFSET: usize = REPORT_BODY_OFFSET + 48;

    /// Offset of MRENCLAVE
    pub const MRENCLAVE_OFFSET: usize = REPORT_BODY_OFFSET + 64;

    /// Offset of MRSIGNER
    pub const MRSIGNER_OFFSET: usize = REPORT_BODY_OFFSET + 128;

    /// Offset of ISVPRODID
    pub const ISV_PROD_ID_OFFSET: usize = REPORT_BODY_OFFSET + 256;

    /// Offset of ISVSVN
    pub const ISV_SVN_OFFSET: usize = REPORT_BODY_OFFSET + 258;

    /// Offset of the 64-byte report data
    pub const REPORT_DATA_OFFSET: usize = REPORT_BODY_OFFSET + 320;

    /// Size of the report data
    pub const REPORT_DATA_SIZE: usize = 64;

    /// Offset of the signature length field
    pub const SIGNATURE_LEN_OFFSET: usize = BODY_SIZE;

    /// Attribute flag set for debug enclaves
    pub const FLAG_DEBUG: u64 = 0x0000_0000_0000_0002;
}
