/*!
Read-only view over the fields of an `sgx_quote_t` that the server checks.
*/

use byteorder::{ByteOrder, LittleEndian};
use sha2::{Digest, Sha256};

use crate::core::{
    constants::{
        quote::{
            ATTRIBUTES_OFFSET, FLAG_DEBUG, GROUP_ID_OFFSET, ISV_PROD_ID_OFFSET, ISV_SVN_OFFSET,
            MIN_SIZE, MRENCLAVE_OFFSET, MRSIGNER_OFFSET, REPORT_DATA_OFFSET, REPORT_DATA_SIZE,
            SIGNATURE_LEN_OFFSET,
        },
        sizes::{GROUP_ID_SIZE, MEASUREMENT_SIZE},
    },
    crypto::DerivedKey,
    error::Result,
    message::WirePublicKey,
    security::constant_time_eq,
};
use crate::format_err;

/// Size of the key-exchange binding at the start of the report data
pub const BINDING_SIZE: usize = 32;

/// The identity and patch-level fields of a quote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteBody {
    pub group_id: [u8; GROUP_ID_SIZE],
    pub attribute_flags: u64,
    pub mr_enclave: [u8; MEASUREMENT_SIZE],
    pub mr_signer: [u8; MEASUREMENT_SIZE],
    pub isv_prod_id: u16,
    pub isv_svn: u16,
    pub report_data: [u8; REPORT_DATA_SIZE],
}

impl QuoteBody {
    /// Parse a full quote: the 432-byte body, the signature length and the
    /// signature itself.
    pub fn parse(quote: &[u8]) -> Result<Self> {
        if quote.len() < MIN_SIZE {
            return format_err!("Quote should be at least {} bytes, got {}", MIN_SIZE, quote.len());
        }
        let signature_len = LittleEndian::read_u32(&quote[SIGNATURE_LEN_OFFSET..MIN_SIZE]) as usize;
        if quote.len() - MIN_SIZE != signature_len {
            return format_err!(
                "Quote signature length {} does not match the {} trailing bytes",
                signature_len,
                quote.len() - MIN_SIZE
            );
        }

        let mut group_id = [0u8; GROUP_ID_SIZE];
        group_id.copy_from_slice(&quote[GROUP_ID_OFFSET..GROUP_ID_OFFSET + GROUP_ID_SIZE]);
        let mut mr_enclave = [0u8; MEASUREMENT_SIZE];
        mr_enclave.copy_from_slice(&quote[MRENCLAVE_OFFSET..MRENCLAVE_OFFSET + MEASUREMENT_SIZE]);
        let mut mr_signer = [0u8; MEASUREMENT_SIZE];
        mr_signer.copy_from_slice(&quote[MRSIGNER_OFFSET..MRSIGNER_OFFSET + MEASUREMENT_SIZE]);
        let mut report_data = [0u8; REPORT_DATA_SIZE];
        report_data.copy_from_slice(&quote[REPORT_DATA_OFFSET..REPORT_DATA_OFFSET + REPORT_DATA_SIZE]);

        Ok(Self {
            group_id,
            attribute_flags: LittleEndian::read_u64(&quote[ATTRIBUTES_OFFSET..ATTRIBUTES_OFFSET + 8]),
            mr_enclave,
            mr_signer,
            isv_prod_id: LittleEndian::read_u16(&quote[ISV_PROD_ID_OFFSET..ISV_PROD_ID_OFFSET + 2]),
            isv_svn: LittleEndian::read_u16(&quote[ISV_SVN_OFFSET..ISV_SVN_OFFSET + 2]),
            report_data,
        })
    }

    /// Whether the enclave was launched in debug mode
    pub fn is_debug(&self) -> bool {
        self.attribute_flags & FLAG_DEBUG != 0
    }

    /// Whether the first half of the report data carries `binding`
    pub fn is_bound_to(&self, binding: &[u8; BINDING_SIZE]) -> bool {
        constant_time_eq(&self.report_data[..BINDING_SIZE], binding)
    }
}

/// `SHA-256(ga || gb || VK)`, which the enclave places in its report data to
/// tie the quote to this key exchange.
pub fn key_exchange_binding(
    ga: &WirePublicKey,
    gb: &WirePublicKey,
    vk: &DerivedKey,
) -> [u8; BINDING_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(ga.to_bytes());
    hasher.update(gb.to_bytes());
    hasher.update(vk.as_bytes());
    let mut binding = [0u8; BINDING_SIZE];
    binding.copy_from_slice(&hasher.finalize());
    binding
}

/// Assemble a quote with the given fields and an empty signature. Enclave-side
/// tooling uses this to produce fixtures for stub authorities.
pub fn build_unsigned_quote(body: &QuoteBody) -> Vec<u8> {
    let mut quote = vec![0u8; MIN_SIZE];
    LittleEndian::write_u16(&mut quote[0..2], 2);
    quote[GROUP_ID_OFFSET..GROUP_ID_OFFSET + GROUP_ID_SIZE].copy_from_slice(&body.group_id);
    LittleEndian::write_u64(&mut quote[ATTRIBUTES_OFFSET..ATTRIBUTES_OFFSET + 8], body.attribute_flags);
    quote[MRENCLAVE_OFFSET..MRENCLAVE_OFFSET + MEASUREMENT_SIZE].copy_from_slice(&body.mr_enclave);
    quote[MRSIGNER_OFFSET..MRSIGNER_OFFSET + MEASUREMENT_SIZE].copy_from_slice(&body.mr_signer);
    LittleEndian::write_u16(&mut quote[ISV_PROD_ID_OFFSET..ISV_PROD_ID_OFFSET + 2], body.isv_prod_id);
    LittleEndian::write_u16(&mut quote[ISV_SVN_OFFSET..ISV_SVN_OFFSET + 2], body.isv_svn);
    quote[REPORT_DATA_OFFSET..REPORT_DATA_OFFSET + REPORT_DATA_SIZE].copy_from_slice(&body.report_data);
    quote
}
