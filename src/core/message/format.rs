/*!
Byte layouts of the protocol messages.

The layouts mirror the SGX SDK structures (`sgx_ra_msg1_t`, `sgx_ra_msg2_t`,
`sgx_ra_msg3_t`). Every multi-byte integer is little-endian. The session id
is transport metadata and is never part of the MAC'd bytes.
*/

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

use crate::core::{
    constants::{
        quote::MIN_SIZE as MIN_QUOTE_SIZE,
        sizes::{
            GROUP_ID_SIZE, MAC_SIZE, MSG2_PAYLOAD_SIZE, PS_SECURITY_PROPERTIES_SIZE,
            PUBLIC_KEY_SIZE, SIGNATURE_SIZE, SPID_SIZE,
        },
    },
    error::Result,
    message::types::{EncryptedSecret, Msg1, Msg2, Msg3, WirePublicKey},
};
use crate::format_err;

/// Size of message 1 on the wire
pub const MSG1_SIZE: usize = PUBLIC_KEY_SIZE + GROUP_ID_SIZE;

/// Offset of the quote inside message 3
pub const MSG3_QUOTE_OFFSET: usize = MAC_SIZE + PUBLIC_KEY_SIZE + PS_SECURITY_PROPERTIES_SIZE;

fn read_public_key(bytes: &[u8]) -> WirePublicKey {
    let mut buf = [0u8; PUBLIC_KEY_SIZE];
    buf.copy_from_slice(&bytes[..PUBLIC_KEY_SIZE]);
    WirePublicKey::from_bytes(&buf)
}

impl Msg1 {
    /// Encode as `ga || gid`
    pub fn to_bytes(&self) -> [u8; MSG1_SIZE] {
        let mut out = [0u8; MSG1_SIZE];
        out[..PUBLIC_KEY_SIZE].copy_from_slice(&self.ga.to_bytes());
        out[PUBLIC_KEY_SIZE..].copy_from_slice(&self.group_id);
        out
    }

    /// Parse `ga || gid`
    pub fn from_bytes(session_id: u64, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MSG1_SIZE {
            return format_err!("Message 1 should be {} bytes, got {}", MSG1_SIZE, bytes.len());
        }
        let mut group_id = [0u8; GROUP_ID_SIZE];
        group_id.copy_from_slice(&bytes[PUBLIC_KEY_SIZE..]);
        Ok(Self {
            session_id,
            group_id,
            ga: read_public_key(bytes),
        })
    }
}

impl Msg2 {
    /// The bytes covered by the message 2 CMAC:
    /// `gb || spid || quote_type || kdf_id || signature`
    pub fn payload_bytes(&self) -> [u8; MSG2_PAYLOAD_SIZE] {
        let mut out = [0u8; MSG2_PAYLOAD_SIZE];
        let mut offset = 0;
        out[offset..offset + PUBLIC_KEY_SIZE].copy_from_slice(&self.gb.to_bytes());
        offset += PUBLIC_KEY_SIZE;
        out[offset..offset + SPID_SIZE].copy_from_slice(&self.spid);
        offset += SPID_SIZE;
        LittleEndian::write_u16(&mut out[offset..offset + 2], self.quote_type.as_u16());
        offset += 2;
        LittleEndian::write_u16(&mut out[offset..offset + 2], self.kdf_id);
        offset += 2;
        out[offset..offset + SIGNATURE_SIZE].copy_from_slice(&self.signature.to_bytes());
        out
    }

    /// Encode as `payload || cmac || sig_rl_size || sig_rl`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MSG2_PAYLOAD_SIZE + MAC_SIZE + 4 + self.sig_rl.len());
        out.extend_from_slice(&self.payload_bytes());
        out.extend_from_slice(&self.cmac);
        let mut size = [0u8; 4];
        LittleEndian::write_u32(&mut size, self.sig_rl.len() as u32);
        out.extend_from_slice(&size);
        out.extend_from_slice(&self.sig_rl);
        out
    }
}

impl Msg3 {
    /// The bytes covered by the message 3 CMAC: `ga || ps_security_properties || quote`
    pub fn mac_region(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(PUBLIC_KEY_SIZE + PS_SECURITY_PROPERTIES_SIZE + self.quote.len());
        out.extend_from_slice(&self.ga.to_bytes());
        out.extend_from_slice(&self.ps_security_properties);
        out.extend_from_slice(&self.quote);
        out
    }

    /// Encode as `cmac || ga || ps_security_properties || quote`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MSG3_QUOTE_OFFSET + self.quote.len());
        out.extend_from_slice(&self.cmac);
        out.extend_from_slice(&self.mac_region());
        out
    }

    /// Parse `cmac || ga || ps_security_properties || quote`
    pub fn from_bytes(session_id: u64, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MSG3_QUOTE_OFFSET + MIN_QUOTE_SIZE {
            return format_err!(
                "Message 3 should be at least {} bytes, got {}",
                MSG3_QUOTE_OFFSET + MIN_QUOTE_SIZE,
                bytes.len()
            );
        }
        let mut cmac = [0u8; MAC_SIZE];
        cmac.copy_from_slice(&bytes[..MAC_SIZE]);
        let ga = read_public_key(&bytes[MAC_SIZE..]);
        let mut ps_security_properties = [0u8; PS_SECURITY_PROPERTIES_SIZE];
        ps_security_properties
            .copy_from_slice(&bytes[MAC_SIZE + PUBLIC_KEY_SIZE..MSG3_QUOTE_OFFSET]);
        Ok(Self {
            session_id,
            cmac,
            ga,
            ps_security_properties,
            quote: Bytes::copy_from_slice(&bytes[MSG3_QUOTE_OFFSET..]),
        })
    }
}

/// The bytes covered by the message 4 CMAC:
/// `ga || gb || msg3 cmac || enclave_trusted || pse_trusted || iv || ciphertext || tag`
pub fn msg4_transcript(
    ga: &WirePublicKey,
    gb: &WirePublicKey,
    msg3_cmac: &[u8; MAC_SIZE],
    enclave_trusted: bool,
    pse_trusted: bool,
    secret: &EncryptedSecret,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        2 * PUBLIC_KEY_SIZE + MAC_SIZE + 2 + secret.iv.len() + secret.ciphertext.len() + secret.tag.len(),
    );
    out.extend_from_slice(&ga.to_bytes());
    out.extend_from_slice(&gb.to_bytes());
    out.extend_from_slice(msg3_cmac);
    out.push(enclave_trusted as u8);
    out.push(pse_trusted as u8);
    out.extend_from_slice(&secret.iv);
    out.extend_from_slice(&secret.ciphertext);
    out.extend_from_slice(&secret.tag);
    out
}
