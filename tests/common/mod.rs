// Enclave-side half of the handshake, shared by the integration tests
#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use p256::{
    SecretKey,
    ecdsa::{VerifyingKey, signature::Verifier},
};
use rand::rngs::OsRng;

use sgx_ra_server::{
    AttestationAuthority, Error, LongTermKey, Msg1, Msg2, Msg3, QuoteType, QuoteVerdict, Result,
    SessionConfig, WirePublicKey, WireSignature,
    core::{
        attestation::{QuoteBody, build_unsigned_quote, key_exchange_binding},
        constants::{KDF_ID, sizes::MSG2_PAYLOAD_SIZE},
        crypto::{
            DerivedKey, EphemeralKeyPair, KeyLabel, derive_key, encode_public_key, kdk,
            decode_public_key,
            signing::{decode_signature, key_exchange_transcript},
        },
    },
};

pub const SPID: [u8; 16] = [0x11; 16];
pub const MR_ENCLAVE: [u8; 32] = [0xe0; 32];
pub const MR_SIGNER: [u8; 32] = [0x51; 32];
pub const PROD_ID: u16 = 1;
pub const MIN_SVN: u16 = 2;
pub const GROUP_ID: [u8; 4] = [0x0b, 0x0c, 0, 0];
pub const SECRET: &[u8] = b"the database password";

/// A server configuration accepting [`MR_ENCLAVE`] at [`MIN_SVN`] or later
pub fn server_config() -> SessionConfig {
    let key = LongTermKey::new(&SecretKey::random(&mut OsRng));
    SessionConfig::new(SPID, key, SECRET.to_vec())
        .with_mr_enclave(MR_ENCLAVE)
        .with_prod_id(PROD_ID)
        .with_min_isv_svn(MIN_SVN)
}

/// Keys the enclave derives after checking message 2
pub struct EnclaveKeys {
    pub gb: WirePublicKey,
    pub smk: DerivedKey,
    pub sk: DerivedKey,
    pub mk: DerivedKey,
    pub vk: DerivedKey,
}

/// What the enclave reports about itself in its quote
#[derive(Clone)]
pub struct Identity {
    pub group_id: [u8; 4],
    pub attribute_flags: u64,
    pub mr_enclave: [u8; 32],
    pub mr_signer: [u8; 32],
    pub isv_prod_id: u16,
    pub isv_svn: u16,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            group_id: GROUP_ID,
            attribute_flags: 0x4,
            mr_enclave: MR_ENCLAVE,
            mr_signer: MR_SIGNER,
            isv_prod_id: PROD_ID,
            isv_svn: MIN_SVN,
        }
    }
}

/// A simulated enclave that trusts the server's long-term public key
pub struct Enclave {
    ephemeral: EphemeralKeyPair,
    ga: WirePublicKey,
    server_key: VerifyingKey,
    pub identity: Identity,
}

impl Enclave {
    pub fn new(config: &SessionConfig) -> Self {
        let ephemeral = EphemeralKeyPair::generate();
        let ga = encode_public_key(ephemeral.public_key()).unwrap();
        Self {
            ephemeral,
            ga,
            server_key: config.long_term_key.verifying_key().clone(),
            identity: Identity::default(),
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn ga(&self) -> WirePublicKey {
        self.ga
    }

    pub fn msg1(&self, session_id: u64) -> Msg1 {
        Msg1 {
            session_id,
            group_id: self.identity.group_id,
            ga: self.ga,
        }
    }

    /// Check message 2 the way the SGX SDK does and derive the session keys
    pub fn process_msg2(&self, msg2: &Msg2) -> EnclaveKeys {
        assert_eq!(msg2.kdf_id, KDF_ID);
        assert_eq!(msg2.spid, SPID);

        let signature = decode_signature(&msg2.signature).unwrap();
        self.server_key
            .verify(&key_exchange_transcript(&msg2.gb, &self.ga), &signature)
            .expect("message 2 signature");

        let gb = decode_public_key(&msg2.gb).unwrap();
        let kdk = kdk(self.ephemeral.secret_key(), &gb).unwrap();
        let smk = derive_key(&kdk, KeyLabel::Smk).unwrap();
        assert!(smk.verify(&msg2.payload_bytes(), &msg2.cmac).unwrap(), "message 2 MAC");

        EnclaveKeys {
            gb: msg2.gb,
            smk,
            sk: derive_key(&kdk, KeyLabel::Sk).unwrap(),
            mk: derive_key(&kdk, KeyLabel::Mk).unwrap(),
            vk: derive_key(&kdk, KeyLabel::Vk).unwrap(),
        }
    }

    /// A quote whose report data is bound to this key exchange
    pub fn quote(&self, keys: &EnclaveKeys) -> Vec<u8> {
        let mut report_data = [0u8; 64];
        report_data[..32].copy_from_slice(&key_exchange_binding(&self.ga, &keys.gb, &keys.vk));
        build_unsigned_quote(&QuoteBody {
            group_id: self.identity.group_id,
            attribute_flags: self.identity.attribute_flags,
            mr_enclave: self.identity.mr_enclave,
            mr_signer: self.identity.mr_signer,
            isv_prod_id: self.identity.isv_prod_id,
            isv_svn: self.identity.isv_svn,
            report_data,
        })
    }

    pub fn msg3(&self, session_id: u64, keys: &EnclaveKeys) -> Msg3 {
        self.msg3_with_quote(session_id, keys, self.quote(keys))
    }

    /// Message 3 carrying `quote`, MAC'd under SMK
    pub fn msg3_with_quote(&self, session_id: u64, keys: &EnclaveKeys, quote: Vec<u8>) -> Msg3 {
        let mut msg3 = Msg3 {
            session_id,
            cmac: [0; 16],
            ga: self.ga,
            ps_security_properties: [0; 256],
            quote: Bytes::from(quote),
        };
        msg3.cmac = keys.smk.mac(&msg3.mac_region()).unwrap();
        msg3
    }
}

/// Parse a raw message 2 as an enclave would
pub fn parse_msg2(bytes: &[u8]) -> Msg2 {
    let read_32 = |offset: usize| -> [u8; 32] { bytes[offset..offset + 32].try_into().unwrap() };
    let sig_rl_size = u32::from_le_bytes(
        bytes[MSG2_PAYLOAD_SIZE + 16..MSG2_PAYLOAD_SIZE + 20].try_into().unwrap(),
    ) as usize;
    assert_eq!(bytes.len(), MSG2_PAYLOAD_SIZE + 20 + sig_rl_size);

    Msg2 {
        gb: WirePublicKey { x: read_32(0), y: read_32(32) },
        spid: bytes[64..80].try_into().unwrap(),
        quote_type: QuoteType::from_u16(u16::from_le_bytes([bytes[80], bytes[81]])).unwrap(),
        kdf_id: u16::from_le_bytes([bytes[82], bytes[83]]),
        signature: WireSignature { r: read_32(84), s: read_32(116) },
        cmac: bytes[MSG2_PAYLOAD_SIZE..MSG2_PAYLOAD_SIZE + 16].try_into().unwrap(),
        sig_rl: Bytes::copy_from_slice(&bytes[MSG2_PAYLOAD_SIZE + 20..]),
    }
}

/// An authority that cannot be reached
pub struct UnreachableAuthority;

#[async_trait]
impl AttestationAuthority for UnreachableAuthority {
    async fn verify_quote(&self, _quote: &[u8]) -> Result<QuoteVerdict> {
        Err(Error::Authority("connection refused".into()))
    }

    async fn fetch_revocation_list(&self, _group_id: [u8; 4]) -> Result<Bytes> {
        Err(Error::Authority("connection refused".into()))
    }
}

/// An authority that takes `delay` to answer
pub struct SlowAuthority {
    pub delay: Duration,
}

#[async_trait]
impl AttestationAuthority for SlowAuthority {
    async fn verify_quote(&self, _quote: &[u8]) -> Result<QuoteVerdict> {
        tokio::time::sleep(self.delay).await;
        Ok(QuoteVerdict::trusted())
    }

    async fn fetch_revocation_list(&self, _group_id: [u8; 4]) -> Result<Bytes> {
        tokio::time::sleep(self.delay).await;
        Ok(Bytes::new())
    }
}
