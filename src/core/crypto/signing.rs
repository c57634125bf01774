/*!
Long-term ECDSA P-256 signing key of the service provider.

The enclave has the matching public key built in and uses it to check that
message 2 came from us. Signatures travel as `r || s`, each coordinate in
little-endian wire form.
*/

use p256::{
    PublicKey, SecretKey,
    ecdsa::{Signature, SigningKey, VerifyingKey, signature::Signer},
};

use crate::core::{
    constants::sizes::PUBLIC_KEY_SIZE,
    crypto::codec,
    error::{CryptoError, Error, Result},
    message::{WirePublicKey, WireSignature},
};

/// The service provider's long-term identity key
#[derive(Clone)]
pub struct LongTermKey {
    signing: SigningKey,
}

impl LongTermKey {
    /// Wrap an existing P-256 secret key
    pub fn new(secret: &SecretKey) -> Self {
        Self {
            signing: SigningKey::from(secret),
        }
    }

    /// The public key an enclave must be provisioned with
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(self.signing.verifying_key())
    }

    /// The verifying half
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing.verifying_key()
    }

    /// Sign `gb || ga` with SHA-256/ECDSA
    pub fn sign_key_exchange(&self, gb: &WirePublicKey, ga: &WirePublicKey) -> Result<WireSignature> {
        let signature: Signature = self
            .signing
            .try_sign(&key_exchange_transcript(gb, ga))
            .map_err(|_| Error::Crypto(CryptoError::SigningFailed))?;
        encode_signature(&signature)
    }
}

impl std::fmt::Debug for LongTermKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongTermKey")
            .field("public", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// The signed message: the server key followed by the client key, both in
/// wire form.
pub fn key_exchange_transcript(gb: &WirePublicKey, ga: &WirePublicKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 * PUBLIC_KEY_SIZE);
    out.extend_from_slice(&gb.to_bytes());
    out.extend_from_slice(&ga.to_bytes());
    out
}

/// Encode an ECDSA signature for the wire.
pub fn encode_signature(signature: &Signature) -> Result<WireSignature> {
    let (r, s) = signature.split_bytes();
    Ok(WireSignature {
        r: codec::encode_coordinate(&r)?,
        s: codec::encode_coordinate(&s)?,
    })
}

/// Decode a wire signature back into an ECDSA signature.
pub fn decode_signature(wire: &WireSignature) -> Result<Signature> {
    let r = codec::decode_coordinate(&wire.r);
    let s = codec::decode_coordinate(&wire.s);
    Signature::from_scalars(r, s).map_err(|_| Error::InvalidFormat("Invalid signature".into()))
}
