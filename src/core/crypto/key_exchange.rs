/*!
Elliptic-curve Diffie-Hellman on P-256 and the KDK derived from it.
*/

use p256::{PublicKey, SecretKey, ecdh};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::core::{
    constants::sizes::COORDINATE_SIZE,
    crypto::{codec, kdf::{self, DerivedKey}},
    error::Result,
};

/// A freshly generated per-session key pair
pub struct EphemeralKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new key pair from the OS random number generator
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// The public half
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The private half
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

/// Compute the ECDH shared secret: the x-coordinate of `mine * peer`,
/// in little-endian wire form.
pub fn exchange(mine: &SecretKey, peer: &PublicKey) -> Result<Zeroizing<[u8; COORDINATE_SIZE]>> {
    let shared = ecdh::diffie_hellman(mine.to_nonzero_scalar(), peer.as_affine());
    Ok(Zeroizing::new(codec::encode_coordinate(shared.raw_secret_bytes())?))
}

/// Derive the key derivation key from our private key and the peer's public key.
pub fn kdk(mine: &SecretKey, peer: &PublicKey) -> Result<DerivedKey> {
    let shared = exchange(mine, peer)?;
    kdf::kdk_from_shared(&shared)
}
