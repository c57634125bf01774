/*!
AES-128-GCM encryption of the secret delivered in message 4.
*/

use aes_gcm::{
    Aes128Gcm, KeyInit, Nonce, Tag,
    aead::AeadInPlace,
};
use rand::{RngCore, rngs::OsRng};

use crate::core::{
    constants::sizes::{GCM_IV_SIZE, GCM_TAG_SIZE},
    crypto::kdf::DerivedKey,
    error::{CryptoError, Error, Result},
    message::EncryptedSecret,
};

/// Encrypt `plaintext` under the session key with a fresh random IV.
pub fn encrypt_secret(sk: &DerivedKey, plaintext: &[u8]) -> Result<EncryptedSecret> {
    let mut iv = [0u8; GCM_IV_SIZE];
    OsRng.try_fill_bytes(&mut iv).map_err(|_| Error::Randomness)?;
    encrypt_secret_with_iv(sk, iv, plaintext)
}

pub(crate) fn encrypt_secret_with_iv(
    sk: &DerivedKey,
    iv: [u8; GCM_IV_SIZE],
    plaintext: &[u8],
) -> Result<EncryptedSecret> {
    let cipher = Aes128Gcm::new_from_slice(sk.as_bytes())
        .map_err(|_| Error::Crypto(CryptoError::EncryptionFailed))?;

    let mut ciphertext = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut ciphertext)
        .map_err(|_| Error::Crypto(CryptoError::EncryptionFailed))?;

    let mut mac = [0u8; GCM_TAG_SIZE];
    mac.copy_from_slice(&tag);
    Ok(EncryptedSecret { iv, ciphertext, tag: mac })
}

/// Decrypt a secret produced by [`encrypt_secret`]. Used by enclave-side
/// tooling and tests; the server never decrypts.
pub fn decrypt_secret(sk: &DerivedKey, secret: &EncryptedSecret) -> Result<Vec<u8>> {
    let cipher = Aes128Gcm::new_from_slice(sk.as_bytes())
        .map_err(|_| Error::Crypto(CryptoError::EncryptionFailed))?;

    let mut plaintext = secret.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&secret.iv),
            b"",
            &mut plaintext,
            Tag::from_slice(&secret.tag),
        )
        .map_err(|_| Error::Crypto(CryptoError::EncryptionFailed))?;
    Ok(plaintext)
}
