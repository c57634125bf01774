/*!
Conversion between natural (big-endian) curve coordinates and the fixed-width
little-endian form used on the wire.

Every coordinate is left-padded to 32 bytes *before* it is reversed. Padding
after reversal produces a different value for coordinates with leading zero
bytes and silently corrupts every key derived from them.
*/

use num_bigint::BigUint;
use p256::PublicKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;

use crate::core::{
    constants::sizes::COORDINATE_SIZE,
    error::{CryptoError, Error, KeyExchangeError, Result},
    message::WirePublicKey,
};

/// Encode a big-endian coordinate of at most 32 bytes into its
/// little-endian wire form.
pub fn encode_coordinate(big_endian: &[u8]) -> Result<[u8; COORDINATE_SIZE]> {
    // strip leading zeros so oversized-but-small values are still accepted
    let start = big_endian
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(big_endian.len());
    let minimal = &big_endian[start..];
    if minimal.len() > COORDINATE_SIZE {
        return Err(Error::Crypto(CryptoError::CoordinateTooLarge));
    }

    let mut out = [0u8; COORDINATE_SIZE];
    out[COORDINATE_SIZE - minimal.len()..].copy_from_slice(minimal);
    out.reverse();
    Ok(out)
}

/// Decode a little-endian wire coordinate into its 32-byte big-endian form.
pub fn decode_coordinate(little_endian: &[u8; COORDINATE_SIZE]) -> [u8; COORDINATE_SIZE] {
    let mut out = *little_endian;
    out.reverse();
    out
}

/// Encode the affine coordinates of a point into wire form.
pub fn encode_point(
    x: &BigUint,
    y: &BigUint,
) -> Result<([u8; COORDINATE_SIZE], [u8; COORDINATE_SIZE])> {
    Ok((
        encode_coordinate(&x.to_bytes_be())?,
        encode_coordinate(&y.to_bytes_be())?,
    ))
}

/// Decode wire-form coordinates back into integers.
pub fn decode_point(
    x: &[u8; COORDINATE_SIZE],
    y: &[u8; COORDINATE_SIZE],
) -> (BigUint, BigUint) {
    (
        BigUint::from_bytes_be(&decode_coordinate(x)),
        BigUint::from_bytes_be(&decode_coordinate(y)),
    )
}

/// Encode a P-256 public key for the wire.
pub fn encode_public_key(key: &PublicKey) -> Result<WirePublicKey> {
    let point = key.to_encoded_point(false);
    let (Some(x), Some(y)) = (point.x(), point.y()) else {
        // only the identity has no coordinates, and PublicKey excludes it
        return Err(Error::KeyExchange(KeyExchangeError::InvalidPublicKey));
    };
    Ok(WirePublicKey {
        x: encode_coordinate(x)?,
        y: encode_coordinate(y)?,
    })
}

/// Decode a wire public key, rejecting anything that is not a point on P-256.
pub fn decode_public_key(wire: &WirePublicKey) -> Result<PublicKey> {
    let mut sec1 = [0u8; 1 + 2 * COORDINATE_SIZE];
    sec1[0] = 0x04;
    sec1[1..1 + COORDINATE_SIZE].copy_from_slice(&decode_coordinate(&wire.x));
    sec1[1 + COORDINATE_SIZE..].copy_from_slice(&decode_coordinate(&wire.y));
    PublicKey::from_sec1_bytes(&sec1)
        .map_err(|_| Error::KeyExchange(KeyExchangeError::InvalidPublicKey))
}
