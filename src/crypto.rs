//! Crypto primitives: hashing, point codec, constant-time comparison.
//!
//! Everything the rest of the crate needs from the curve and the hash
//! function lives here so that call sites never reach for `sha2` or `p256`
//! directly — this is the one place domain separation and point validity
//! are enforced.
//!
//! `H3` is deliberately SHA-256 (not BLAKE3): it absorbs a fixed number of
//! length-prefixed parts and nothing else, which is all the protocol needs
//! and keeps the construction auditable against the one-paragraph
//! definition in the design doc.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use p256::elliptic_curve::group::{Curve, Group, GroupEncoding};
use p256::elliptic_curve::ops::Reduce;
use p256::elliptic_curve::sec1::FromEncodedPoint;
use p256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar, U256};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::BrassError;

type HmacSha256 = Hmac<Sha256>;

/// Compressed SEC1 encoding length for a P-256 point (`0x02`/`0x03` prefix + 32-byte x).
pub const POINT_LEN: usize = 33;

/// Domain-separated hash over a sequence of byte-string parts.
///
/// `H3(p_1, p_2, …) = SHA256(len(p_1) ‖ p_1 ‖ len(p_2) ‖ p_2 ‖ …)`, where each
/// `len` is a 4-byte big-endian length prefix. Two calls with a different
/// number of parts, or parts that only differ in where a boundary falls,
/// never collide: the length prefix makes the part boundaries unambiguous.
pub fn h3<P: AsRef<[u8]>>(parts: &[P]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        let bytes = part.as_ref();
        hasher.update((bytes.len() as u32).to_be_bytes());
        hasher.update(bytes);
    }
    hasher.finalize().into()
}

/// HMAC-SHA-256 over a sequence of length-prefixed parts, keyed by `key`.
///
/// Used only for the idempotency key derivation, which the spec pins to a
/// `len(y)‖y‖len(c)‖c` schedule (4-byte big-endian lengths, same convention
/// as [`h3`]).
pub fn hmac_sha256<P: AsRef<[u8]>>(key: &[u8], parts: &[P]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts a key of any length");
    for part in parts {
        let bytes = part.as_ref();
        mac.update(&(bytes.len() as u32).to_be_bytes());
        mac.update(bytes);
    }
    mac.finalize().into_bytes().into()
}

/// Plain SHA-256, used for the HTTP body hash bound into the context digest.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Constant-time equality over two equal-length byte slices.
///
/// Returns `false` (not a timing-safe "not equal", just `false`) if the
/// lengths differ — a length mismatch is not secret in this protocol, every
/// digest it is used on has a fixed length.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Decode a 33-byte compressed SEC1 point, rejecting the identity and any
/// non-canonical or off-curve encoding.
///
/// This is the single gate every curve point on the wire passes through
/// before it is used in a proof; nothing downstream re-checks validity.
pub fn decode_point(bytes: &[u8]) -> Result<ProjectivePoint, BrassError> {
    if bytes.len() != POINT_LEN || (bytes[0] != 0x02 && bytes[0] != 0x03) {
        return Err(BrassError::InvalidPointEncoding);
    }
    let encoded = EncodedPoint::from_bytes(bytes).map_err(|_| BrassError::InvalidPointEncoding)?;
    let affine_opt = AffinePoint::from_encoded_point(&encoded);
    let affine: AffinePoint = Option::from(affine_opt).ok_or(BrassError::InvalidPointEncoding)?;
    // Re-encode and compare: rejects any encoding that round-trips to a
    // different canonical byte string (e.g. a non-reduced x-coordinate).
    if affine.to_bytes().as_slice() != bytes {
        return Err(BrassError::InvalidPointEncoding);
    }
    let point = ProjectivePoint::from(affine);
    if bool::from(point.is_identity()) {
        return Err(BrassError::InvalidPointInfinity);
    }
    Ok(point)
}

/// Encode a point back to its 33-byte compressed SEC1 form.
pub fn encode_point(point: &ProjectivePoint) -> [u8; POINT_LEN] {
    let mut out = [0u8; POINT_LEN];
    out.copy_from_slice(point.to_affine().to_bytes().as_slice());
    out
}

/// Reduce an arbitrary-length hash digest to a scalar mod the P-256 group
/// order, the way a Fiat-Shamir challenge is turned into a scalar.
///
/// A 32-byte digest is not uniformly distributed mod *n* after reduction,
/// but the bias is the same one every ECDSA/Schnorr implementation over
/// P-256 accepts for digest-to-scalar conversion; it is not a distinguishing
/// weakness here either.
pub fn scalar_from_digest(digest: &[u8; 32]) -> Scalar {
    let as_uint = U256::from_be_slice(digest);
    Scalar::reduce(as_uint)
}

/// Decode exactly 32 bytes as a scalar, reducing mod the group order.
///
/// Wire scalars (DLEQ challenge/response integers) are not required to be
/// the canonical least residue; reducing mod *n* mirrors how the challenge
/// itself is produced and never fails on a well-formed 32-byte input.
pub fn decode_scalar(bytes: &[u8]) -> Result<Scalar, BrassError> {
    if bytes.len() != 32 {
        return Err(BrassError::server_error("scalar must be exactly 32 bytes"));
    }
    let as_uint = U256::from_be_slice(bytes);
    Ok(Scalar::reduce(as_uint))
}

/// Encode a scalar as 32 big-endian bytes.
pub fn encode_scalar(scalar: &Scalar) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&scalar.to_bytes());
    out
}

/// Decode unpadded base64url, the wire encoding for every byte-string field.
pub fn b64url_decode(s: &str) -> Result<Vec<u8>, BrassError> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| BrassError::server_error("invalid base64url"))
}

/// Encode bytes as unpadded base64url.
pub fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}
