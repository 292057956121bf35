//! Generic DLEQ verification, shared by the issuer proof π_I and the client
//! proof π_C.
//!
//! Both proofs use the same Fiat-Shamir scheme and the same Schnorr-style
//! verifier equation over a pair of group relations `(g1,h1)` and `(g2,h2)`;
//! only the points plugged in, the binding string, and the label differ.
//! Keeping that logic in one place means a bug in the verifier equation
//! can't silently diverge between the two call sites.

use p256::{ProjectivePoint, Scalar};
use subtle::ConstantTimeEq;

use crate::crypto::{encode_point, h3, scalar_from_digest};

/// A DLEQ challenge/response pair, `(c, r)`, both scalars mod the curve order.
#[derive(Debug, Clone, Copy)]
pub struct DleqProof {
    /// Fiat-Shamir challenge.
    pub c: Scalar,
    /// Schnorr response.
    pub r: Scalar,
}

/// Verify a DLEQ proof that `log_{g1}(h1) = log_{g2}(h2)`.
///
/// Reconstructs `A1' = r·g1 + c·h1` and `A2' = r·g2 + c·h2` (additive
/// notation for the multiplicative `g^r·h^c` in the design doc), recomputes
/// the Fiat-Shamir challenge over the full statement plus `bind`, and
/// accepts iff the recomputed challenge equals the proof's `c`.
pub fn verify(
    label: &str,
    g1: &ProjectivePoint,
    h1: &ProjectivePoint,
    g2: &ProjectivePoint,
    h2: &ProjectivePoint,
    bind: &[u8],
    proof: &DleqProof,
) -> bool {
    let a1 = *g1 * proof.r + *h1 * proof.c;
    let a2 = *g2 * proof.r + *h2 * proof.c;

    let preamble = format!("BRASS:{label}:");
    let (enc_g1, enc_h1, enc_g2, enc_h2) = (
        encode_point(g1),
        encode_point(h1),
        encode_point(g2),
        encode_point(h2),
    );
    let (enc_a1, enc_a2) = (encode_point(&a1), encode_point(&a2));
    let digest = h3(&[
        preamble.as_bytes(),
        enc_g1.as_slice(),
        enc_h1.as_slice(),
        enc_g2.as_slice(),
        enc_h2.as_slice(),
        enc_a1.as_slice(),
        enc_a2.as_slice(),
        bind,
    ]);
    let expected = scalar_from_digest(&digest);

    bool::from(expected.ct_eq(&proof.c))
}

/// Verify a single-relation Schnorr proof of knowledge of `x` such that
/// `target = x·base`.
///
/// This is the one-relation analogue of [`verify`]: reconstructs
/// `A' = r·base + c·target`, recomputes the Fiat-Shamir challenge over
/// `(base, target, A', bind)`, and accepts iff it equals the proof's `c`.
/// Used for π_C, which proves knowledge of the client's blinding scalar
/// `r` (base `P`, target `M`) rather than an equality between two
/// independent relations — a 2-relation DLEQ with `(P,M,G,G)` only holds
/// when `r = 1`, so π_C needs this weaker, satisfiable statement instead.
pub fn verify_pok(
    label: &str,
    base: &ProjectivePoint,
    target: &ProjectivePoint,
    bind: &[u8],
    proof: &DleqProof,
) -> bool {
    let a = *base * proof.r + *target * proof.c;

    let preamble = format!("BRASS:{label}:");
    let (enc_base, enc_target) = (encode_point(base), encode_point(target));
    let enc_a = encode_point(&a);
    let digest = h3(&[
        preamble.as_bytes(),
        enc_base.as_slice(),
        enc_target.as_slice(),
        enc_a.as_slice(),
        bind,
    ]);
    let expected = scalar_from_digest(&digest);

    bool::from(expected.ct_eq(&proof.c))
}
