//! A same-process "test issuer": knows the private scalar `k` purely to
//! construct fixture presentations for the integration tests below. The
//! production crate never holds an issuer secret — this fixture plays the
//! role of the out-of-scope issuer service so the full verifier pipeline
//! can be exercised end-to-end.

use brass_verifier::crypto::{b64url_encode, encode_point, encode_scalar, sha256};
use brass_verifier::derive::{
    bind_pi_c, epoch_days, http_context_digest, nullifier_y, parse_policy_id, salt_eta,
    tls_binding, window_id, DLEQ_LABEL,
};
use brass_verifier::origin::canonicalize;
use chrono::{DateTime, Utc};
use p256::elliptic_curve::hash2curve::{ExpandMsgXmd, GroupDigest};
use p256::elliptic_curve::Field;
use p256::{NistP256, ProjectivePoint, Scalar};
use rand::rngs::OsRng;
use sha2::Sha256;
use serde_json::{json, Value};

const H2C_DST: &[u8] = b"BRASS-H2C-P256-v1";

/// An issuer holding secret scalar `k` and its public point `Y = k·G`.
pub struct TestIssuer {
    pub k: Scalar,
    pub y: ProjectivePoint,
}

impl TestIssuer {
    pub fn new(k: Scalar) -> Self {
        let y = ProjectivePoint::GENERATOR * k;
        TestIssuer { k, y }
    }

    pub fn pubkey_bytes(&self) -> [u8; 33] {
        encode_point(&self.y)
    }
}

fn hash_to_curve(origin: &str, epoch: i64, policy: &str) -> ProjectivePoint {
    let msg = format!("{origin}|{epoch}|{policy}");
    NistP256::hash_from_bytes::<ExpandMsgXmd<Sha256>>(&[msg.as_bytes()], &[H2C_DST])
        .expect("hash-to-curve should not fail")
}

/// Prove `log_{g1}(h1) = log_{g2}(h2) = secret`, bound by `bind`.
fn prove(
    label: &str,
    g1: &ProjectivePoint,
    h1: &ProjectivePoint,
    g2: &ProjectivePoint,
    h2: &ProjectivePoint,
    bind: &[u8],
    secret: Scalar,
) -> (Scalar, Scalar) {
    use brass_verifier::crypto::h3;
    use brass_verifier::crypto::scalar_from_digest;

    let nonce = Scalar::random(&mut OsRng);
    let a1 = *g1 * nonce;
    let a2 = *g2 * nonce;
    let preamble = format!("BRASS:{label}:");
    let (eg1, eh1, eg2, eh2) = (
        encode_point(g1),
        encode_point(h1),
        encode_point(g2),
        encode_point(h2),
    );
    let (ea1, ea2) = (encode_point(&a1), encode_point(&a2));
    let digest = h3(&[
        preamble.as_bytes(),
        eg1.as_slice(),
        eh1.as_slice(),
        eg2.as_slice(),
        eh2.as_slice(),
        ea1.as_slice(),
        ea2.as_slice(),
        bind,
    ]);
    let c = scalar_from_digest(&digest);
    let r = nonce - c * secret;
    (c, r)
}

/// Prove knowledge of `secret` such that `target = secret·base`, bound by
/// `bind` — the single-relation Schnorr proof of knowledge backing π_C
/// (mirrors [`brass_verifier::proof::verify_pok`]).
fn prove_pok(label: &str, base: &ProjectivePoint, target: &ProjectivePoint, bind: &[u8], secret: Scalar) -> (Scalar, Scalar) {
    use brass_verifier::crypto::h3;
    use brass_verifier::crypto::scalar_from_digest;

    let nonce = Scalar::random(&mut OsRng);
    let a = *base * nonce;
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
    let c = scalar_from_digest(&digest);
    let r = nonce - c * secret;
    (c, r)
}

/// Inputs describing one fixture presentation; mirrors the literal S1–S6
/// scenario parameters.
pub struct FixtureSpec<'a> {
    pub origin: &'a str,
    pub aad_r: &'a str,
    pub kid: &'a str,
    pub nonce: &'a [u8],
    pub r_secret: Scalar,
    pub now: DateTime<Utc>,
    pub http_method: &'a str,
    pub http_path: &'a str,
    pub http_body: &'a [u8],
}

/// Build a complete, valid presentation JSON body for the given spec.
pub fn build_presentation(issuer: &TestIssuer, spec: &FixtureSpec) -> Value {
    let origin_canonical = canonicalize(spec.origin).expect("fixture origin must canonicalize");
    let epoch = epoch_days(spec.now.timestamp_millis());
    let window = window_id(epoch);
    let policy_id = parse_policy_id(spec.aad_r);

    let p = hash_to_curve(&origin_canonical, epoch, &policy_id);
    let m = p * spec.r_secret;
    let z = m * issuer.k;
    let z_prime = p * issuer.k;
    let z_prime_enc = encode_point(&z_prime);

    let eta = salt_eta(
        &issuer.pubkey_bytes(),
        &origin_canonical,
        epoch,
        &policy_id,
        window,
    );
    let y = nullifier_y(&z_prime_enc, spec.kid, spec.aad_r, &eta);
    let d = http_context_digest(spec.http_method, spec.http_path, spec.http_body);
    let tls = tls_binding(None);
    let bind_c = bind_pi_c(
        &y, spec.nonce, &d, &tls, window, &policy_id, spec.aad_r, spec.kid, &eta,
    );

    let g = ProjectivePoint::GENERATOR;
    let (c_i, r_i) = prove(DLEQ_LABEL, &g, &issuer.y, &m, &z, b"", issuer.k);
    // pi_C proves knowledge of r_secret with base P, target M (log_P(M) = r_secret),
    // not a (P,M,G,G) DLEQ — that statement only holds for r_secret = 1.
    let (c_c, r_c) = prove_pok(DLEQ_LABEL, &p, &m, &bind_c, spec.r_secret);

    json!({
        "KID": spec.kid,
        "AADr": spec.aad_r,
        "origin": spec.origin,
        "epoch": epoch,
        "P": b64url_encode(&encode_point(&p)),
        "M": b64url_encode(&encode_point(&m)),
        "Z": b64url_encode(&encode_point(&z)),
        "Zprime": b64url_encode(&z_prime_enc),
        "c": b64url_encode(spec.nonce),
        "piI": {
            "c": b64url_encode(&encode_scalar(&c_i)),
            "r": b64url_encode(&encode_scalar(&r_i)),
        },
        "piC": {
            "c": b64url_encode(&encode_scalar(&c_c)),
            "r": b64url_encode(&encode_scalar(&r_c)),
        },
        "http_method": spec.http_method,
        "http_path": spec.http_path,
        "http_body_hash_b64": b64url_encode(&sha256(spec.http_body)),
    })
}
