//! Derivation layer: everything the verifier computes from public context
//! alone — epoch/window arithmetic, policy extraction, the per-window salt
//! η, the nullifier `y`, the idempotency key, the grace nullifier, channel
//! binding, and the HTTP-context digest `d`.
//!
//! Every function here is pure and total over well-formed input; the
//! server is the sole authority on these values; nothing here consults the
//! client's own claims about epoch, window, or salt.

use chrono::{DateTime, Timelike, Utc};

use crate::crypto::{h3, hmac_sha256, sha256};

/// Cipher-suite identifier bound into π_C (spec-fixed, not configurable).
pub const SUITE: &str = "P256_SHA256";
/// Protocol version string bound into π_C (spec-fixed, not configurable).
pub const VERSION: &str = "BRASS_v2.0";
/// Fiat-Shamir label shared by both DLEQ proofs.
pub const DLEQ_LABEL: &str = "OPRF_METERING_DLEQ_v1";

const MS_PER_DAY: i64 = 86_400_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// `floor(now_ms / 86_400_000)`.
pub fn epoch_days(now_ms: i64) -> i64 {
    now_ms.div_euclid(MS_PER_DAY)
}

/// Identity function today; kept as a distinct input to η so a future
/// sub-day window policy is a one-function change, not a schema change.
pub fn window_id(epoch_days: i64) -> i64 {
    epoch_days
}

/// Seconds remaining until the current window ends, bounded by 86,400.
pub fn seconds_until_window_end(now_ms: i64) -> u64 {
    let day = epoch_days(now_ms);
    let day_end_ms = (day + 1) * MS_PER_DAY;
    let remaining_ms = (day_end_ms - now_ms).max(0);
    remaining_ms.div_ceil(1000) as u64
}

/// Extract the first `policy=VALUE` token from a `|`-separated `AADr`,
/// defaulting to `"default"` when absent.
pub fn parse_policy_id(aad_r: &str) -> String {
    aad_r
        .split('|')
        .find_map(|part| part.strip_prefix("policy="))
        .unwrap_or("default")
        .to_string()
}

/// `η = H3("BRASS_SALT_v1", issuerPk, originCanonical, epochDays, policyId, windowId)`.
pub fn salt_eta(
    issuer_pk: &[u8],
    origin_canonical: &str,
    epoch_days: i64,
    policy_id: &str,
    window_id: i64,
) -> [u8; 32] {
    h3(&[
        b"BRASS_SALT_v1".as_slice(),
        issuer_pk,
        origin_canonical.as_bytes(),
        epoch_days.to_be_bytes().as_slice(),
        policy_id.as_bytes(),
        window_id.to_be_bytes().as_slice(),
    ])
}

/// `y = H3("BRASS_NULLIFIER_v1", enc(Z'), KID, AADr, η)`.
pub fn nullifier_y(z_prime_enc: &[u8], kid: &str, aad_r: &str, eta: &[u8; 32]) -> [u8; 32] {
    h3(&[
        b"BRASS_NULLIFIER_v1".as_slice(),
        z_prime_enc,
        kid.as_bytes(),
        aad_r.as_bytes(),
        eta.as_slice(),
    ])
}

/// `IK = HMAC-SHA-256(kvSecret, len(y)‖y‖len(c)‖c)`, raw bytes (caller
/// base64url-encodes for storage keys / wire responses).
pub fn idempotency_key(kv_secret: &[u8], y: &[u8; 32], c: &[u8]) -> [u8; 32] {
    hmac_sha256(kv_secret, &[y.as_slice(), c])
}

/// `y_g = H3("BRASS_GRACE_v1", enc(Z'), KID, issuerPk, originCanonical, policyId, suite, version, AADr)`.
///
/// Deliberately omits `windowId`: the same token presented on either side
/// of a midnight boundary must collide here.
#[allow(clippy::too_many_arguments)]
pub fn grace_nullifier(
    z_prime_enc: &[u8],
    kid: &str,
    issuer_pk: &[u8],
    origin_canonical: &str,
    policy_id: &str,
    aad_r: &str,
) -> [u8; 32] {
    h3(&[
        b"BRASS_GRACE_v1".as_slice(),
        z_prime_enc,
        kid.as_bytes(),
        issuer_pk,
        origin_canonical.as_bytes(),
        policy_id.as_bytes(),
        SUITE.as_bytes(),
        VERSION.as_bytes(),
        aad_r.as_bytes(),
    ])
}

/// `tlsBinding = exporter? H3("tls_exporter", exporter) : H3("no_exporter")`.
pub fn tls_binding(exporter: Option<&[u8]>) -> [u8; 32] {
    match exporter {
        Some(bytes) => h3(&[b"tls_exporter".as_slice(), bytes]),
        None => h3(&[b"no_exporter".as_slice()]),
    }
}

/// `d = H3("BRASS:HTTP_CTX_v1:", METHOD_UPPER, path, sha256(body))`.
pub fn http_context_digest(method: &str, path: &str, body: &[u8]) -> [u8; 32] {
    http_context_digest_from_hash(method, path, &sha256(body))
}

/// Same as [`http_context_digest`], but takes an already-computed body hash
/// — used when the client supplies `http_body_hash_b64` as an override
/// instead of the live request body.
pub fn http_context_digest_from_hash(method: &str, path: &str, body_hash: &[u8; 32]) -> [u8; 32] {
    let method_upper = method.to_ascii_uppercase();
    h3(&[
        b"BRASS:HTTP_CTX_v1:".as_slice(),
        method_upper.as_bytes(),
        path.as_bytes(),
        body_hash.as_slice(),
    ])
}

/// The binding string for π_C:
/// `H3("BIND", y, c, d, tlsBinding, windowId, suite, version, policyId, AADr, KID, η)`.
#[allow(clippy::too_many_arguments)]
pub fn bind_pi_c(
    y: &[u8; 32],
    c: &[u8],
    d: &[u8; 32],
    tls_binding: &[u8; 32],
    window_id: i64,
    policy_id: &str,
    aad_r: &str,
    kid: &str,
    eta: &[u8; 32],
) -> [u8; 32] {
    h3(&[
        b"BIND".as_slice(),
        y.as_slice(),
        c,
        d.as_slice(),
        tls_binding.as_slice(),
        window_id.to_be_bytes().as_slice(),
        SUITE.as_bytes(),
        VERSION.as_bytes(),
        policy_id.as_bytes(),
        aad_r.as_bytes(),
        kid.as_bytes(),
        eta.as_slice(),
    ])
}

/// Whether `now` falls inside the grace band around UTC midnight: the
/// half-open intervals `[86400-grace, 86400)` and `[0, grace)` of
/// seconds-since-midnight.
pub fn in_grace_window(now: DateTime<Utc>, grace_seconds: i64) -> bool {
    let tod = now.num_seconds_from_midnight() as i64;
    tod >= SECONDS_PER_DAY - grace_seconds || tod < grace_seconds
}
