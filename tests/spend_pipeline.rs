//! End-to-end integration tests for the six literal scenarios (S1-S6).
//!
//! These exercise the full pipeline through `brass_verifier::spend` against
//! an in-process `AtomicStore`, using a same-process test issuer
//! (`support::issuer`) to construct valid fixture presentations. The issuer
//! itself is out of scope for the production crate; only tests hold `k`.

#[path = "support/issuer.rs"]
mod issuer;

use brass_verifier::apikey::EnvApiKeyStore;
use brass_verifier::config::{Config, StorageBackend};
use brass_verifier::handler::{spend, HttpContext};
use brass_verifier::store::atomic::AtomicStore;
use brass_verifier::telemetry;
use chrono::{TimeZone, Utc};
use issuer::{build_presentation, FixtureSpec, TestIssuer};
use p256::Scalar;

const PROTECTED_BODY: &[u8] = b"protected-resource-body";

fn fixed_issuer() -> TestIssuer {
    TestIssuer::new(Scalar::from(0xA1u64))
}

fn fixed_config(issuer: &TestIssuer, limit: u32) -> Config {
    Config {
        storage_backend: StorageBackend::Atomic,
        boundary_grace_seconds: 60,
        rate_limit: limit,
        issuer_pubkey: issuer.pubkey_bytes().to_vec(),
        secret_key: "test-secret".to_string(),
        kv_secret: vec![0x42u8; 32],
    }
}

fn request_body(presentation: &serde_json::Value) -> HttpContext {
    HttpContext {
        method: "POST".to_string(),
        path: "/verify".to_string(),
        body: serde_json::to_vec(presentation).unwrap(),
    }
}

fn base_spec<'a>(
    origin: &'a str,
    nonce: &'a [u8],
    r_secret: Scalar,
    now: chrono::DateTime<Utc>,
) -> FixtureSpec<'a> {
    FixtureSpec {
        origin,
        aad_r: "policy=comments|window=W",
        kid: "kid-2025-11",
        nonce,
        r_secret,
        now,
        http_method: "POST",
        http_path: "/comments",
        http_body: PROTECTED_BODY,
    }
}

#[tokio::test]
async fn s1_first_spend_succeeds() {
    let issuer = fixed_issuer();
    let config = fixed_config(&issuer, 3);
    let api_keys = EnvApiKeyStore::new(config.secret_key.clone(), config.rate_limit);
    let store = AtomicStore::new();
    let (sink, _rx) = telemetry::channel(16);

    let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
    let nonce = [0x99u8; 16];
    let spec = base_spec("https://example.com", &nonce, Scalar::from(0x2Bu64), now);
    let presentation = build_presentation(&issuer, &spec);
    let http = request_body(&presentation);

    let resp = spend(&config, &api_keys, &store, &sink, "test-secret", &http, now)
        .await
        .unwrap();
    assert!(resp.ok);
    assert_eq!(resp.remaining, 2);
    assert!(!resp.idempotent);
}

#[tokio::test]
async fn s2_idempotent_replay_does_not_recount() {
    let issuer = fixed_issuer();
    let config = fixed_config(&issuer, 3);
    let api_keys = EnvApiKeyStore::new(config.secret_key.clone(), config.rate_limit);
    let store = AtomicStore::new();
    let (sink, _rx) = telemetry::channel(16);

    let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
    let nonce = [0x99u8; 16];
    let spec = base_spec("https://example.com", &nonce, Scalar::from(0x2Bu64), now);
    let presentation = build_presentation(&issuer, &spec);
    let http = request_body(&presentation);

    let first = spend(&config, &api_keys, &store, &sink, "test-secret", &http, now)
        .await
        .unwrap();
    let second = spend(&config, &api_keys, &store, &sink, "test-secret", &http, now)
        .await
        .unwrap();

    assert_eq!(first.remaining, second.remaining);
    assert!(!first.idempotent);
    assert!(second.idempotent);
}

#[tokio::test]
async fn s3_budget_exhausted_after_limit_distinct_nonces() {
    let issuer = fixed_issuer();
    let config = fixed_config(&issuer, 3);
    let api_keys = EnvApiKeyStore::new(config.secret_key.clone(), config.rate_limit);
    let store = AtomicStore::new();
    let (sink, _rx) = telemetry::channel(16);
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();

    for i in 0..3u8 {
        let nonce = [i; 16];
        let spec = base_spec("https://example.com", &nonce, Scalar::from(0x2Bu64), now);
        let presentation = build_presentation(&issuer, &spec);
        let http = request_body(&presentation);
        let resp = spend(&config, &api_keys, &store, &sink, "test-secret", &http, now)
            .await
            .unwrap();
        assert!(resp.ok, "spend {i} should succeed");
    }

    let nonce = [0xFFu8; 16];
    let spec = base_spec("https://example.com", &nonce, Scalar::from(0x2Bu64), now);
    let presentation = build_presentation(&issuer, &spec);
    let http = request_body(&presentation);
    let denied = spend(&config, &api_keys, &store, &sink, "test-secret", &http, now)
        .await
        .unwrap();
    assert!(!denied.ok);
    assert_eq!(denied.error.as_deref(), Some("limit_exceeded"));
}

#[tokio::test]
async fn s4_cross_origin_isolation() {
    let issuer = fixed_issuer();
    let config = fixed_config(&issuer, 3);
    let api_keys = EnvApiKeyStore::new(config.secret_key.clone(), config.rate_limit);
    let store = AtomicStore::new();
    let (sink, _rx) = telemetry::channel(16);
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();

    let nonce_a = [0x01u8; 16];
    let spec_a = base_spec("https://example.com", &nonce_a, Scalar::from(0x2Bu64), now);
    let presentation_a = build_presentation(&issuer, &spec_a);
    let http_a = request_body(&presentation_a);
    let resp_a = spend(&config, &api_keys, &store, &sink, "test-secret", &http_a, now)
        .await
        .unwrap();
    assert!(resp_a.ok);
    assert_eq!(resp_a.remaining, 2);

    let nonce_b = [0x02u8; 16];
    let spec_b = base_spec("https://attacker.com", &nonce_b, Scalar::from(0x2Bu64), now);
    let presentation_b = build_presentation(&issuer, &spec_b);
    let http_b = request_body(&presentation_b);
    let resp_b = spend(&config, &api_keys, &store, &sink, "test-secret", &http_b, now)
        .await
        .unwrap();
    assert!(resp_b.ok);
    assert_eq!(resp_b.remaining, 2, "different origin must get its own counter");

    // the original origin's counter is unaffected: replaying it is still idempotent
    let replay = spend(&config, &api_keys, &store, &sink, "test-secret", &http_a, now)
        .await
        .unwrap();
    assert!(replay.idempotent);
    assert_eq!(replay.remaining, 2);
}

#[tokio::test]
async fn s5_grace_period_double_spend_blocked() {
    let issuer = fixed_issuer();
    let config = fixed_config(&issuer, 3);
    let api_keys = EnvApiKeyStore::new(config.secret_key.clone(), config.rate_limit);
    let store = AtomicStore::new();
    let (sink, _rx) = telemetry::channel(16);

    let t1 = Utc.with_ymd_and_hms(2026, 6, 1, 23, 59, 50).unwrap();
    let nonce = [0x77u8; 16];
    let spec = base_spec("https://example.com", &nonce, Scalar::from(0x2Bu64), t1);
    let presentation = build_presentation(&issuer, &spec);
    let http = request_body(&presentation);

    let first = spend(&config, &api_keys, &store, &sink, "test-secret", &http, t1)
        .await
        .unwrap();
    assert!(first.ok);
    assert_eq!(first.remaining, 2);

    let t2 = Utc.with_ymd_and_hms(2026, 6, 2, 0, 0, 10).unwrap();
    let second = spend(&config, &api_keys, &store, &sink, "test-secret", &http, t2)
        .await
        .unwrap();
    assert!(second.ok);
    assert_eq!(second.window_used, "grace_cached");
    assert_eq!(second.remaining, first.remaining);
}

#[tokio::test]
async fn s6_tampered_body_invalidates_pi_c() {
    let issuer = fixed_issuer();
    let config = fixed_config(&issuer, 3);
    let api_keys = EnvApiKeyStore::new(config.secret_key.clone(), config.rate_limit);
    let store = AtomicStore::new();
    let (sink, _rx) = telemetry::channel(16);
    let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();

    let nonce = [0x55u8; 16];
    let spec = base_spec("https://example.com", &nonce, Scalar::from(0x2Bu64), now);
    let mut presentation = build_presentation(&issuer, &spec);

    // Flip the override body-hash field: simulates the protected request's
    // body changing by one byte after the presentation was constructed.
    presentation["http_body_hash_b64"] = serde_json::Value::String(
        brass_verifier::crypto::b64url_encode(&[0xEEu8; 32]),
    );
    let http = request_body(&presentation);

    let err = spend(&config, &api_keys, &store, &sink, "test-secret", &http, now)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_piC");
}
