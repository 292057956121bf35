//! The spend handler: the state machine S0–S7 from the design doc, wiring
//! authentication, presentation decoding, both DLEQ proofs, the derivation
//! layer, grace handling, and the counter store into one request-scoped
//! pipeline. Transport-agnostic: the caller supplies the raw HTTP method,
//! path, and body bytes; nothing here reaches into a framework request type
//! directly.

#![allow(missing_docs)]

use std::time::Instant as StdInstant;

use chrono::{DateTime, Utc};
use p256::ProjectivePoint;

use crate::apikey::ApiKeyStore;
use crate::config::Config;
use crate::crypto::{b64url_encode, ct_eq, decode_point};
use crate::derive::{
    self, bind_pi_c, epoch_days, grace_nullifier, http_context_digest_from_hash, idempotency_key,
    nullifier_y, parse_policy_id, salt_eta, seconds_until_window_end, tls_binding, window_id,
    DLEQ_LABEL,
};
use crate::error::BrassError;
use crate::presentation::Presentation;
use crate::proof;
use crate::store::{CounterStore, GraceOutcome, GraceRequest, SpendKey, SpendRequest};
use crate::telemetry::{SpendEvent, TelemetrySink};

/// The raw HTTP context the transport layer hands in — never a framework
/// request type, per the library/transport split.
#[derive(Debug, Clone)]
pub struct HttpContext {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

/// The outcome of a spend request, independent of transport. The façade
/// maps `ok` / `error` onto an HTTP status (200 / 429 / 401).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendResponse {
    pub ok: bool,
    pub remaining: u32,
    pub idempotent: bool,
    pub window_used: String,
    pub error: Option<String>,
}

/// Run the full spend pipeline for one request.
///
/// `api_key` is the bearer token from the `Authorization` header (already
/// stripped of the `Bearer ` prefix by the transport layer). `now` is
/// injected rather than read from the clock so tests can pin exact grace
/// boundaries.
pub async fn spend(
    config: &Config,
    api_keys: &dyn ApiKeyStore,
    store: &dyn CounterStore,
    telemetry: &TelemetrySink,
    api_key: &str,
    http: &HttpContext,
    now: DateTime<Utc>,
) -> Result<SpendResponse, BrassError> {
    let started = StdInstant::now();
    let result = spend_inner(config, api_keys, store, api_key, http, now).await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok((resp, in_grace)) => telemetry.emit(SpendEvent {
            result: if resp.ok { "ok" } else { "denied" },
            response_time_ms: elapsed_ms,
            in_grace_period: *in_grace,
            grace_protected: Some(resp.window_used == "grace_cached"),
            idempotent: Some(resp.idempotent),
            remaining: Some(resp.remaining),
        }),
        Err(err) => telemetry.emit(SpendEvent {
            result: err.kind(),
            response_time_ms: elapsed_ms,
            in_grace_period: false,
            grace_protected: None,
            idempotent: None,
            remaining: None,
        }),
    }

    result.map(|(resp, _in_grace)| resp)
}

/// Runs the pipeline and additionally returns whether `now` fell inside the
/// grace window, independent of whether a grace-cache hit actually occurred
/// — `spend` needs this for telemetry (spec.md §4.5 `{inGracePeriod}`).
async fn spend_inner(
    config: &Config,
    api_keys: &dyn ApiKeyStore,
    store: &dyn CounterStore,
    api_key: &str,
    http: &HttpContext,
    now: DateTime<Utc>,
) -> Result<(SpendResponse, bool), BrassError> {
    // S0: authenticate.
    let tenant = api_keys.lookup(api_key).await?;

    // S1: parse & decode.
    let presentation: Presentation = serde_json::from_slice(&http.body)
        .map_err(|_| BrassError::server_error("malformed presentation JSON"))?;
    let decoded = presentation.decode()?;

    let issuer_y = decode_point(&config.issuer_pubkey)
        .map_err(|_| BrassError::server_error("configured issuer pubkey is invalid"))?;

    // S2: verify π_I over (G, Y, M, Z), empty binding.
    let g = ProjectivePoint::GENERATOR;
    let pi_i_ok = proof::verify(
        DLEQ_LABEL,
        &g,
        &issuer_y,
        &decoded.m,
        &decoded.z,
        b"",
        &decoded.pi_i,
    );
    if !pi_i_ok {
        return Err(BrassError::InvalidPiI);
    }

    // S3: compute d from overrides or the live request; cross-check d_client.
    let method = decoded.http_method.as_deref().unwrap_or(&http.method);
    let path = decoded.http_path.as_deref().unwrap_or(&http.path);
    let body_hash = match &decoded.http_body_hash {
        Some(bytes) if bytes.len() == 32 => {
            let mut out = [0u8; 32];
            out.copy_from_slice(bytes);
            out
        }
        Some(_) => return Err(BrassError::server_error("http_body_hash_b64 must be 32 bytes")),
        None => crate::crypto::sha256(&http.body),
    };
    let d = http_context_digest_from_hash(method, path, &body_hash);
    if let Some(d_client) = decoded.d_client {
        if !ct_eq(&d, &d_client) {
            return Err(BrassError::DMismatch);
        }
    }

    // S4: canonicalize origin, compute epoch/window/policy/eta/y.
    let origin_canonical = crate::origin::canonicalize(&decoded.origin)?;
    let now_ms = now.timestamp_millis();
    let epoch = epoch_days(now_ms);
    let window = window_id(epoch);
    let policy_id = parse_policy_id(&decoded.aad_r);
    let eta = salt_eta(
        &config.issuer_pubkey,
        &origin_canonical,
        epoch,
        &policy_id,
        window,
    );
    let y = nullifier_y(&decoded.z_prime_enc, &decoded.kid, &decoded.aad_r, &eta);

    // S5: build bindC, verify π_C as a proof of knowledge of the blinding
    // scalar r with base P and target M (log_P(M) = r), bound to bindC. A
    // 2-relation DLEQ over (P,M,G,G) with one shared response only proves
    // log_P(M) = log_G(G) = 1, which real blinded tokens (r != 1) can never
    // satisfy; the single-relation statement is what's actually checkable.
    let tls_binding_digest = tls_binding(decoded.tls_exporter.as_deref());
    let bind_c = bind_pi_c(
        &y,
        &decoded.c,
        &d,
        &tls_binding_digest,
        window,
        &policy_id,
        &decoded.aad_r,
        &decoded.kid,
        &eta,
    );
    let pi_c_ok = proof::verify_pok(DLEQ_LABEL, &decoded.p, &decoded.m, &bind_c, &decoded.pi_c);
    if !pi_c_ok {
        return Err(BrassError::InvalidPiC);
    }

    // S6: derive IK, pick grace flag, optionally consult the grace cache.
    let ik = idempotency_key(&config.kv_secret, &y, &decoded.c);
    let ik_b64 = b64url_encode(&ik);
    let y_b64 = b64url_encode(&y);
    let issuer_pk_b64 = b64url_encode(&config.issuer_pubkey);

    let ttl_seconds = seconds_until_window_end(now_ms);
    let spend_key = SpendKey {
        project_id: tenant.project_id.clone(),
        issuer_pk: issuer_pk_b64.clone(),
        origin: origin_canonical.clone(),
        epoch,
        policy_id: policy_id.clone(),
        window_id: window,
        y: y_b64,
    };

    let in_grace = derive::in_grace_window(now, config.boundary_grace_seconds);
    let mut grace_hit_ok = false;

    if in_grace {
        let y_g = grace_nullifier(
            &decoded.z_prime_enc,
            &decoded.kid,
            &config.issuer_pubkey,
            &origin_canonical,
            &policy_id,
            &decoded.aad_r,
        );
        let grace_key = b64url_encode(&y_g);
        let guard_req = GraceRequest {
            project_id: tenant.project_id.clone(),
            grace_key: grace_key.clone(),
            ttl_seconds: config.boundary_grace_seconds as u64,
        };
        match store.guard_grace(guard_req).await? {
            GraceOutcome::Hit(cached) if cached.ok => {
                return Ok((
                    SpendResponse {
                        ok: true,
                        remaining: cached.remaining,
                        idempotent: false,
                        window_used: "grace_cached".to_string(),
                        error: None,
                    },
                    in_grace,
                ));
            }
            GraceOutcome::Hit(_) => {
                // Cached denial: never replayed, re-evaluate normally.
            }
            GraceOutcome::Miss => {
                grace_hit_ok = true;
            }
        }
    }

    // S7: call spend.
    let spend_req = SpendRequest {
        project_id: tenant.project_id.clone(),
        key: spend_key,
        ik: ik_b64,
        limit: tenant.limit,
        ttl_seconds,
    };
    let result = store.spend(spend_req).await?;

    if result.ok && in_grace && grace_hit_ok {
        let y_g = grace_nullifier(
            &decoded.z_prime_enc,
            &decoded.kid,
            &config.issuer_pubkey,
            &origin_canonical,
            &policy_id,
            &decoded.aad_r,
        );
        let grace_key = b64url_encode(&y_g);
        let cache_req = GraceRequest {
            project_id: tenant.project_id.clone(),
            grace_key,
            ttl_seconds: config.boundary_grace_seconds as u64,
        };
        // A cancelled request must still leave the grace response cached
        // (spec.md §5); awaiting here before returning guarantees that
        // regardless of what the caller does with the future afterward.
        if let Err(err) = store.cache_grace_response(cache_req, result.clone()).await {
            tracing::warn!(?err, "failed to cache grace response");
        }
    }

    Ok((
        SpendResponse {
            ok: result.ok,
            remaining: result.remaining,
            idempotent: result.idempotent,
            window_used: window.to_string(),
            error: result.error,
        },
        in_grace,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apikey::EnvApiKeyStore;
    use crate::store::atomic::AtomicStore;

    fn test_config() -> Config {
        Config {
            storage_backend: crate::config::StorageBackend::Atomic,
            boundary_grace_seconds: 60,
            rate_limit: 3,
            issuer_pubkey: crate::crypto::encode_point(&ProjectivePoint::GENERATOR).to_vec(),
            secret_key: "secret".to_string(),
            kv_secret: vec![9u8; 32],
        }
    }

    #[tokio::test]
    async fn missing_api_key_short_circuits_before_parsing() {
        let config = test_config();
        let api_keys = EnvApiKeyStore::new(config.secret_key.clone(), config.rate_limit);
        let store = AtomicStore::new();
        let (sink, _rx) = crate::telemetry::channel(8);
        let http = HttpContext {
            method: "POST".to_string(),
            path: "/verify".to_string(),
            body: b"not even json".to_vec(),
        };
        let err = spend(&config, &api_keys, &store, &sink, "", &http, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, BrassError::MissingApiKey);
    }

    #[tokio::test]
    async fn malformed_body_is_server_error() {
        let config = test_config();
        let api_keys = EnvApiKeyStore::new(config.secret_key.clone(), config.rate_limit);
        let store = AtomicStore::new();
        let (sink, _rx) = crate::telemetry::channel(8);
        let http = HttpContext {
            method: "POST".to_string(),
            path: "/verify".to_string(),
            body: b"not json at all".to_vec(),
        };
        let err = spend(&config, &api_keys, &store, &sink, "secret", &http, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "server_error");
    }
}
