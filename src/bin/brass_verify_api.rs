//! HTTP façade for the BRASS verifier.
//!
//! A thin `axum` transport adapter: `POST /verify` reads the bearer token
//! and JSON body and hands them to [`brass_verifier::spend`]; `GET /health`
//! reports process status. The pipeline itself is transport-agnostic and
//! lives entirely in the library — this binary only maps HTTP in and out.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use brass_verifier::apikey::{ApiKeyStore, EnvApiKeyStore};
use brass_verifier::config::{Config, StorageBackend};
use brass_verifier::handler::HttpContext;
use brass_verifier::store::atomic::AtomicStore;
use brass_verifier::store::best_effort::BestEffortStore;
use brass_verifier::store::CounterStore;
use brass_verifier::telemetry::{self, TelemetrySink};

struct AppState {
    config: Config,
    api_keys: Box<dyn ApiKeyStore>,
    store: Box<dyn CounterStore>,
    telemetry: TelemetrySink,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .init();

    let config = Config::from_env().unwrap_or_else(|err| {
        tracing::error!(%err, "invalid configuration");
        std::process::exit(1);
    });

    let api_keys: Box<dyn ApiKeyStore> = Box::new(EnvApiKeyStore::new(
        config.secret_key.clone(),
        config.rate_limit,
    ));
    let store: Box<dyn CounterStore> = match config.storage_backend {
        StorageBackend::Atomic => Box::new(AtomicStore::new()),
        StorageBackend::BestEffort => Box::new(BestEffortStore::new()),
    };
    let (telemetry_sink, mut telemetry_rx) = telemetry::channel(1024);

    tokio::spawn(async move {
        while let Some(event) = telemetry_rx.recv().await {
            tracing::info!(
                result = event.result,
                response_time_ms = event.response_time_ms,
                in_grace_period = event.in_grace_period,
                grace_protected = event.grace_protected,
                idempotent = event.idempotent,
                remaining = event.remaining,
                "spend telemetry"
            );
        }
    });

    let state = Arc::new(AppState {
        config,
        api_keys,
        store,
        telemetry: telemetry_sink,
    });

    let governor_conf = Box::leak(Box::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(30)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("static governor config is always valid"),
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/verify", post(verify_handler))
        .route("/health", get(health_handler))
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .expect("BIND_ADDR must be a valid socket address");

    tracing::info!(%addr, "starting brass_verify_api");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "ts": Utc::now().to_rfc3339(),
        "build": env!("CARGO_PKG_VERSION"),
        "mode": state.config.storage_backend.as_str(),
    }))
}

async fn verify_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let api_key = bearer_token(&headers).unwrap_or_default();
    let http = HttpContext {
        method: "POST".to_string(),
        path: "/verify".to_string(),
        body: body.to_vec(),
    };

    match brass_verifier::spend(
        &state.config,
        state.api_keys.as_ref(),
        state.store.as_ref(),
        &state.telemetry,
        &api_key,
        &http,
        Utc::now(),
    )
    .await
    {
        Ok(resp) if resp.ok => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "remaining": resp.remaining,
                "idempotent": resp.idempotent,
                "windowUsed": resp.window_used,
            })),
        )
            .into_response(),
        Ok(resp) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": resp.error.unwrap_or_else(|| "limit_exceeded".to_string()),
                "remaining": resp.remaining,
                "windowUsed": resp.window_used,
            })),
        )
            .into_response(),
        Err(err) => {
            let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({ "error": err.kind() }))).into_response()
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("authorization")?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|s| s.to_string())
}
