//! Startup configuration, built once from the environment and passed
//! explicitly into the handler — never re-read per request.
//!
//! This is the REDESIGN FLAGS resolution against "global environment lookup
//! at handler entry": `Config::from_env` does all the fallible parsing
//! eagerly, so a malformed environment fails fast at process startup rather
//! than mid-request.

#![allow(missing_docs)]

use crate::crypto::b64url_decode;
use crate::error::BrassError;

/// Which counter-store backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Atomic,
    BestEffort,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Atomic => "atomic",
            StorageBackend::BestEffort => "best-effort",
        }
    }
}

/// Validated process configuration (spec.md §6).
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub boundary_grace_seconds: i64,
    pub rate_limit: u32,
    pub issuer_pubkey: Vec<u8>,
    pub secret_key: String,
    pub kv_secret: Vec<u8>,
}

impl Config {
    /// Parse and validate every recognized environment setting
    /// (spec.md §6) up front. Fails closed: any malformed or missing
    /// required variable is a startup error, not a per-request one.
    pub fn from_env() -> Result<Self, BrassError> {
        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "atomic".to_string())
            .as_str()
        {
            "atomic" => StorageBackend::Atomic,
            "best-effort" => StorageBackend::BestEffort,
            other => {
                return Err(BrassError::server_error(format!(
                    "STORAGE_BACKEND must be 'atomic' or 'best-effort', got '{other}'"
                )))
            }
        };

        let boundary_grace_seconds = std::env::var("BOUNDARY_GRACE_SECONDS")
            .ok()
            .map(|s| {
                s.parse::<i64>().map_err(|_| {
                    BrassError::server_error("BOUNDARY_GRACE_SECONDS must be an integer")
                })
            })
            .transpose()?
            .unwrap_or(60);

        let rate_limit = std::env::var("BRASS_RATE_LIMIT")
            .ok()
            .map(|s| {
                s.parse::<u32>()
                    .map_err(|_| BrassError::server_error("BRASS_RATE_LIMIT must be an integer"))
            })
            .transpose()?
            .unwrap_or(60);

        let issuer_pubkey_b64 = std::env::var("BRASS_ISSUER_PUBKEY")
            .map_err(|_| BrassError::server_error("BRASS_ISSUER_PUBKEY is required"))?;
        let issuer_pubkey = b64url_decode(&issuer_pubkey_b64)?;
        if issuer_pubkey.len() != 33 {
            return Err(BrassError::server_error(
                "BRASS_ISSUER_PUBKEY must decode to 33 bytes",
            ));
        }

        let secret_key = std::env::var("BRASS_SECRET_KEY")
            .map_err(|_| BrassError::server_error("BRASS_SECRET_KEY is required"))?;

        let kv_secret_b64 = std::env::var("BRASS_KV_SECRET")
            .map_err(|_| BrassError::server_error("BRASS_KV_SECRET is required"))?;
        let kv_secret = b64url_decode(&kv_secret_b64)?;
        if kv_secret.len() != 32 {
            return Err(BrassError::server_error(
                "BRASS_KV_SECRET must decode to 32 bytes",
            ));
        }

        Ok(Config {
            storage_backend,
            boundary_grace_seconds,
            rate_limit,
            issuer_pubkey,
            secret_key,
            kv_secret,
        })
    }
}
