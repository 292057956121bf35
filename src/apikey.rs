//! API-key lookup: the only source of tenancy and rate limits.
//!
//! `projectId` returned here is threaded into every counter and grace key;
//! nothing else in the pipeline invents a tenant identity. The managed
//! multi-tenant key database is out of scope for this crate — the single
//! environment-backed implementation below exists so the verifier is
//! runnable standalone and so tests don't need a database.

#![allow(missing_docs)]

use async_trait::async_trait;

use crate::error::BrassError;

/// A successful lookup: the tenant identity and its rate limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyInfo {
    pub project_id: String,
    pub limit: u32,
}

/// Looks up the tenant and limit behind an opaque API-key string.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn lookup(&self, api_key: &str) -> Result<ApiKeyInfo, BrassError>;
}

/// Single-tenant store backed by `BRASS_SECRET_KEY` / `BRASS_RATE_LIMIT`.
///
/// Any request bearing exactly the configured secret key is treated as the
/// single tenant `"default"`; everything else is `invalid_api_key`.
pub struct EnvApiKeyStore {
    secret_key: String,
    limit: u32,
}

impl EnvApiKeyStore {
    pub fn new(secret_key: String, limit: u32) -> Self {
        EnvApiKeyStore { secret_key, limit }
    }
}

#[async_trait]
impl ApiKeyStore for EnvApiKeyStore {
    async fn lookup(&self, api_key: &str) -> Result<ApiKeyInfo, BrassError> {
        if api_key.is_empty() {
            return Err(BrassError::MissingApiKey);
        }
        if crate::crypto::ct_eq(api_key.as_bytes(), self.secret_key.as_bytes()) {
            Ok(ApiKeyInfo {
                project_id: "default".to_string(),
                limit: self.limit,
            })
        } else {
            Err(BrassError::InvalidApiKey)
        }
    }
}
