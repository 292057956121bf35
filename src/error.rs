//! The verifier's single error taxonomy.
//!
//! Every fallible core function returns `Result<_, BrassError>`. Variants map
//! 1:1 onto the surface-visible error kinds in the spec (missing_api_key,
//! invalid_piC, limit_exceeded, ...); `BrassError::kind()` is the stable
//! string the HTTP façade puts in `{ "error": <kind> }`, and
//! `BrassError::http_status()` is the status code that goes with it.

#![allow(missing_docs)]

use thiserror::Error;

/// Unified error type for the spend-verification pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrassError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,

    #[error("invalid point encoding")]
    InvalidPointEncoding,
    #[error("point decodes to the identity element")]
    InvalidPointInfinity,

    #[error("issuer DLEQ proof failed to verify")]
    InvalidPiI,
    #[error("client DLEQ proof failed to verify")]
    InvalidPiC,

    #[error("client-supplied HTTP context digest does not match the server's")]
    DMismatch,

    #[error("invalid origin")]
    InvalidOrigin,
    #[error("origin must use https")]
    OriginMustBeHttps,
    #[error("origin must not contain a userinfo, path, query, or fragment")]
    OriginMustNotContainPathQueryFragment,
    #[error("invalid hostname")]
    InvalidHostname,

    #[error("rate limit exceeded")]
    LimitExceeded,

    #[error("internal server error: {0}")]
    ServerError(String),
}

impl BrassError {
    /// The stable, surface-visible error kind string (spec.md §7).
    pub fn kind(&self) -> &'static str {
        match self {
            BrassError::MissingApiKey => "missing_api_key",
            BrassError::InvalidApiKey => "invalid_api_key",
            BrassError::InvalidPointEncoding => "invalid_point_encoding",
            BrassError::InvalidPointInfinity => "invalid_point_infinity",
            BrassError::InvalidPiI => "invalid_piI",
            BrassError::InvalidPiC => "invalid_piC",
            BrassError::DMismatch => "d_mismatch",
            BrassError::InvalidOrigin => "invalid_origin",
            BrassError::OriginMustBeHttps => "origin_must_be_https",
            BrassError::OriginMustNotContainPathQueryFragment => {
                "origin_must_not_contain_path_query_fragment"
            }
            BrassError::InvalidHostname => "invalid_hostname",
            BrassError::LimitExceeded => "limit_exceeded",
            BrassError::ServerError(_) => "server_error",
        }
    }

    /// HTTP status code this error should be reported with (spec.md §6).
    pub fn http_status(&self) -> u16 {
        match self {
            BrassError::MissingApiKey | BrassError::InvalidApiKey => 401,
            BrassError::InvalidPointEncoding
            | BrassError::InvalidPointInfinity
            | BrassError::InvalidPiI
            | BrassError::InvalidPiC
            | BrassError::DMismatch
            | BrassError::InvalidOrigin
            | BrassError::OriginMustBeHttps
            | BrassError::OriginMustNotContainPathQueryFragment
            | BrassError::InvalidHostname => 401,
            BrassError::LimitExceeded => 429,
            BrassError::ServerError(_) => 500,
        }
    }

    /// Wrap an arbitrary internal failure as a `server_error`.
    pub fn server_error(msg: impl Into<String>) -> Self {
        BrassError::ServerError(msg.into())
    }
}
