//! Crate root: public surface and module layout for the BRASS verifier.
//!
//! Clients present cryptographically blinded, issuer-signed tokens proving
//! "I hold a single-use epoch pass for origin O and policy P" without
//! revealing anything user-identifying. This crate is the *spend-
//! verification pipeline*: decode and validate a presentation, verify two
//! DLEQ proofs over NIST P-256, derive a server-chosen salt and nullifier
//! from public context, enforce origin canonicalization and HTTP-body
//! binding, and perform atomic idempotent spend-accounting with a
//! UTC-midnight grace window.
//!
//! ## Invariants
//!
//! - **Curve.** All elliptic-curve operations are over NIST P-256
//!   (`p256::{ProjectivePoint, Scalar}`). Points are 33-byte compressed SEC1;
//!   every decode rejects the identity and non-canonical encodings.
//! - **Fiat–Shamir.** `H3` is SHA-256 over length-delimited, domain-separated
//!   parts (see [`crypto::h3`]); both DLEQ proofs replay the same
//!   verifier equation (see [`proof::verify`]).
//! - **Determinism.** The derivation layer ([`derive`]) takes only public
//!   inputs; the server is the sole authority on salt and nullifier.
//! - **Tenancy.** Every persisted counter and idempotency key carries an
//!   explicit `project:<id>` prefix (see [`store::SpendKey::wire`]); there is
//!   no shared namespace across tenants.
//!
//! The issuer service, HTTP transport, and telemetry shipping are explicit
//! non-goals: this crate is invoked with a parsed presentation, the raw
//! method/path/body, and a validated [`config::Config`]; it returns a
//! decision and emits telemetry records, nothing more.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// API-key lookup: the only source of tenancy and rate limits.
pub mod apikey;
/// Startup configuration, validated once and passed explicitly into the handler.
pub mod config;
/// Hashing, point codec, constant-time comparison, base64url codec.
pub mod crypto;
/// Deterministic derivation of η, y, IK, the grace nullifier, and `d`.
pub mod derive;
/// The unified error taxonomy.
pub mod error;
/// The S0–S7 spend pipeline.
pub mod handler;
/// Origin canonicalization.
pub mod origin;
/// The wire presentation and its decoded form.
pub mod presentation;
/// The shared DLEQ verifier used for both π_I and π_C.
pub mod proof;
/// The counter-store trait and its two backends.
pub mod store;
/// Fire-and-forget telemetry event records.
pub mod telemetry;

pub use error::BrassError;
pub use handler::{spend, HttpContext, SpendResponse};
