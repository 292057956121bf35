//! Counter store: a narrow interface (`spend` / `guard_grace` /
//! `cache_grace_response`) with two backends behind it — [`atomic`]
//! (single-writer, linearizable per key) and [`best_effort`] (eventually
//! consistent, races exposed on purpose). Both backends share the pure
//! decision function [`decide`]; only the surrounding concurrency control
//! differs.

#![allow(missing_docs)]

pub mod atomic;
pub mod best_effort;

use async_trait::async_trait;

use crate::error::BrassError;

/// `(projectId, issuerPk, origin, epoch, policyId, windowId, y)`, serialized
/// into the bit-stable wire format third-party tooling depends on.
#[derive(Debug, Clone)]
pub struct SpendKey {
    pub project_id: String,
    pub issuer_pk: String,
    pub origin: String,
    pub epoch: i64,
    pub policy_id: String,
    pub window_id: i64,
    pub y: String,
}

impl SpendKey {
    /// `project:<projectId>|<issuerPk>|<origin>|<epoch>|<policyId>|<windowId>|<y>`.
    ///
    /// The `project:` prefix and field order are bit-stable; do not reorder.
    pub fn wire(&self) -> String {
        format!(
            "project:{}|{}|{}|{}|{}|{}|{}",
            self.project_id,
            self.issuer_pk,
            self.origin,
            self.epoch,
            self.policy_id,
            self.window_id,
            self.y
        )
    }
}

/// The cached/returned decision for a single spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendResult {
    pub ok: bool,
    pub remaining: u32,
    pub error: Option<String>,
    pub idempotent: bool,
}

/// Request to `CounterStore::spend`.
#[derive(Debug, Clone)]
pub struct SpendRequest {
    pub project_id: String,
    pub key: SpendKey,
    pub ik: String,
    pub limit: u32,
    pub ttl_seconds: u64,
}

/// Request to `CounterStore::guard_grace` / `cache_grace_response`.
#[derive(Debug, Clone)]
pub struct GraceRequest {
    pub project_id: String,
    pub grace_key: String,
    pub ttl_seconds: u64,
}

/// Outcome of a `guard_grace` lookup.
#[derive(Debug, Clone)]
pub enum GraceOutcome {
    Hit(SpendResult),
    Miss,
}

/// The uniform counter-store interface (spec.md §4.4), implemented by both
/// backends. `async_trait` is the ecosystem-standard way to put `async fn`
/// behind a trait object, matching how the corpus's service crates do it.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Look up `ik[projectId, IK]`; if present return it verbatim with
    /// `idempotent=true` and never touch the counter. Otherwise read the
    /// counter, compare to `limit`, and either deny or increment — see
    /// [`decide`] for the exact decision table.
    async fn spend(&self, req: SpendRequest) -> Result<SpendResult, BrassError>;

    /// Test-and-set lookup against the window-agnostic grace key.
    async fn guard_grace(&self, req: GraceRequest) -> Result<GraceOutcome, BrassError>;

    /// Cache a (successful) response under the grace key. Only ever called
    /// with a success; denials are never replayed across the boundary.
    async fn cache_grace_response(
        &self,
        req: GraceRequest,
        response: SpendResult,
    ) -> Result<(), BrassError>;
}

/// The pure decision table behind `spend` (spec.md §4.4 steps 1–3),
/// independent of how the caller holds its lock.
pub enum SpendOutcome {
    /// An `ik[...]` hit: return verbatim, do not write anything.
    Idempotent(SpendResult),
    /// Budget exhausted: the caller must persist this under `ik[...]`.
    Denied(SpendResult),
    /// Budget available: the caller must persist `counter <- new_count`
    /// and `ik[...] <- result`, both with the same TTL.
    Accepted { result: SpendResult, new_count: u64 },
}

pub fn decide(ik_cached: Option<SpendResult>, current_count: u64, limit: u32) -> SpendOutcome {
    if let Some(cached) = ik_cached {
        return SpendOutcome::Idempotent(SpendResult {
            idempotent: true,
            ..cached
        });
    }
    if current_count >= limit as u64 {
        return SpendOutcome::Denied(SpendResult {
            ok: false,
            remaining: 0,
            error: Some("limit_exceeded".to_string()),
            idempotent: false,
        });
    }
    let new_count = current_count + 1;
    let remaining = (limit as u64).saturating_sub(new_count) as u32;
    SpendOutcome::Accepted {
        result: SpendResult {
            ok: true,
            remaining,
            error: None,
            idempotent: false,
        },
        new_count,
    }
}
