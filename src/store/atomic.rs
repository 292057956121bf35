//! Atomic (strongly consistent) counter store.
//!
//! One `tokio::sync::Mutex` per namespaced counter key, held for the whole
//! "read count, compare, write count+IK" sequence — so the sequence runs as
//! one logical transaction with no interleaving from a concurrent request
//! addressed to the same key. `guard_grace` / `cache_grace_response` use the
//! same per-grace-key mutex for test-and-set semantics: the first writer to
//! take the lock with no cached entry yet is the only one that writes.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::BrassError;

use super::{CounterStore, GraceOutcome, GraceRequest, SpendKey, SpendOutcome, SpendRequest, SpendResult, decide};

struct KeyState {
    count: u64,
    expires_at: Instant,
    iks: HashMap<String, (SpendResult, Instant)>,
}

impl KeyState {
    fn fresh(ttl_seconds: u64) -> Self {
        KeyState {
            count: 0,
            expires_at: Instant::now() + std::time::Duration::from_secs(ttl_seconds.max(1)),
            iks: HashMap::new(),
        }
    }

    fn expire_if_stale(&mut self, ttl_seconds: u64) {
        if Instant::now() >= self.expires_at {
            self.count = 0;
            self.iks.clear();
            self.expires_at = Instant::now() + std::time::Duration::from_secs(ttl_seconds.max(1));
        }
    }
}

/// Single-writer-per-key counter store backed by in-process sharded maps.
pub struct AtomicStore {
    keys: DashMap<String, Arc<Mutex<KeyState>>>,
    grace: DashMap<String, Arc<Mutex<Option<(SpendResult, Instant)>>>>,
}

impl AtomicStore {
    pub fn new() -> Self {
        AtomicStore {
            keys: DashMap::new(),
            grace: DashMap::new(),
        }
    }

    fn entry_for(&self, wire_key: &str) -> Arc<Mutex<KeyState>> {
        self.keys
            .entry(wire_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(KeyState::fresh(86_400))))
            .clone()
    }

    fn grace_entry(&self, grace_key: &str) -> Arc<Mutex<Option<(SpendResult, Instant)>>> {
        self.grace
            .entry(grace_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}

impl Default for AtomicStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for AtomicStore {
    async fn spend(&self, req: SpendRequest) -> Result<SpendResult, BrassError> {
        let wire_key = req.key.wire();
        let cell = self.entry_for(&wire_key);
        let mut state = cell.lock().await;
        state.expire_if_stale(req.ttl_seconds);

        let ik_cached = state
            .iks
            .get(&req.ik)
            .filter(|(_, exp)| Instant::now() < *exp)
            .map(|(r, _)| r.clone());

        match decide(ik_cached, state.count, req.limit) {
            SpendOutcome::Idempotent(result) => Ok(result),
            SpendOutcome::Denied(result) => {
                let expiry = Instant::now() + std::time::Duration::from_secs(req.ttl_seconds.max(1));
                state.iks.insert(req.ik.clone(), (result.clone(), expiry));
                Ok(result)
            }
            SpendOutcome::Accepted { result, new_count } => {
                let expiry = Instant::now() + std::time::Duration::from_secs(req.ttl_seconds.max(1));
                state.count = new_count;
                state.expires_at = expiry;
                state.iks.insert(req.ik.clone(), (result.clone(), expiry));
                Ok(result)
            }
        }
    }

    async fn guard_grace(&self, req: GraceRequest) -> Result<GraceOutcome, BrassError> {
        let cell = self.grace_entry(&format!("{}:{}", req.project_id, req.grace_key));
        let guard = cell.lock().await;
        match guard.as_ref() {
            Some((response, expiry)) if Instant::now() < *expiry => {
                Ok(GraceOutcome::Hit(response.clone()))
            }
            _ => Ok(GraceOutcome::Miss),
        }
    }

    async fn cache_grace_response(
        &self,
        req: GraceRequest,
        response: SpendResult,
    ) -> Result<(), BrassError> {
        let cell = self.grace_entry(&format!("{}:{}", req.project_id, req.grace_key));
        let mut guard = cell.lock().await;
        let still_live = guard
            .as_ref()
            .map(|(_, exp)| Instant::now() < *exp)
            .unwrap_or(false);
        if !still_live {
            let expiry = Instant::now() + std::time::Duration::from_secs(req.ttl_seconds.max(1));
            *guard = Some((response, expiry));
        }
        Ok(())
    }
}
