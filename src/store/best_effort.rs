//! Eventually-consistent counter store, for the free tier.
//!
//! Same [`decide`] decision table as [`super::atomic`], but the read and
//! the write are two separate `DashMap` operations with no lock held across
//! them: concurrent writers can each read the same count and each write
//! `count+1`, under-counting against the configured limit. This is
//! documented, accepted behavior for this backend, not a bug — strict
//! enforcement requires the atomic store.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::BrassError;

use super::{decide, CounterStore, GraceOutcome, GraceRequest, SpendOutcome, SpendRequest, SpendResult};

struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

/// Eventually-consistent counter store: no cross-operation locking.
pub struct BestEffortStore {
    counters: DashMap<String, CounterEntry>,
    iks: DashMap<String, (SpendResult, Instant)>,
    grace: DashMap<String, (SpendResult, Instant)>,
}

impl BestEffortStore {
    pub fn new() -> Self {
        BestEffortStore {
            counters: DashMap::new(),
            iks: DashMap::new(),
            grace: DashMap::new(),
        }
    }
}

impl Default for BestEffortStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for BestEffortStore {
    async fn spend(&self, req: SpendRequest) -> Result<SpendResult, BrassError> {
        let wire_key = req.key.wire();

        let ik_cached = self
            .iks
            .get(&req.ik)
            .filter(|entry| Instant::now() < entry.1)
            .map(|entry| entry.0.clone());

        // Read count (expired entries read as zero) with no lock held past
        // this point: a concurrent writer can race between here and the
        // insert below.
        let current_count = self
            .counters
            .get(&wire_key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.count)
            .unwrap_or(0);

        let ttl = Duration::from_secs(req.ttl_seconds.max(1));

        match decide(ik_cached, current_count, req.limit) {
            SpendOutcome::Idempotent(result) => Ok(result),
            SpendOutcome::Denied(result) => {
                self.iks
                    .insert(req.ik.clone(), (result.clone(), Instant::now() + ttl));
                Ok(result)
            }
            SpendOutcome::Accepted { result, new_count } => {
                self.counters.insert(
                    wire_key,
                    CounterEntry {
                        count: new_count,
                        expires_at: Instant::now() + ttl,
                    },
                );
                self.iks
                    .insert(req.ik.clone(), (result.clone(), Instant::now() + ttl));
                Ok(result)
            }
        }
    }

    async fn guard_grace(&self, req: GraceRequest) -> Result<GraceOutcome, BrassError> {
        let key = format!("{}:{}", req.project_id, req.grace_key);
        match self.grace.get(&key) {
            Some(entry) if Instant::now() < entry.1 => Ok(GraceOutcome::Hit(entry.0.clone())),
            _ => Ok(GraceOutcome::Miss),
        }
    }

    async fn cache_grace_response(
        &self,
        req: GraceRequest,
        response: SpendResult,
    ) -> Result<(), BrassError> {
        let key = format!("{}:{}", req.project_id, req.grace_key);
        // Read-before-write de-duplication: best-effort only, a concurrent
        // writer can still slip in between the check and the insert.
        let already_live = self
            .grace
            .get(&key)
            .map(|entry| Instant::now() < entry.1)
            .unwrap_or(false);
        if !already_live {
            let ttl = Duration::from_secs(req.ttl_seconds.max(1));
            self.grace.insert(key, (response, Instant::now() + ttl));
        }
        Ok(())
    }
}
