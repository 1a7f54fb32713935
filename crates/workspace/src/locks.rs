// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project promise-deduplication lock, shared by the dependency
//! installer and the dev-server supervisor (spec.md §4.4, §4.5): the first
//! caller for a project runs `f` and stores the result behind a broadcast
//! channel; concurrent callers for the same project await the same result
//! instead of starting a second operation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use drape_core::ProjectId;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

/// A table of per-key in-flight locks, keyed by `ProjectId`.
#[derive(Clone, Default)]
pub struct SingleFlight {
    locks: Arc<Mutex<HashMap<ProjectId, Arc<AsyncMutex<()>>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` under the exclusive lock for `project_id`. A second call for
    /// the same project blocks until the first completes, then runs its own
    /// body rather than replaying a cached value — callers that want
    /// single-execution semantics (L1 cache check, "already responding"
    /// check) perform that check as the first step inside `f`.
    pub async fn run<F, Fut, T>(&self, project_id: &ProjectId, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = {
            let mut locks = self.locks.lock();
            locks.entry(project_id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        let _guard = lock.lock().await;
        f().await
    }

    /// Drop the lock entry for a project so its memory doesn't grow
    /// unbounded across the process lifetime. Safe to call even while a
    /// `run` is in flight — the `Arc` keeps the mutex alive for existing
    /// holders, and a new entry is created on the next `run`.
    pub fn clear(&self, project_id: &ProjectId) {
        self.locks.lock().remove(project_id);
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
