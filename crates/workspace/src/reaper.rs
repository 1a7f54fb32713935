// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle reaper (spec.md §4.6, §5): a single-ticker background sweep that
//! destroys any session whose `now - lastUsed` exceeds the configured idle
//! timeout. Reaping is best-effort — a failure destroying one session never
//! aborts the sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use drape_container::ContainerDriver;
use drape_core::{Clock, SessionKey};
use drape_storage::SessionRegistry;

/// Interval on which the reaper wakes to sweep the registry.
pub const REAPER_TICK: Duration = Duration::from_secs(60);

pub struct IdleReaper<D: ContainerDriver, C: Clock> {
    driver: Arc<D>,
    registry: SessionRegistry,
    clock: C,
    idle_timeout: ChronoDuration,
}

impl<D: ContainerDriver, C: Clock> IdleReaper<D, C> {
    pub fn new(driver: Arc<D>, registry: SessionRegistry, clock: C, idle_timeout: ChronoDuration) -> Self {
        Self { driver, registry, clock, idle_timeout }
    }

    /// Run one sweep: destroy every session eligible for reaping right now.
    /// Returns the number of sessions destroyed.
    pub async fn sweep_once(&self) -> usize {
        let now = self.clock.utc_now();
        let eligible: Vec<SessionKey> = self
            .registry
            .list_all()
            .into_iter()
            .filter(|session| session.is_idle(now, self.idle_timeout))
            .map(|session| SessionKey::new(session.user_id, session.project_id))
            .collect();

        let mut destroyed = 0;
        for key in eligible {
            let did_destroy = self
                .registry
                .with_lock(&key, || async {
                    let Some(session) = self.registry.get(&key) else { return false };
                    if !session.is_idle(now, self.idle_timeout) {
                        return false;
                    }
                    match self.driver.destroy(&session.container_id).await {
                        Ok(()) => {
                            self.registry.remove(&key);
                            tracing::info!(%key, "idle reaper destroyed session");
                            true
                        }
                        Err(err) => {
                            tracing::warn!(%key, %err, "idle reaper failed to destroy container, will retry next tick");
                            false
                        }
                    }
                })
                .await;
            if did_destroy {
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Run the sweep on a fixed 1-minute ticker until the process shuts
    /// down. Intended to be spawned as a background task at startup.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(REAPER_TICK);
        loop {
            ticker.tick().await;
            let n = self.sweep_once().await;
            if n > 0 {
                tracing::info!(reaped = n, "idle reaper sweep complete");
            }
        }
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
