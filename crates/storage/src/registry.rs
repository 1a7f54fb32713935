// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent `(userId, projectId)` session registry.
//!
//! The full map is rewritten to a single on-disk file on a coalescing
//! debounce: repeated mutations inside the debounce window produce one
//! write, not one per mutation. A disk load failure is logged and treated
//! as an empty registry; a disk save failure is logged and never fails the
//! caller's write.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use drape_core::{ContainerId, ProjectId, Session, SessionKey, UserId};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;

use crate::errors::StorageError;

const SAVE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Tag stamped on session records recovered from a pre-keyed on-disk format
/// that had no `userId` of its own.
pub const LEGACY_USER_TAG: &str = "legacy";

struct Inner {
    path: PathBuf,
    data: RwLock<HashMap<SessionKey, Session>>,
    per_key_locks: Mutex<HashMap<SessionKey, Arc<AsyncMutex<()>>>>,
    save_pending: Mutex<bool>,
}

/// Cheaply cloneable handle to the registry; all clones share the same
/// backing map and lock table.
#[derive(Clone)]
pub struct SessionRegistry(Arc<Inner>);

/// On-disk representation: a flat list, so that a legacy (keyless) entry can
/// be represented without requiring a `SessionKey` to already exist.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct PersistedEntry {
    #[serde(default)]
    user_id: Option<String>,
    project_id: String,
    session: Session,
}

impl SessionRegistry {
    /// Load the registry from `path`, or start empty if the file is absent
    /// or fails to parse.
    pub async fn load(path: PathBuf) -> Self {
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<PersistedEntry>>(&bytes) {
                Ok(entries) => entries
                    .into_iter()
                    .map(|entry| {
                        let user_id = entry.user_id.unwrap_or_else(|| LEGACY_USER_TAG.to_string());
                        let key = SessionKey::new(UserId::new(user_id), ProjectId::new(entry.project_id));
                        (key, entry.session)
                    })
                    .collect(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse session registry, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read session registry, starting empty");
                HashMap::new()
            }
        };

        Self(Arc::new(Inner {
            path,
            data: RwLock::new(data),
            per_key_locks: Mutex::new(HashMap::new()),
            save_pending: Mutex::new(false),
        }))
    }

    /// Look up a session by its primary `(userId, projectId)` key.
    pub fn get(&self, key: &SessionKey) -> Option<Session> {
        self.0.data.read().get(key).cloned()
    }

    /// Look up by `projectId` alone, returning the record with the latest
    /// `lastUsed` — used by callers that don't carry a `userId`.
    pub fn get_by_project(&self, project_id: &ProjectId) -> Option<Session> {
        self.0
            .data
            .read()
            .iter()
            .filter(|(key, _)| &key.project_id == project_id)
            .max_by_key(|(_, session)| session.last_used)
            .map(|(_, session)| session.clone())
    }

    pub fn get_by_container(&self, container_id: &ContainerId) -> Option<Session> {
        self.0.data.read().values().find(|s| &s.container_id == container_id).cloned()
    }

    pub fn list_for_user(&self, user_id: &UserId) -> Vec<Session> {
        self.0.data.read().values().filter(|s| &s.user_id == user_id).cloned().collect()
    }

    pub fn list_all(&self) -> Vec<Session> {
        self.0.data.read().values().cloned().collect()
    }

    /// Insert or replace the record at `key`, then schedule a debounced save.
    pub fn put(&self, key: SessionKey, session: Session) {
        self.0.data.write().insert(key, session);
        self.mark_dirty();
    }

    pub fn remove(&self, key: &SessionKey) {
        self.0.data.write().remove(key);
        self.mark_dirty();
    }

    /// Serialize `f` against any other `with_lock` call on the same key.
    /// Calls on distinct keys never block each other.
    pub async fn with_lock<F, Fut, T>(&self, key: &SessionKey, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key_lock = {
            let mut locks = self.0.per_key_locks.lock();
            locks.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        let _guard = key_lock.lock().await;
        f().await
    }

    fn mark_dirty(&self) {
        let mut pending = self.0.save_pending.lock();
        if *pending {
            return;
        }
        *pending = true;
        drop(pending);

        let inner = self.0.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SAVE_DEBOUNCE).await;
            *inner.save_pending.lock() = false;
            if let Err(e) = Self::save_now(&inner).await {
                tracing::warn!(path = %inner.path.display(), error = %e, "failed to save session registry");
            }
        });
    }

    async fn save_now(inner: &Inner) -> Result<(), StorageError> {
        let entries: Vec<PersistedEntry> = inner
            .data
            .read()
            .iter()
            .map(|(key, session)| PersistedEntry {
                user_id: Some(key.user_id.as_str().to_string()),
                project_id: key.project_id.as_str().to_string(),
                session: session.clone(),
            })
            .collect();

        let json = serde_json::to_vec_pretty(&entries)?;
        if let Some(parent) = inner.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = inner.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &inner.path).await?;
        Ok(())
    }

    /// Force an immediate save, bypassing the debounce. Used at shutdown.
    pub async fn flush(&self) -> Result<(), StorageError> {
        Self::save_now(&self.0).await
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
