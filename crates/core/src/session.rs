// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session record — the registry's unit of persisted state.

use crate::ids::{ContainerId, ProjectId, ServerId, UserId};
use crate::project::ProjectInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Binds `(userId, projectId)` to a running workspace.
///
/// Invariants (enforced by the registry, not by this type): at most one
/// record per key; `last_used >= created_at`; if `prepared_at` is `Some`
/// then `project_info` is `Some`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub container_id: ContainerId,
    /// HTTP endpoint of the in-container agent, e.g. `http://10.0.1.4:8787`.
    pub agent_url: String,
    /// Host-mapped TCP port for the dev server, once started.
    pub preview_port: Option<u16>,
    pub server_id: ServerId,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    /// Null until the dev server has been confirmed ready at least once.
    ///
    /// Telemetry only (see DESIGN.md): control flow never branches on its
    /// presence.
    pub prepared_at: Option<DateTime<Utc>>,
    pub project_info: Option<ProjectInfo>,
}

impl Session {
    pub fn new(
        user_id: UserId,
        project_id: ProjectId,
        container_id: ContainerId,
        agent_url: impl Into<String>,
        server_id: ServerId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            project_id,
            container_id,
            agent_url: agent_url.into(),
            preview_port: None,
            server_id,
            created_at: now,
            last_used: now,
            prepared_at: None,
            project_info: None,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_used = now;
    }

    pub fn is_idle(&self, now: DateTime<Utc>, idle_timeout: chrono::Duration) -> bool {
        now - self.last_used > idle_timeout
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
