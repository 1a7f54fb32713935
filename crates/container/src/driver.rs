// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The container driver public contract (spec.md §4.2).

use std::time::Duration;

use async_trait::async_trait;
use drape_core::{ContainerId, ContainerRecord, ContainerState, ProjectId, ServerId};

use crate::errors::ContainerError;

/// Outcome of an `exec` call against the in-container agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// The container runtime contract every caller in this workspace programs
/// against. `RuntimeContainerDriver` is the production implementation;
/// `test-support`'s `FakeContainerDriver` stands in for tests.
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    /// Host with the fewest workspace-labeled containers. Ties resolve to
    /// host order; an unreachable host scores `+inf` (sorts last).
    async fn select_host(&self) -> Result<ServerId, ContainerError>;

    async fn create_container(&self, project_id: &ProjectId) -> Result<ContainerRecord, ContainerError>;

    /// Force-remove; not-found is success (idempotent).
    async fn destroy(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// POST `{command, cwd}` to the in-container agent's `/exec`. Retries up
    /// to 6 times on `{502,503,504}`/transport resets with backoff
    /// `min(2000*attempt, 8000)ms`; non-retriable errors raise immediately.
    async fn exec(
        &self,
        agent_url: &str,
        command: &str,
        cwd: &str,
        timeout_ms: u64,
        silent: bool,
    ) -> Result<ExecOutput, ContainerError>;

    /// Poll `/health` every 500ms until the first 200, or time out.
    async fn wait_for_agent(&self, agent_url: &str, timeout_ms: u64) -> Result<(), ContainerError>;

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, ContainerError>;

    /// Idempotent creation of the shared bridge network on every host.
    async fn initialize_network(&self) -> Result<(), ContainerError>;
}

pub const EXEC_MAX_ATTEMPTS: u32 = 6;

pub fn exec_backoff(attempt: u32) -> Duration {
    Duration::from_millis((2000u64 * attempt as u64).min(8000))
}

pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 502 | 503 | 504)
}

pub fn is_retriable_transport_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("connection reset")
        || lower.contains("connection refused")
        || lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("socket hang up")
}

impl ContainerState {
    pub fn from_inspect(running: bool, status: &str) -> Self {
        if running {
            ContainerState::Running
        } else {
            match status {
                "created" => ContainerState::Creating,
                "removing" | "exited" | "dead" => ContainerState::Stopped,
                _ => ContainerState::Error,
            }
        }
    }
}
