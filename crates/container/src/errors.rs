// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Error taxonomy for the container driver (spec.md §7's "Container
/// lifecycle" and "Transient transport" kinds).
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container runtime transport error: {0}")]
    Transport(String),

    /// One of `{502,503,504}` or a transport-level reset/refused/timeout —
    /// retried with bounded backoff before becoming fatal.
    #[error("transient error (retriable): {0}")]
    Transient(String),

    #[error("container {0} not found")]
    NotFound(String),

    #[error("failed to create container: {0}")]
    CreateFailed(String),

    #[error("container {0} is not healthy")]
    Unhealthy(String),

    #[error("timed out waiting for in-container agent at {0}")]
    AgentTimeout(String),

    #[error("TLS material error: {0}")]
    Tls(String),

    #[error("no hosts configured")]
    NoHosts,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    /// Whether this error is one the exec retry loop should retry, per
    /// spec.md §4.2's `exec` contract.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ContainerError::Transient(_))
    }
}
