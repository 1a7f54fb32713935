// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use drape_container::ContainerError;
use drape_storage::StorageError;
use thiserror::Error;

/// Structured dev-server crash classification (spec.md §4.5, §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrashReason {
    MissingEnvVars(Vec<String>),
    MissingModule(String),
    SyntaxError(String),
    PortInUse,
    GenericExit { code: i32, last_lines: Vec<String> },
}

impl std::fmt::Display for CrashReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrashReason::MissingEnvVars(vars) => {
                write!(f, "missing required environment variables: {}", vars.join(", "))
            }
            CrashReason::MissingModule(m) => write!(f, "missing module: {m}"),
            CrashReason::SyntaxError(msg) => write!(f, "syntax error: {msg}"),
            CrashReason::PortInUse => write!(f, "dev server port already in use"),
            CrashReason::GenericExit { code, last_lines } => {
                write!(f, "dev server exited with code {code}: {}", last_lines.join(" / "))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("no session for project")]
    NoSession,

    #[error("install failed: {0}")]
    InstallFailed(String),

    #[error("dev server failed to become ready: {0}")]
    DevServerCrashed(CrashReason),

    #[error("dev server responded with an application error: {0}")]
    DevServerAppError(CrashReason),

    #[error("timed out waiting for dev server")]
    DevServerTimeout,

    #[error("clone failed: {0}")]
    CloneFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
