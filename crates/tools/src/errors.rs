// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use drape_workspace::WorkspaceError;
use thiserror::Error;

/// Error taxonomy for the tool dispatcher (spec.md §4.8, §7).
///
/// These are surfaced to the agent loop as a `tool_error` event and appended
/// to the conversation as `Error: <message>` — never as a transport failure —
/// so they never map to `WorkspaceError::from` directly at the call site.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("refusing to operate on a binary file: {0}")]
    BinaryFile(String),

    #[error("old_string not found in {0}")]
    OldStringNotFound(String),

    #[error("command rejected by the security deny-list: {0}")]
    DeniedCommand(String),

    #[error("tool timed out after {0}ms")]
    Timeout(u64),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
