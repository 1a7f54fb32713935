// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use drape_providers::ProviderError;
use drape_storage::StorageError;
use drape_workspace::WorkspaceError;
use thiserror::Error;

/// Fatal errors caught anywhere in the run loop (spec.md §4.9, step 7) and
/// surfaced as a single `fatal_error` event rather than propagated to the
/// caller — the loop itself never returns `Err` once it has emitted `start`.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
