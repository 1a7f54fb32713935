// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Error taxonomy for the model provider fabric (spec.md §4.7, §7).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown model {0}")]
    UnknownModel(String),

    #[error("provider transport error: {0}")]
    Transport(String),

    /// A `{429,500,502,503,504}` or a transport-level reset — retried with
    /// bounded backoff before becoming fatal.
    #[error("transient provider error (retriable): {0}")]
    Transient(String),

    #[error("provider rejected the request: {0}")]
    BadRequest(String),

    #[error("provider returned a response this adapter could not parse: {0}")]
    MalformedResponse(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}
