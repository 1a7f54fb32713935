// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP error taxonomy (spec.md §7): orchestrator entry points other than
//! `run`/`startPreview` propagate errors to the caller as structured
//! results, mapped here to the 4xx/5xx shape spec.md §7 describes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drape_container::ContainerError;
use drape_providers::ProviderError;
use drape_workspace::WorkspaceError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Workspace(WorkspaceError::NoSession) => StatusCode::NOT_FOUND,
            ApiError::Workspace(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Provider(ProviderError::UnknownModel(_)) => StatusCode::BAD_REQUEST,
            ApiError::Provider(ProviderError::BadRequest(_)) => StatusCode::BAD_REQUEST,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Container(ContainerError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Container(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        tracing::warn!(status = %status, error = %self, "request failed");
        (status, body).into_response()
    }
}
