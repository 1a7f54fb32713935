// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface wiring (spec.md §4.9/§4.10/§6): one route per orchestrator
//! and agent-loop verb, behind the mobile client's project-scoped paths.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use drape_agent::{AgentMode, RunRequest};
use drape_core::{ImageSource, Plan, ProjectId, UserId};
use drape_tools::ToolOutcome;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::sse::agent_event_response;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/projects/:project_id/run", post(run))
        .route("/v1/projects/:project_id/tool", post(execute_tool))
        .route("/v1/projects/:project_id/warm", post(warm))
        .route("/v1/projects/:project_id/preview/start", post(start_preview))
        .route("/v1/projects/:project_id/preview/stop", post(stop_preview))
        .route("/v1/projects/:project_id/release", post(release))
        .route("/v1/projects/:project_id/exec", post(exec))
        .route("/v1/projects/:project_id/clone", post(clone_repository))
        .route("/v1/projects/:project_id/files", get(list_files))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct UserScoped {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct RunBody {
    user_id: String,
    mode: AgentMode,
    model: String,
    plan: Plan,
    prompt: String,
    #[serde(default)]
    images: Vec<ImageSource>,
}

/// `POST /v1/projects/:project_id/run` (spec.md §4.9): streams the
/// `AgentEvent` sequence for one `run` call over SSE.
async fn run(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<RunBody>,
) -> Response {
    let request = RunRequest {
        user_id: UserId::new(body.user_id),
        project_id: ProjectId::new(project_id),
        mode: body.mode,
        model: body.model,
        plan: body.plan,
        prompt: body.prompt,
        images: body.images,
    };
    let stream = state.runner.run(request);
    agent_event_response(stream)
}

#[derive(Debug, Deserialize)]
struct ExecuteToolBody {
    user_id: String,
    tool: String,
    input: Value,
}

#[derive(Debug, Serialize)]
struct ExecuteToolResponse {
    outcome: &'static str,
    content: String,
}

/// `POST /v1/projects/:project_id/tool` (spec.md §4.9): `executeTool`, the
/// secondary entry point outside any run loop.
async fn execute_tool(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<ExecuteToolBody>,
) -> Result<Json<ExecuteToolResponse>, ApiError> {
    let user_id = UserId::new(body.user_id);
    let project_id = ProjectId::new(project_id);
    let result = state.runner.execute_tool(&body.tool, &body.input, &user_id, &project_id).await;
    let outcome = match &result.outcome {
        ToolOutcome::Ok(_) => "ok",
        ToolOutcome::Pause(_) => "pause",
        ToolOutcome::Complete(_) => "complete",
        ToolOutcome::Error(_) => "error",
    };
    Ok(Json(ExecuteToolResponse { outcome, content: result.outcome.as_tool_result_content().to_string() }))
}

#[derive(Debug, Deserialize)]
struct WarmBody {
    user_id: String,
    #[serde(default)]
    repo_url: Option<String>,
    #[serde(default)]
    auth_token: Option<String>,
}

/// `POST /v1/projects/:project_id/warm` (spec.md §4.6): `warmProject`.
async fn warm(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<WarmBody>,
) -> Result<Json<Value>, ApiError> {
    let user_id = UserId::new(body.user_id);
    let project_id = ProjectId::new(project_id);
    let session = state
        .orchestrator
        .warm_project(&user_id, &project_id, body.repo_url.as_deref(), body.auth_token.as_deref())
        .await?;
    Ok(Json(json!(session)))
}

#[derive(Debug, Deserialize)]
struct StartPreviewBody {
    user_id: String,
    #[serde(default)]
    repo_url: Option<String>,
    #[serde(default)]
    auth_token: Option<String>,
}

/// `POST /v1/projects/:project_id/preview/start` (spec.md §4.6): the
/// SSE-observable `startPreview` path. Progress steps stream as their own
/// `progress` events ahead of the terminal `result`/`error` event, framed
/// identically to the agent loop's SSE (spec.md §4.10's format, applied to
/// a second event producer — `[SUPPLEMENT]`, see DESIGN.md).
async fn start_preview(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<StartPreviewBody>,
) -> Result<Json<Value>, ApiError> {
    let user_id = UserId::new(body.user_id);
    let project_id = ProjectId::new(project_id);
    let mut steps = Vec::new();
    let outcome = state
        .orchestrator
        .start_preview(
            &user_id,
            &project_id,
            |step, message| steps.push(json!({ "step": step.as_str(), "message": message })),
            body.repo_url.as_deref(),
            body.auth_token.as_deref(),
        )
        .await?;
    Ok(Json(json!({
        "progress": steps,
        "preview_url": outcome.preview_url,
        "agent_url": outcome.agent_url,
        "container_id": outcome.container_id,
        "project_info": outcome.project_info,
    })))
}

/// `POST /v1/projects/:project_id/preview/stop`: `stopPreview`.
async fn stop_preview(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(q): Query<UserScoped>,
) -> Result<StatusCode, ApiError> {
    let user_id = UserId::new(q.user_id);
    let project_id = ProjectId::new(project_id);
    state.orchestrator.stop_preview(&user_id, &project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/projects/:project_id/release`: `release`.
async fn release(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(q): Query<UserScoped>,
) -> Result<StatusCode, ApiError> {
    let user_id = UserId::new(q.user_id);
    let project_id = ProjectId::new(project_id);
    state.orchestrator.release(&user_id, &project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ExecBody {
    user_id: String,
    command: String,
    #[serde(default)]
    cwd: Option<String>,
}

/// `POST /v1/projects/:project_id/exec`: `exec`.
async fn exec(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<ExecBody>,
) -> Result<Json<Value>, ApiError> {
    let user_id = UserId::new(body.user_id);
    let project_id = ProjectId::new(project_id);
    let output = state.orchestrator.exec(&user_id, &project_id, &body.command, body.cwd.as_deref()).await?;
    Ok(Json(json!({ "exit_code": output.exit_code, "stdout": output.stdout, "stderr": output.stderr })))
}

#[derive(Debug, Deserialize)]
struct CloneBody {
    repo_url: String,
    #[serde(default)]
    auth_token: Option<String>,
}

/// `POST /v1/projects/:project_id/clone`: `cloneRepository`, against the
/// project's own host directory.
async fn clone_repository(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<CloneBody>,
) -> Result<StatusCode, ApiError> {
    let destination = state.config.projects_root.join(&project_id);
    state.orchestrator.clone_repository(&destination, &body.repo_url, body.auth_token.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ListFilesQuery {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    recursive: bool,
}

/// `GET /v1/projects/:project_id/files`: `listFiles`.
async fn list_files(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(q): Query<ListFilesQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let project_id = ProjectId::new(project_id);
    let files = state.orchestrator.list_files(&project_id, q.path.as_deref(), q.recursive).await?;
    Ok(Json(files))
}
