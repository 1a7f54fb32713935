// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hot-reload notification: `write_file`/`edit_file` POST the changed path
//! and new content to the in-container agent's `/file` endpoint (spec.md
//! §6). The response is ignored — this is a best-effort hint, never part of
//! the tool's success/failure outcome.

pub async fn notify(http: &reqwest::Client, agent_url: &str, path: &str, content: &str) {
    let body = serde_json::json!({"path": path, "content": content});
    if let Err(err) = http.post(format!("{agent_url}/file")).json(&body).send().await {
        tracing::debug!(agent_url, path, %err, "hot-reload notification failed, ignoring");
    }
}
