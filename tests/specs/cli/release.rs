//! `drape release` specs.

use serde_json::json;
use tempfile::tempdir;

use crate::prelude::*;

fn seed_registry(state_dir: &std::path::Path) {
    let entries = json!([
        {
            "user_id": "alice",
            "project_id": "proj1",
            "session": {
                "user_id": "alice",
                "project_id": "proj1",
                "container_id": "c1",
                "agent_url": "http://10.0.1.4:8787",
                "preview_port": null,
                "server_id": "host-0",
                "created_at": "2026-01-01T00:00:00Z",
                "last_used": "2026-01-01T00:00:00Z",
                "prepared_at": null,
                "project_info": null
            }
        }
    ]);
    std::fs::write(state_dir.join("registry.json"), serde_json::to_vec_pretty(&entries).unwrap()).unwrap();
}

#[test]
fn releases_an_existing_session() {
    let dir = tempdir().unwrap();
    seed_registry(dir.path());

    cli_with_state_dir(&dir.path().to_path_buf())
        .args(&["release", "--user", "alice", "--project", "proj1"])
        .passes()
        .stdout_has("released alice/proj1");

    cli_with_state_dir(&dir.path().to_path_buf()).args(&["sessions"]).passes().stdout_has("no sessions");
}

#[test]
fn releasing_an_unknown_session_fails() {
    let dir = tempdir().unwrap();
    cli_with_state_dir(&dir.path().to_path_buf())
        .args(&["release", "--user", "alice", "--project", "missing"])
        .fails()
        .stderr_has("no session for");
}
