//! `drape usage` specs.

use chrono::Utc;
use serde_json::json;
use tempfile::tempdir;

use crate::prelude::*;

#[test]
fn reports_zero_for_a_user_with_no_entries() {
    let dir = tempdir().unwrap();
    cli_with_state_dir(&dir.path().to_path_buf())
        .args(&["usage", "--user", "alice"])
        .passes()
        .stdout_has("0.00 EUR");
}

#[test]
fn sums_this_months_entries() {
    let dir = tempdir().unwrap();
    let now = Utc::now();
    let entry = json!({
        "user_id": "alice",
        "model": "claude-sonnet",
        "input_tokens": 1000,
        "output_tokens": 500,
        "cached_tokens": 0,
        "cost_eur": 0.42,
        "timestamp": now.to_rfc3339(),
    });
    let mut line = serde_json::to_string(&entry).unwrap();
    line.push('\n');
    std::fs::write(dir.path().join("usage.jsonl"), line).unwrap();

    cli_with_state_dir(&dir.path().to_path_buf())
        .args(&["usage", "--user", "alice"])
        .passes()
        .stdout_has("0.42 EUR");
}
