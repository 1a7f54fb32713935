// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use drape_container::{ExecOutput, FakeContainerDriver};
use drape_core::{PackageManager, ProjectId, ProjectInfo, ProjectType};

use super::{classify_error, extract_env_vars, DevServerSupervisor};
use crate::errors::{CrashReason, WorkspaceError};

fn vite_project() -> ProjectInfo {
    ProjectInfo {
        project_type: ProjectType::Vite,
        human_description: "Vite project".to_string(),
        install_command: Some("npm install".to_string()),
        start_command: "npm run dev -- --host 0.0.0.0 --port 3000".to_string(),
        dev_server_port: 3000,
        package_manager: Some(PackageManager::Npm),
        subdirectory: None,
    }
}

#[tokio::test]
async fn already_responding_server_returns_immediately_without_posting_setup() {
    let driver = Arc::new(FakeContainerDriver::new());
    driver.script_exec(
        "-o /dev/null",
        ExecOutput { exit_code: 0, stdout: "200".to_string(), stderr: String::new() },
    );
    let supervisor = DevServerSupervisor::new(driver.clone());

    supervisor.start(&ProjectId::new("p1"), "http://127.0.0.1:1", "/home/coder/project", &vite_project()).await.unwrap();

    // Only the readiness probe ran, not the crash-tail or error-scan commands.
    assert_eq!(driver.exec_call_count(), 1);
}

#[tokio::test]
async fn is_responding_reports_false_when_probe_returns_zero() {
    let driver = Arc::new(FakeContainerDriver::new());
    driver.script_exec(
        "-o /dev/null",
        ExecOutput { exit_code: 0, stdout: "000".to_string(), stderr: String::new() },
    );
    let supervisor = DevServerSupervisor::new(driver.clone());

    assert!(!supervisor.is_responding("http://127.0.0.1:1", "/home/coder/project", 3000).await);
}

#[test]
fn classify_error_detects_missing_env_vars() {
    let body = "Invalid environment variables\n- DATABASE_URL: Required\n- API_KEY: Required\n";
    match classify_error(body) {
        Some(CrashReason::MissingEnvVars(vars)) => {
            assert!(vars.contains(&"DATABASE_URL".to_string()));
            assert!(vars.contains(&"API_KEY".to_string()));
        }
        other => panic!("expected MissingEnvVars, got {other:?}"),
    }
}

#[test]
fn classify_error_falls_back_to_uppercase_token_heuristic() {
    let body = "Environment variable SESSION_SECRET is missing";
    let vars = extract_env_vars(body);
    assert!(vars.contains(&"SESSION_SECRET".to_string()));
}

#[test]
fn classify_error_detects_missing_module() {
    let body = "Error: Cannot find module 'left-pad'\n    at Module._resolveFilename (node:internal/modules/cjs/loader:1028:15)\ncode: MODULE_NOT_FOUND";
    match classify_error(body) {
        Some(CrashReason::MissingModule(name)) => assert_eq!(name, "left-pad"),
        other => panic!("expected MissingModule, got {other:?}"),
    }
}

#[test]
fn classify_error_detects_port_in_use() {
    let body = "Error: listen EADDRINUSE: address already in use :::3000";
    assert_eq!(classify_error(body), Some(CrashReason::PortInUse));
}

#[test]
fn classify_error_detects_syntax_error() {
    let body = "SyntaxError: Unexpected token 'const'\n    at wrapSafe (node:internal/modules/cjs/loader:1153:18)";
    match classify_error(body) {
        Some(CrashReason::SyntaxError(msg)) => assert_eq!(msg, "Unexpected token 'const'"),
        other => panic!("expected SyntaxError, got {other:?}"),
    }
}

#[test]
fn classify_error_falls_back_to_generic_exit_with_trailing_lines() {
    let body = "starting server\nexited with code 1\nsome harmless line\n    at internal stack frame\nfinal error line";
    match classify_error(body) {
        Some(CrashReason::GenericExit { code, last_lines }) => {
            assert_eq!(code, 1);
            assert!(!last_lines.iter().any(|l| l.starts_with("at ")));
            assert!(last_lines.iter().any(|l| l.contains("final error line")));
        }
        other => panic!("expected GenericExit, got {other:?}"),
    }
}

#[test]
fn classify_error_returns_none_for_clean_output() {
    assert_eq!(classify_error("<html><body>Hello</body></html>"), None);
}

#[tokio::test(start_paused = true)]
async fn crash_loop_classified_from_tailed_log() {
    let driver = Arc::new(FakeContainerDriver::new());
    // Never responds.
    driver.script_exec("-o /dev/null", ExecOutput { exit_code: 0, stdout: "000".to_string(), stderr: String::new() });
    driver.script_exec(
        "tail -n 200",
        ExecOutput {
            exit_code: 0,
            stdout: "listen EADDRINUSE: address already in use\nexited with code 1\nexited with code 1\n".to_string(),
            stderr: String::new(),
        },
    );
    let supervisor = DevServerSupervisor::new(driver.clone());

    let err = supervisor
        .start(&ProjectId::new("p1"), "http://127.0.0.1:1", "/home/coder/project", &vite_project())
        .await
        .unwrap_err();

    match err {
        WorkspaceError::DevServerCrashed(CrashReason::PortInUse) => {}
        other => panic!("expected DevServerCrashed(PortInUse), got {other:?}"),
    }
}
