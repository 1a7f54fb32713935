// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drape_container::{ExecOutput, FakeContainerDriver};
use drape_core::{ProjectId, UserId};

async fn orchestrator_with(
    driver: Arc<FakeContainerDriver>,
) -> (WorkspaceOrchestrator<FakeContainerDriver>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let registry = SessionRegistry::load(tmp.path().join("registry.json")).await;
    let config = OrchestratorConfig {
        projects_root: tmp.path().join("projects"),
        cache_root: tmp.path().join("cache"),
        idle_timeout: ChronoDuration::minutes(20),
        container_ready_timeout_ms: 1_000,
        public_host: "example.test".to_string(),
        public_port: 9999,
    };
    (WorkspaceOrchestrator::new(driver, registry, config), tmp)
}

fn respond_ok(driver: &FakeContainerDriver) {
    driver.script_exec(
        "http_code",
        ExecOutput { exit_code: 0, stdout: "200\n__STATUS__200".to_string(), stderr: String::new() },
    );
}

#[tokio::test]
async fn get_or_create_container_reuses_healthy_session() {
    let driver = Arc::new(FakeContainerDriver::new());
    let (orch, _tmp) = orchestrator_with(driver.clone()).await;
    let user = UserId::new("alice");
    let project = ProjectId::new("proj-a");

    let first = orch.get_or_create_container(&user, &project).await.expect("create");
    let second = orch.get_or_create_container(&user, &project).await.expect("reuse");

    assert_eq!(first.container_id, second.container_id);
    assert_eq!(driver.created_container_count(), 1);
}

#[tokio::test]
async fn get_or_create_container_recreates_on_unhealthy_exec() {
    let driver = Arc::new(FakeContainerDriver::new());
    let (orch, _tmp) = orchestrator_with(driver.clone()).await;
    let user = UserId::new("alice");
    let project = ProjectId::new("proj-b");

    let first = orch.get_or_create_container(&user, &project).await.expect("create");

    driver.script_exec("echo ok", ExecOutput { exit_code: 1, stdout: String::new(), stderr: "dead".to_string() });

    let second = orch.get_or_create_container(&user, &project).await.expect("recreate");

    assert_ne!(first.container_id, second.container_id);
    assert_eq!(driver.created_container_count(), 2);
}

#[tokio::test]
async fn warm_project_returns_early_when_dev_server_already_responding() {
    let driver = Arc::new(FakeContainerDriver::new());
    respond_ok(&driver);
    let (orch, tmp) = orchestrator_with(driver.clone()).await;
    let user = UserId::new("alice");
    let project = ProjectId::new("proj-c");

    tokio::fs::create_dir_all(tmp.path().join("projects").join(project.as_str())).await.expect("mkdir");

    let session = orch.warm_project(&user, &project, None, None).await.expect("warm");
    assert!(session.project_info.is_some());

    // No install/start should have been spawned in the background since the
    // dev server already responds.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn start_preview_fast_path_returns_identical_outcome_without_reinstalling() {
    let driver = Arc::new(FakeContainerDriver::new());
    respond_ok(&driver);
    let (orch, tmp) = orchestrator_with(driver.clone()).await;
    let user = UserId::new("alice");
    let project = ProjectId::new("proj-d");
    tokio::fs::create_dir_all(tmp.path().join("projects").join(project.as_str())).await.expect("mkdir");

    let mut steps = Vec::new();
    let first = orch
        .start_preview(&user, &project, |step, _msg| steps.push(step), None, None)
        .await
        .expect("slow path");
    assert!(steps.contains(&ProgressStep::Ready));

    let calls_before = driver.exec_call_count();
    let mut steps2 = Vec::new();
    let second = orch
        .start_preview(&user, &project, |step, _msg| steps2.push(step), None, None)
        .await
        .expect("fast path");

    assert_eq!(first.preview_url, second.preview_url);
    assert_eq!(first.container_id, second.container_id);
    assert_eq!(first.agent_url, second.agent_url);
    // Fast path only re-detects and re-probes; it must not re-run install.
    assert!(driver.exec_call_count() > calls_before);
    assert!(!steps2.contains(&ProgressStep::Install));
}

#[tokio::test]
async fn release_destroys_container_and_removes_session() {
    let driver = Arc::new(FakeContainerDriver::new());
    let (orch, _tmp) = orchestrator_with(driver.clone()).await;
    let user = UserId::new("alice");
    let project = ProjectId::new("proj-e");

    let session = orch.get_or_create_container(&user, &project).await.expect("create");
    orch.release(&user, &project).await.expect("release");

    let key = SessionKey::new(user.clone(), project.clone());
    assert!(orch.registry.get(&key).is_none());
    assert_eq!(driver.created_container_count(), 0);
    let _ = session;
}

#[tokio::test]
async fn clone_repository_is_idempotent_on_existing_git_marker() {
    let driver = Arc::new(FakeContainerDriver::new());
    let (orch, tmp) = orchestrator_with(driver).await;
    let dest = tmp.path().join("already-cloned");
    tokio::fs::create_dir_all(dest.join(".git")).await.expect("mkdir");

    // A marker directory is enough to short-circuit before `git` ever runs;
    // an invalid URL would fail loudly if clone were attempted.
    orch.clone_repository(&dest, "not a real url", None).await.expect("idempotent no-op");
}
