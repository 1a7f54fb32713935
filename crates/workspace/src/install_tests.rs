// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use drape_container::{ExecOutput, FakeContainerDriver};
use drape_core::{PackageManager, ProjectId, ProjectInfo, ProjectType};
use tempfile::TempDir;

use super::{DependencyInstaller, InstallOutcome};

fn node_project(install_command: &str) -> ProjectInfo {
    ProjectInfo {
        project_type: ProjectType::Nodejs,
        human_description: "Node.js project".to_string(),
        install_command: Some(install_command.to_string()),
        start_command: "npm run start".to_string(),
        dev_server_port: 3000,
        package_manager: Some(PackageManager::Npm),
        subdirectory: None,
    }
}

async fn write_manifest(dir: &TempDir) {
    tokio::fs::write(dir.path().join("package.json"), br#"{"dependencies":{"lodash":"^4.0.0"}}"#).await.unwrap();
}

#[tokio::test]
async fn static_and_unknown_projects_skip_install_entirely() {
    let driver = Arc::new(FakeContainerDriver::new());
    let cache_root = TempDir::new().unwrap();
    let installer = DependencyInstaller::new(driver.clone(), cache_root.path().to_path_buf());
    let host_dir = TempDir::new().unwrap();

    let mut info = node_project("npm install");
    info.project_type = ProjectType::Static;
    let outcome = installer
        .install(&ProjectId::new("p1"), host_dir.path(), "/workspace", "http://agent", &info)
        .await
        .unwrap();

    assert_eq!(outcome, InstallOutcome::Skipped);
    assert_eq!(driver.exec_call_count(), 0);
}

#[tokio::test]
async fn fresh_install_runs_and_writes_l1_marker() {
    let driver = Arc::new(FakeContainerDriver::new());
    let cache_root = TempDir::new().unwrap();
    let installer = DependencyInstaller::new(driver.clone(), cache_root.path().to_path_buf());
    let host_dir = TempDir::new().unwrap();
    write_manifest(&host_dir).await;

    let info = node_project("npm install");
    let outcome = installer
        .install(&ProjectId::new("p1"), host_dir.path(), "/workspace", "http://agent", &info)
        .await
        .unwrap();

    assert_eq!(outcome, InstallOutcome::FreshInstall);
    assert_eq!(driver.exec_call_count(), 1);
    assert!(tokio::fs::try_exists(host_dir.path().join(".package-json-hash")).await.unwrap());
}

#[tokio::test]
async fn l1_marker_match_skips_container_exec_entirely() {
    let driver = Arc::new(FakeContainerDriver::new());
    let cache_root = TempDir::new().unwrap();
    let installer = DependencyInstaller::new(driver.clone(), cache_root.path().to_path_buf());
    let host_dir = TempDir::new().unwrap();
    write_manifest(&host_dir).await;
    tokio::fs::create_dir_all(host_dir.path().join("node_modules")).await.unwrap();

    let info = node_project("npm install");
    let first = installer
        .install(&ProjectId::new("p1"), host_dir.path(), "/workspace", "http://agent", &info)
        .await
        .unwrap();
    assert_eq!(first, InstallOutcome::FreshInstall);
    let calls_after_first = driver.exec_call_count();

    let second = installer
        .install(&ProjectId::new("p1"), host_dir.path(), "/workspace", "http://agent", &info)
        .await
        .unwrap();

    assert_eq!(second, InstallOutcome::AlreadyInstalled);
    assert_eq!(driver.exec_call_count(), calls_after_first);
}

#[tokio::test]
async fn l2_archive_is_restored_when_present_and_l1_marker_is_stale() {
    let driver = Arc::new(FakeContainerDriver::new());
    let cache_root = TempDir::new().unwrap();
    let installer = DependencyInstaller::new(driver.clone(), cache_root.path().to_path_buf());
    let host_dir = TempDir::new().unwrap();
    write_manifest(&host_dir).await;

    let key = super::compute_key_for(host_dir.path(), "npm").await.unwrap();
    let archive_dir = cache_root.path().join("node-modules");
    tokio::fs::create_dir_all(&archive_dir).await.unwrap();
    tokio::fs::write(archive_dir.join(format!("{}.tar.gz", key.to_hex())), b"fake archive").await.unwrap();
    driver.script_exec("tar -xzf", ExecOutput { exit_code: 0, stdout: "RESTORED".to_string(), stderr: String::new() });

    let info = node_project("npm install");
    let outcome = installer
        .install(&ProjectId::new("p1"), host_dir.path(), "/workspace", "http://agent", &info)
        .await
        .unwrap();

    assert_eq!(outcome, InstallOutcome::RestoredFromArchive);
    assert_eq!(driver.exec_call_count(), 1);
}

#[tokio::test]
async fn frozen_lockfile_failure_retries_without_the_flag() {
    let driver = Arc::new(FakeContainerDriver::new());
    let cache_root = TempDir::new().unwrap();
    let installer = DependencyInstaller::new(driver.clone(), cache_root.path().to_path_buf());
    let host_dir = TempDir::new().unwrap();
    write_manifest(&host_dir).await;

    driver.script_exec(
        "--frozen-lockfile",
        ExecOutput { exit_code: 1, stdout: String::new(), stderr: "not compatible with existing lockfile".to_string() },
    );

    let info = node_project("npm ci --frozen-lockfile");
    let outcome = installer
        .install(&ProjectId::new("p1"), host_dir.path(), "/workspace", "http://agent", &info)
        .await
        .unwrap();

    assert_eq!(outcome, InstallOutcome::FreshInstall);
    assert_eq!(driver.exec_call_count(), 2);
    let calls = driver.exec_calls.lock();
    assert!(calls[0].contains("--frozen-lockfile"));
    assert!(!calls[1].contains("--frozen-lockfile"));
}

#[tokio::test]
async fn install_failure_surfaces_trailing_output_lines() {
    let driver = Arc::new(FakeContainerDriver::new());
    let cache_root = TempDir::new().unwrap();
    let installer = DependencyInstaller::new(driver.clone(), cache_root.path().to_path_buf());
    let host_dir = TempDir::new().unwrap();
    write_manifest(&host_dir).await;

    driver.script_exec(
        "npm install",
        ExecOutput { exit_code: 1, stdout: String::new(), stderr: "npm ERR! network timeout".to_string() },
    );

    let info = node_project("npm install");
    let err = installer
        .install(&ProjectId::new("p1"), host_dir.path(), "/workspace", "http://agent", &info)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("network timeout"));
}

#[tokio::test]
async fn concurrent_installs_for_the_same_project_run_once() {
    let driver = Arc::new(FakeContainerDriver::new());
    let cache_root = TempDir::new().unwrap();
    let installer = Arc::new(DependencyInstaller::new(driver.clone(), cache_root.path().to_path_buf()));
    let host_dir = TempDir::new().unwrap();
    write_manifest(&host_dir).await;
    let info = node_project("npm install");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let installer = installer.clone();
        let host_dir = host_dir.path().to_path_buf();
        let info = info.clone();
        handles.push(tokio::spawn(async move {
            installer.install(&ProjectId::new("shared"), &host_dir, "/workspace", "http://agent", &info).await.unwrap()
        }));
    }

    let mut outcomes = Vec::new();
    for h in handles {
        outcomes.push(h.await.unwrap());
    }

    assert_eq!(outcomes.iter().filter(|o| **o == InstallOutcome::FreshInstall).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| **o == InstallOutcome::AlreadyInstalled).count(), 3);
}

#[tokio::test]
async fn successful_fresh_install_eventually_issues_the_archive_exec() {
    let driver = Arc::new(FakeContainerDriver::new());
    let cache_root = TempDir::new().unwrap();
    let installer = DependencyInstaller::new(driver.clone(), cache_root.path().to_path_buf());
    let host_dir = TempDir::new().unwrap();
    write_manifest(&host_dir).await;

    let info = node_project("npm install");
    installer.install(&ProjectId::new("p1"), host_dir.path(), "/workspace", "http://agent", &info).await.unwrap();

    // The archive write is fire-and-forget; poll briefly for the second exec.
    for _ in 0..20 {
        if driver.exec_call_count() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(driver.exec_call_count(), 2);
    let calls = driver.exec_calls.lock();
    assert!(calls[1].starts_with("tar -czf"));
}
