// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency installer (spec.md §4.4): the three-level install cache behind
//! a per-project single-flight lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use drape_container::ContainerDriver;
use drape_core::{ProjectId, ProjectInfo};
use drape_storage::{l2_archive_exists, l2_archive_path, read_l1_marker, write_l1_marker, InstallCacheKey};

use crate::errors::WorkspaceError;
use crate::locks::SingleFlight;

const INSTALL_TIMEOUT_MS: u64 = 300_000;

/// Which cache level satisfied (or performed) an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Project type skips install entirely (`static`/`unknown`).
    Skipped,
    /// L1 marker matched an existing installed tree; zero container execs.
    AlreadyInstalled,
    /// L2 archive existed and was extracted.
    RestoredFromArchive,
    /// L3 fresh install ran.
    FreshInstall,
}

pub struct DependencyInstaller<D: ContainerDriver> {
    driver: Arc<D>,
    single_flight: SingleFlight,
    cache_root: PathBuf,
}

impl<D: ContainerDriver + 'static> DependencyInstaller<D> {
    pub fn new(driver: Arc<D>, cache_root: PathBuf) -> Self {
        Self { driver, single_flight: SingleFlight::new(), cache_root }
    }

    pub async fn install(
        &self,
        project_id: &ProjectId,
        effective_host_dir: &Path,
        effective_container_dir: &str,
        agent_url: &str,
        project_info: &ProjectInfo,
    ) -> Result<InstallOutcome, WorkspaceError> {
        if project_info.project_type.skips_install_and_start() {
            return Ok(InstallOutcome::Skipped);
        }
        let Some(install_command) = project_info.install_command.clone() else {
            return Ok(InstallOutcome::Skipped);
        };

        let driver = self.driver.clone();
        let cache_root = self.cache_root.clone();
        let effective_host_dir = effective_host_dir.to_path_buf();
        let effective_container_dir = effective_container_dir.to_string();
        let agent_url = agent_url.to_string();
        let package_manager = project_info.package_manager;

        self.single_flight
            .run(project_id, move || async move {
                install_locked(
                    driver,
                    &cache_root,
                    &effective_host_dir,
                    &effective_container_dir,
                    &agent_url,
                    &install_command,
                    package_manager.map(|pm| pm.to_string()).unwrap_or_default(),
                )
                .await
            })
            .await
    }
}

async fn install_locked<D: ContainerDriver + 'static>(
    driver: Arc<D>,
    cache_root: &Path,
    effective_host_dir: &Path,
    effective_container_dir: &str,
    agent_url: &str,
    install_command: &str,
    package_manager: String,
) -> Result<InstallOutcome, WorkspaceError> {
    let key = compute_cache_key(effective_host_dir, &package_manager).await;

    // L1: session-local marker.
    if let Some(key) = key {
        if read_l1_marker(effective_host_dir).await.as_deref() == Some(key.to_hex().as_str())
            && tokio::fs::try_exists(effective_host_dir.join("node_modules")).await.unwrap_or(false)
        {
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        // L2: on-host archive.
        if l2_archive_exists(cache_root, key).await {
            let archive = l2_archive_path(cache_root, key);
            let extract_cmd = format!(
                "tar -xzf {} -C . 2>&1 && echo RESTORED || echo MISS",
                archive.display()
            );
            let out = driver.exec(agent_url, &extract_cmd, effective_container_dir, INSTALL_TIMEOUT_MS, false).await?;
            if out.stdout.contains("RESTORED") {
                write_l1_marker(effective_host_dir, key).await.ok();
                return Ok(InstallOutcome::RestoredFromArchive);
            }
            tracing::info!(project_dir = %effective_host_dir.display(), "L2 cache miss, falling through to fresh install");
        }
    }

    // L3: fresh install, retrying once without --frozen-lockfile on lockfile
    // incompatibility.
    let out = driver.exec(agent_url, install_command, effective_container_dir, INSTALL_TIMEOUT_MS, false).await?;
    let out = if out.exit_code != 0
        && install_command.contains("--frozen-lockfile")
        && (out.stdout.contains("LOCKFILE_BREAKING_CHANGE")
            || out.stderr.contains("LOCKFILE_BREAKING_CHANGE")
            || out.stdout.contains("not compatible")
            || out.stderr.contains("not compatible"))
    {
        let retried_command = install_command.replace("--frozen-lockfile", "");
        driver.exec(agent_url, retried_command.trim(), effective_container_dir, INSTALL_TIMEOUT_MS, false).await?
    } else {
        out
    };

    if out.exit_code != 0 {
        let last_lines = last_non_empty_lines(&format!("{}\n{}", out.stdout, out.stderr), 10);
        return Err(WorkspaceError::InstallFailed(last_lines.join("\n")));
    }

    if let Some(key) = key {
        write_l1_marker(effective_host_dir, key).await.ok();
        spawn_l2_archive(driver, cache_root.to_path_buf(), key, effective_container_dir.to_string(), agent_url.to_string());
    }

    Ok(InstallOutcome::FreshInstall)
}

/// Fire-and-forget: archive the installed tree for future installs. Failures
/// are logged, never surfaced.
fn spawn_l2_archive<D: ContainerDriver + 'static>(
    driver: Arc<D>,
    cache_root: PathBuf,
    key: InstallCacheKey,
    effective_container_dir: String,
    agent_url: String,
) {
    tokio::spawn(async move {
        let cmd = archive_command(&cache_root, key, &effective_container_dir).await;
        match driver.exec(&agent_url, &cmd, &effective_container_dir, INSTALL_TIMEOUT_MS, false).await {
            Ok(out) if out.exit_code == 0 => {
                tracing::debug!(key = %key.to_hex(), "L2 archive written");
            }
            Ok(out) => {
                tracing::warn!(key = %key.to_hex(), exit_code = out.exit_code, "L2 archive command failed");
            }
            Err(err) => {
                tracing::warn!(key = %key.to_hex(), error = %err, "L2 archive exec failed");
            }
        }
    });
}

async fn compute_cache_key(effective_host_dir: &Path, package_manager: &str) -> Option<InstallCacheKey> {
    let manifest = tokio::fs::read(effective_host_dir.join("package.json")).await.ok()?;
    let lockfile = first_existing_lockfile(effective_host_dir).await.unwrap_or_default();
    Some(InstallCacheKey::compute(&manifest, &lockfile, package_manager))
}

async fn first_existing_lockfile(dir: &Path) -> Option<Vec<u8>> {
    for name in ["pnpm-lock.yaml", "yarn.lock", "package-lock.json"] {
        if let Ok(bytes) = tokio::fs::read(dir.join(name)).await {
            return Some(bytes);
        }
    }
    None
}

fn last_non_empty_lines(text: &str, n: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].iter().map(|s| s.to_string()).collect()
}

async fn archive_command(cache_root: &Path, key: InstallCacheKey, effective_container_dir: &str) -> String {
    let archive = l2_archive_path(cache_root, key);
    if let Some(parent) = archive.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    format!("tar -czf {} -C {} .", archive.display(), effective_container_dir)
}

pub async fn compute_key_for(effective_host_dir: &Path, package_manager: &str) -> Option<InstallCacheKey> {
    compute_cache_key(effective_host_dir, package_manager).await
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
