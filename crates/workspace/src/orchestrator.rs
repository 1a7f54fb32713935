// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workspace orchestrator (spec.md §4.6): composes the project detector,
//! dependency installer, and dev-server supervisor behind the session
//! registry's per-key lock into the public verbs `warmProject`,
//! `startPreview`, `stopPreview`, `release`, `exec`, `cloneRepository`,
//! `listFiles`, and `getOrCreateContainer`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use drape_container::{ContainerDriver, ExecOutput};
use drape_core::{ProjectId, ProjectInfo, ProjectType, Session, SessionKey, UserId};
use drape_storage::SessionRegistry;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::detector::detect;
use crate::devserver::DevServerSupervisor;
use crate::errors::WorkspaceError;
use crate::install::{DependencyInstaller, InstallOutcome};

/// Host path inside every workspace container that the project directory is
/// bind-mounted to (spec.md §4.2).
pub const CONTAINER_PROJECT_DIR: &str = "/home/coder/project";

/// Default idle timeout applied to sessions the reaper destroys, within the
/// 15-30 minute range named by spec.md §4.6.
pub const DEFAULT_IDLE_TIMEOUT_MINUTES: i64 = 20;

/// Domains for which an auth token is injected into a clone URL.
const SUPPORTED_CODE_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];

const CLONE_TIMEOUT: Duration = Duration::from_secs(120);
const TOOL_EXEC_TIMEOUT_MS: u64 = 60_000;
const CONTAINER_HEALTH_CHECK_TIMEOUT_MS: u64 = 30_000;

/// Closed set of progress steps reported through `startPreview`'s
/// `onProgress` callback, per spec.md §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStep {
    Container,
    Clone,
    Detect,
    Install,
    Server,
    Starting,
    Ready,
}

impl ProgressStep {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStep::Container => "container",
            ProgressStep::Clone => "clone",
            ProgressStep::Detect => "detect",
            ProgressStep::Install => "install",
            ProgressStep::Server => "server",
            ProgressStep::Starting => "starting",
            ProgressStep::Ready => "ready",
        }
    }
}

/// Result of a successful `startPreview`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOutcome {
    pub preview_url: String,
    pub agent_url: String,
    pub container_id: String,
    pub project_info: ProjectInfo,
}

/// Static configuration the orchestrator needs beyond what it discovers at
/// runtime (spec.md §6's configuration table).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub projects_root: PathBuf,
    pub cache_root: PathBuf,
    pub idle_timeout: ChronoDuration,
    pub container_ready_timeout_ms: u64,
    pub public_host: String,
    pub public_port: u16,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            projects_root: PathBuf::from("/data/projects"),
            cache_root: PathBuf::from("/data/cache"),
            idle_timeout: ChronoDuration::minutes(DEFAULT_IDLE_TIMEOUT_MINUTES),
            container_ready_timeout_ms: CONTAINER_HEALTH_CHECK_TIMEOUT_MS,
            public_host: "localhost".to_string(),
            public_port: 8080,
        }
    }
}

/// Best-effort per-project file watcher handle. The orchestrator starts one
/// on `warmProject` and stops it on `release`; it does not feed back into
/// any control flow this crate owns, so a dropped/failed watcher is never
/// treated as an error (spec.md §4.6).
struct FileWatchers {
    handles: Mutex<HashMap<ProjectId, JoinHandle<()>>>,
}

impl FileWatchers {
    fn new() -> Self {
        Self { handles: Mutex::new(HashMap::new()) }
    }

    fn start(&self, project_id: &ProjectId, project_dir: PathBuf) {
        let mut handles = self.handles.lock();
        if handles.contains_key(project_id) {
            return;
        }
        let project = project_id.clone();
        let handle = tokio::spawn(async move {
            let mut last_seen: Option<std::time::SystemTime> = None;
            loop {
                tokio::time::sleep(Duration::from_secs(2)).await;
                let mtime = tokio::fs::metadata(&project_dir).await.ok().and_then(|m| m.modified().ok());
                if let (Some(prev), Some(now)) = (last_seen, mtime) {
                    if now != prev {
                        tracing::debug!(project = %project, "project directory changed");
                    }
                }
                last_seen = mtime;
            }
        });
        handles.insert(project_id.clone(), handle);
    }

    fn stop(&self, project_id: &ProjectId) {
        if let Some(handle) = self.handles.lock().remove(project_id) {
            handle.abort();
        }
    }
}

pub struct WorkspaceOrchestrator<D: ContainerDriver> {
    driver: Arc<D>,
    registry: SessionRegistry,
    installer: DependencyInstaller<D>,
    devserver: DevServerSupervisor<D>,
    watchers: FileWatchers,
    config: OrchestratorConfig,
}

impl<D: ContainerDriver + 'static> WorkspaceOrchestrator<D> {
    pub fn new(driver: Arc<D>, registry: SessionRegistry, config: OrchestratorConfig) -> Self {
        let installer = DependencyInstaller::new(driver.clone(), config.cache_root.clone());
        let devserver = DevServerSupervisor::new(driver.clone());
        Self { driver, registry, installer, devserver, watchers: FileWatchers::new(), config }
    }

    fn project_host_dir(&self, project_id: &ProjectId) -> PathBuf {
        self.config.projects_root.join(project_id.as_str())
    }

    /// Host-side root of a project's files, honoring a monorepo
    /// `subdirectory` when the session's detected [`ProjectInfo`] has one.
    /// Public so the tool dispatcher can resolve `read_file`/`write_file`/
    /// `edit_file` paths the same way `listFiles` and the installer do.
    pub fn project_root(&self, project_id: &ProjectId, project_info: Option<&ProjectInfo>) -> PathBuf {
        match project_info {
            Some(info) => self.effective_dirs(project_id, info).0,
            None => self.project_host_dir(project_id),
        }
    }

    fn effective_dirs(&self, project_id: &ProjectId, info: &ProjectInfo) -> (PathBuf, String) {
        let host_dir = self.project_host_dir(project_id);
        match &info.subdirectory {
            Some(sub) => (host_dir.join(sub), format!("{CONTAINER_PROJECT_DIR}/{sub}")),
            None => (host_dir, CONTAINER_PROJECT_DIR.to_string()),
        }
    }

    /// `getOrCreateContainer` (spec.md §4.6): reuse a healthy session's
    /// container, or destroy-and-recreate when none exists or the existing
    /// one fails a health probe.
    pub async fn get_or_create_container(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> Result<Session, WorkspaceError> {
        let key = SessionKey::new(user_id.clone(), project_id.clone());
        self.registry
            .with_lock(&key, || async {
                if let Some(mut session) = self.registry.get(&key) {
                    let healthy = self
                        .driver
                        .exec(&session.agent_url, "echo ok", CONTAINER_PROJECT_DIR, TOOL_EXEC_TIMEOUT_MS, true)
                        .await
                        .map(|out| out.exit_code == 0)
                        .unwrap_or(false);
                    if healthy {
                        session.touch(chrono::Utc::now());
                        self.registry.put(key.clone(), session.clone());
                        return Ok(session);
                    }
                    tracing::warn!(%project_id, "existing container unhealthy, recreating");
                    let _ = self.driver.destroy(&session.container_id).await;
                    self.registry.remove(&key);
                }

                let record = self.driver.create_container(project_id).await?;
                let agent_url = record.agent_url.clone().ok_or_else(|| {
                    WorkspaceError::Container(drape_container::ContainerError::CreateFailed(
                        "container created without an agent URL".to_string(),
                    ))
                })?;

                if let Err(err) =
                    self.driver.wait_for_agent(&agent_url, self.config.container_ready_timeout_ms).await
                {
                    tracing::warn!(%project_id, %err, "in-container agent did not become healthy in time");
                }

                let now = chrono::Utc::now();
                let session =
                    Session::new(user_id.clone(), project_id.clone(), record.id, agent_url, record.server_id, now);
                self.registry.put(key.clone(), session.clone());
                Ok(session)
            })
            .await
    }

    /// `warmProject` (spec.md §4.6): ensure a container exists, optionally
    /// clone a repository into it, detect the project type, and kick off a
    /// background install+start that stamps `preparedAt` on completion. The
    /// foreground call returns as soon as the container is obtained.
    pub async fn warm_project(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
        repo_url: Option<&str>,
        auth_token: Option<&str>,
    ) -> Result<Session, WorkspaceError> {
        let session = self.get_or_create_container(user_id, project_id).await?;
        let host_dir = self.project_host_dir(project_id);
        tokio::fs::create_dir_all(&host_dir).await?;

        if let Some(repo_url) = repo_url {
            if !tokio::fs::try_exists(host_dir.join("package.json")).await.unwrap_or(false) {
                self.clone_repository(&host_dir, repo_url, auth_token).await?;
            }
        }

        let project_info = detect(&host_dir).await;
        let key = SessionKey::new(user_id.clone(), project_id.clone());
        let mut stamped = session.clone();
        stamped.project_info = Some(project_info.clone());
        self.registry.put(key.clone(), stamped.clone());

        self.watchers.start(project_id, host_dir.clone());

        let (effective_host_dir, effective_container_dir) = self.effective_dirs(project_id, &project_info);
        if self
            .devserver
            .is_responding(&session.agent_url, &effective_container_dir, project_info.dev_server_port)
            .await
        {
            return Ok(stamped);
        }

        let driver = self.driver.clone();
        let installer_cache_root = self.config.cache_root.clone();
        let registry = self.registry.clone();
        let devserver_driver = driver.clone();
        let agent_url = session.agent_url.clone();
        let project_id = project_id.clone();
        let key_for_task = key.clone();
        tokio::spawn(async move {
            let installer = DependencyInstaller::new(driver, installer_cache_root);
            let install_result = installer
                .install(&project_id, &effective_host_dir, &effective_container_dir, &agent_url, &project_info)
                .await;
            if let Err(err) = install_result {
                tracing::warn!(%project_id, %err, "background install failed");
                return;
            }

            let devserver = DevServerSupervisor::new(devserver_driver);
            match devserver.start(&project_id, &agent_url, &effective_container_dir, &project_info).await {
                Ok(()) => {
                    if let Some(mut session) = registry.get(&key_for_task) {
                        session.prepared_at = Some(chrono::Utc::now());
                        registry.put(key_for_task, session);
                    }
                }
                Err(err) => tracing::warn!(%project_id, %err, "background dev-server start failed"),
            }
        });

        Ok(stamped)
    }

    /// `startPreview` (spec.md §4.6): the SSE-observable path. Takes the fast
    /// path when a session's dev server is already healthy and its project
    /// type hasn't changed; otherwise runs the full slow path.
    pub async fn start_preview(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
        mut on_progress: impl FnMut(ProgressStep, &str),
        repo_url: Option<&str>,
        auth_token: Option<&str>,
    ) -> Result<PreviewOutcome, WorkspaceError> {
        let key = SessionKey::new(user_id.clone(), project_id.clone());
        let host_dir = self.project_host_dir(project_id);

        if let Some(session) = self.registry.get(&key) {
            if let Some(prior_info) = session.project_info.clone() {
                let (_, effective_container_dir) = self.effective_dirs(project_id, &prior_info);
                if self.devserver.is_responding(&session.agent_url, &effective_container_dir, prior_info.dev_server_port).await
                {
                    on_progress(ProgressStep::Detect, "re-checking project type");
                    let current_info = detect(&host_dir).await;
                    if current_info.project_type == prior_info.project_type {
                        self.devserver
                            .check_for_errors(&session.agent_url, &effective_container_dir, prior_info.dev_server_port)
                            .await?;
                        return Ok(PreviewOutcome {
                            preview_url: self.preview_url(project_id),
                            agent_url: session.agent_url.clone(),
                            container_id: session.container_id.to_string(),
                            project_info: prior_info,
                        });
                    }
                    tracing::info!(%project_id, "project type changed, restarting dev server");
                    self.devserver
                        .stop(project_id, &session.agent_url, &effective_container_dir, prior_info.dev_server_port)
                        .await;
                }
            }
        }

        // Slow path.
        on_progress(ProgressStep::Container, "preparing workspace container");
        let session = self.get_or_create_container(user_id, project_id).await?;
        tokio::fs::create_dir_all(&host_dir).await?;

        if let Some(repo_url) = repo_url {
            if !tokio::fs::try_exists(host_dir.join(".git")).await.unwrap_or(false) {
                on_progress(ProgressStep::Clone, "cloning repository");
                self.clone_repository(&host_dir, repo_url, auth_token).await?;
            }
        }

        on_progress(ProgressStep::Detect, "detecting project type");
        let project_info = detect(&host_dir).await;
        let (effective_host_dir, effective_container_dir) = self.effective_dirs(project_id, &project_info);

        on_progress(ProgressStep::Install, "installing dependencies");
        self.installer
            .install(project_id, &effective_host_dir, &effective_container_dir, &session.agent_url, &project_info)
            .await?;

        on_progress(ProgressStep::Server, "starting dev server");
        on_progress(ProgressStep::Starting, "waiting for dev server to respond");
        self.devserver.start(project_id, &session.agent_url, &effective_container_dir, &project_info).await?;

        let mut prepared = session;
        prepared.project_info = Some(project_info.clone());
        prepared.prepared_at = Some(chrono::Utc::now());
        self.registry.put(key, prepared.clone());
        self.watchers.start(project_id, host_dir);

        on_progress(ProgressStep::Ready, "dev server ready");
        Ok(PreviewOutcome {
            preview_url: self.preview_url(project_id),
            agent_url: prepared.agent_url.clone(),
            container_id: prepared.container_id.to_string(),
            project_info,
        })
    }

    /// `stopPreview`: stop the running dev server without tearing down the
    /// container or session (unlike `release`).
    pub async fn stop_preview(&self, user_id: &UserId, project_id: &ProjectId) -> Result<(), WorkspaceError> {
        let key = SessionKey::new(user_id.clone(), project_id.clone());
        let Some(session) = self.registry.get(&key) else { return Ok(()) };
        let Some(info) = session.project_info.clone() else { return Ok(()) };
        let (_, effective_container_dir) = self.effective_dirs(project_id, &info);
        self.devserver.stop(project_id, &session.agent_url, &effective_container_dir, info.dev_server_port).await;
        Ok(())
    }

    /// `release` (spec.md §4.6): stop the watcher, stop the dev server,
    /// destroy the container, delete the session.
    pub async fn release(&self, user_id: &UserId, project_id: &ProjectId) -> Result<(), WorkspaceError> {
        let key = SessionKey::new(user_id.clone(), project_id.clone());
        self.registry
            .with_lock(&key, || async {
                self.watchers.stop(project_id);
                let Some(session) = self.registry.get(&key) else { return Ok(()) };
                if let Some(info) = session.project_info.clone() {
                    let (_, effective_container_dir) = self.effective_dirs(project_id, &info);
                    self.devserver
                        .stop(project_id, &session.agent_url, &effective_container_dir, info.dev_server_port)
                        .await;
                }
                self.driver.destroy(&session.container_id).await?;
                self.registry.remove(&key);
                Ok(())
            })
            .await
    }

    /// `exec`: obtain a container, forward the command to the container
    /// driver, return its raw output.
    pub async fn exec(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
        command: &str,
        cwd: Option<&str>,
    ) -> Result<ExecOutput, WorkspaceError> {
        let session = self.get_or_create_container(user_id, project_id).await?;
        let cwd = cwd.unwrap_or(CONTAINER_PROJECT_DIR);
        self.driver
            .exec(&session.agent_url, command, cwd, TOOL_EXEC_TIMEOUT_MS, false)
            .await
            .map_err(WorkspaceError::from)
    }

    /// `cloneRepository`: idempotent — a destination that already contains a
    /// `.git` marker is treated as already cloned. Token injection is
    /// limited to [`SUPPORTED_CODE_HOSTS`].
    pub async fn clone_repository(
        &self,
        destination: &Path,
        repo_url: &str,
        auth_token: Option<&str>,
    ) -> Result<(), WorkspaceError> {
        if tokio::fs::try_exists(destination.join(".git")).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::fs::create_dir_all(destination).await?;

        let url = match auth_token {
            Some(token) if is_supported_code_host(repo_url) => inject_token(repo_url, token),
            _ => repo_url.to_string(),
        };

        let mut command = tokio::process::Command::new("git");
        command
            .args(["clone", "--depth", "1", &url, "."])
            .current_dir(destination)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let output = tokio::time::timeout(CLONE_TIMEOUT, command.output())
            .await
            .map_err(|_| WorkspaceError::CloneFailed("clone timed out".to_string()))?
            .map_err(|e| WorkspaceError::CloneFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(WorkspaceError::CloneFailed(String::from_utf8_lossy(&output.stderr).into_owned()));
        }
        Ok(())
    }

    /// `listFiles`: a flat directory listing, or a full recursive file list
    /// when `recursive` is set. Pure host-side I/O, excluding the well-known
    /// ignored directories.
    pub async fn list_files(
        &self,
        project_id: &ProjectId,
        path: Option<&str>,
        recursive: bool,
    ) -> Result<Vec<String>, WorkspaceError> {
        let root = self.project_host_dir(project_id);
        let base = match path {
            Some(p) => root.join(p),
            None => root.clone(),
        };
        let mut results = Vec::new();
        if recursive {
            walk_recursive(&root, &base, &mut results).await?;
        } else {
            let mut entries = tokio::fs::read_dir(&base).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if IGNORED_DIRS.contains(&name.as_str()) {
                    continue;
                }
                results.push(name);
            }
            results.sort();
        }
        Ok(results)
    }

    fn preview_url(&self, project_id: &ProjectId) -> String {
        format!("http://{}:{}/preview/{}/", self.config.public_host, self.config.public_port, project_id.as_str())
    }

    /// Adoption on startup (spec.md §4.6): list every workspace-labeled
    /// container across all hosts and synthesize a `legacy`-tagged session
    /// for any that aren't already bound to one, so orphaned containers are
    /// recovered instead of leaked.
    pub async fn adopt_orphans(&self) -> Result<usize, WorkspaceError> {
        let containers = self.driver.list_containers().await?;
        let mut adopted = 0;
        for record in containers {
            if self.registry.get_by_container(&record.id).is_some() {
                continue;
            }
            let Some(agent_url) = record.agent_url.clone() else { continue };
            let key = SessionKey::new(UserId::new(drape_storage::LEGACY_USER_TAG), record.project_id.clone());
            let now = chrono::Utc::now();
            let session =
                Session::new(key.user_id.clone(), record.project_id.clone(), record.id, agent_url, record.server_id, now);
            self.registry.put(key, session);
            adopted += 1;
        }
        Ok(adopted)
    }
}

const IGNORED_DIRS: &[&str] =
    &["node_modules", ".git", ".next", "dist", "build", ".turbo", ".cache", ".venv", "__pycache__"];

fn walk_recursive<'a>(
    root: &'a Path,
    dir: &'a Path,
    out: &'a mut Vec<String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), WorkspaceError>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if IGNORED_DIRS.contains(&name.as_str()) {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                walk_recursive(root, &path, out).await?;
            } else {
                let rel = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().into_owned();
                out.push(rel);
            }
        }
        Ok(())
    })
}

fn is_supported_code_host(url: &str) -> bool {
    SUPPORTED_CODE_HOSTS.iter().any(|host| url.contains(host))
}

fn inject_token(url: &str, token: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => format!("{scheme}://{token}@{rest}"),
        None => url.to_string(),
    }
}

/// Track-independent helper kept separate so `ProjectType` stays imported
/// for callers composing progress messages in the teacher's logging style.
pub fn describe_type_change(from: ProjectType, to: ProjectType) -> String {
    format!("project type changed from {from} to {to}")
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
