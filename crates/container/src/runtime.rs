// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Production `ContainerDriver`: talks to the control plane over
//! [`transport`] and to the in-container agent over plain HTTP (`reqwest`).

use std::time::Duration;

use async_trait::async_trait;
use drape_core::{ContainerDefaults, ContainerId, ContainerRecord, ContainerState, ProjectId, ServerId};
use serde_json::json;

use crate::config::{HostEndpoint, RuntimeConfig};
use crate::driver::{exec_backoff, is_retriable_status, is_retriable_transport_message, ContainerDriver, ExecOutput, EXEC_MAX_ATTEMPTS};
use crate::engine_api::{
    self, CreateContainerResponse, CreateNetworkRequest, InspectResponse, ListedContainer,
};
use crate::errors::ContainerError;
use crate::transport;

pub struct RuntimeContainerDriver {
    config: RuntimeConfig,
    http: reqwest::Client,
}

impl RuntimeContainerDriver {
    pub fn new(config: RuntimeConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, http }
    }

    fn defaults(&self) -> &ContainerDefaults {
        &self.config.defaults
    }

    fn host_for(&self, server_id: &ServerId) -> Option<&HostEndpoint> {
        self.config.hosts.iter().find(|h| h.id() == server_id.as_str())
    }

    async fn list_containers_on(&self, host: &HostEndpoint) -> Result<Vec<ListedContainer>, ContainerError> {
        let filters = serde_json::to_string(&json!({"label": ["drape=workspace"]}))
            .unwrap_or_else(|_| "{}".to_string());
        let path = format!("/containers/json?all=true&filters={}", urlencode(&filters));
        let resp = transport::request(host, "GET", &path, None).await?;
        if resp.status >= 400 {
            return Err(ContainerError::Transport(format!("list containers failed: HTTP {}", resp.status)));
        }
        serde_json::from_str(&resp.body).map_err(ContainerError::from)
    }
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            _ => format!("%{:02X}", c as u32),
        })
        .collect()
}

#[async_trait]
impl ContainerDriver for RuntimeContainerDriver {
    async fn select_host(&self) -> Result<ServerId, ContainerError> {
        if self.config.hosts.is_empty() {
            return Err(ContainerError::NoHosts);
        }
        let mut best: Option<(usize, &HostEndpoint)> = None;
        for host in &self.config.hosts {
            let score = match self.list_containers_on(host).await {
                Ok(containers) => containers.len(),
                Err(_) => usize::MAX,
            };
            match best {
                Some((best_score, _)) if best_score <= score => {}
                _ => best = Some((score, host)),
            }
        }
        let (_, host) =
            best.ok_or(ContainerError::NoHosts)?;
        Ok(ServerId::new(host.id()))
    }

    async fn create_container(&self, project_id: &ProjectId) -> Result<ContainerRecord, ContainerError> {
        let server_id = self.select_host().await?;
        let host = self.host_for(&server_id).ok_or(ContainerError::NoHosts)?;

        let project_dir = format!("/data/projects/{}", project_id.as_str());
        let cache_root = "/data/cache".to_string();
        let mounts = engine_api::standard_mounts(
            &project_dir,
            "/data/volumes/pnpm-store",
            &cache_root,
            &format!("{cache_root}/next-build/{}", project_id.as_str()),
        );

        let body = engine_api::create_container_request(
            project_id,
            &server_id,
            self.defaults(),
            self.config.agent_port,
            drape_core::DEFAULT_DEV_SERVER_PORT,
            &mounts,
        );
        let body_json = serde_json::to_string(&body)?;

        let created = transport::request(host, "POST", "/containers/create", Some(&body_json)).await?;
        if created.status >= 400 {
            return Err(ContainerError::CreateFailed(format!("HTTP {}: {}", created.status, created.body)));
        }
        let created: CreateContainerResponse = serde_json::from_str(&created.body)?;

        let start = transport::request(host, "POST", &format!("/containers/{}/start", created.id), None).await?;
        if start.status >= 400 && start.status != 304 {
            return Err(ContainerError::CreateFailed(format!("start failed: HTTP {}", start.status)));
        }

        let inspect = self.inspect(host, &created.id).await?;
        let agent_url = engine_api::agent_url(&inspect, self.config.agent_port);
        let preview_host_port = engine_api::resolve_preview_host_port(&inspect, drape_core::DEFAULT_DEV_SERVER_PORT);

        Ok(ContainerRecord {
            id: engine_api::container_id(&created.id),
            project_id: project_id.clone(),
            server_id,
            state: ContainerState::from_inspect(inspect.state.running, &inspect.state.status),
            agent_url,
            preview_host_port,
            image: self.defaults().image.clone(),
            created_at: chrono::Utc::now(),
        })
    }

    async fn destroy(&self, id: &ContainerId) -> Result<(), ContainerError> {
        for host in &self.config.hosts {
            let resp =
                transport::request(host, "DELETE", &format!("/containers/{}?force=true", id.as_str()), None)
                    .await?;
            if resp.status == 404 {
                return Ok(());
            }
            if resp.status < 400 {
                return Ok(());
            }
        }
        // Not found on any host is still idempotent success per spec.md §4.2.
        Ok(())
    }

    async fn exec(
        &self,
        agent_url: &str,
        command: &str,
        cwd: &str,
        timeout_ms: u64,
        silent: bool,
    ) -> Result<ExecOutput, ContainerError> {
        if !silent {
            tracing::debug!(agent_url, command, cwd, "executing command in container");
        }
        let body = json!({"command": command, "cwd": cwd});
        let mut last_err = None;

        for attempt in 1..=EXEC_MAX_ATTEMPTS {
            let result = self
                .http
                .post(format!("{agent_url}/exec"))
                .timeout(Duration::from_millis(timeout_ms))
                .json(&body)
                .send()
                .await;

            match result {
                Ok(resp) if is_retriable_status(resp.status().as_u16()) => {
                    last_err = Some(ContainerError::Transient(format!("HTTP {}", resp.status())));
                }
                Ok(resp) if resp.status().is_success() => {
                    let parsed: serde_json::Value = resp.json().await.map_err(|e| {
                        ContainerError::Transport(format!("malformed /exec response: {e}"))
                    })?;
                    return Ok(ExecOutput {
                        exit_code: parsed.get("exitCode").and_then(|v| v.as_i64()).unwrap_or(-1) as i32,
                        stdout: parsed.get("stdout").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        stderr: parsed.get("stderr").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    });
                }
                Ok(resp) => {
                    return Err(ContainerError::Transport(format!("exec failed: HTTP {}", resp.status())));
                }
                Err(e) if e.is_timeout() => {
                    last_err = Some(ContainerError::Transient(format!("exec timed out: {e}")));
                }
                Err(e) if is_retriable_transport_message(&e.to_string()) => {
                    last_err = Some(ContainerError::Transient(e.to_string()));
                }
                Err(e) => return Err(ContainerError::Transport(e.to_string())),
            }

            if attempt < EXEC_MAX_ATTEMPTS {
                tokio::time::sleep(exec_backoff(attempt)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| ContainerError::Transient("exec exhausted retries".into())))
    }

    async fn wait_for_agent(&self, agent_url: &str, timeout_ms: u64) -> Result<(), ContainerError> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Ok(resp) = self.http.get(format!("{agent_url}/health")).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ContainerError::AgentTimeout(agent_url.to_string()));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, ContainerError> {
        let mut all = Vec::new();
        for host in &self.config.hosts {
            let listed = self.list_containers_on(host).await?;
            for item in listed {
                let project = item
                    .labels
                    .get("project")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());
                let inspect = self.inspect(host, &item.id).await.ok();
                let (agent_url, preview_host_port) = match &inspect {
                    Some(i) => (
                        engine_api::agent_url(i, self.config.agent_port),
                        engine_api::resolve_preview_host_port(i, drape_core::DEFAULT_DEV_SERVER_PORT),
                    ),
                    None => (None, None),
                };
                all.push(ContainerRecord {
                    id: engine_api::container_id(&item.id),
                    project_id: ProjectId::new(project),
                    server_id: ServerId::new(host.id()),
                    state: match item.state.as_str() {
                        "running" => ContainerState::Running,
                        "created" => ContainerState::Creating,
                        _ => ContainerState::Stopped,
                    },
                    agent_url,
                    preview_host_port,
                    image: item.image,
                    created_at: chrono::Utc::now(),
                });
            }
        }
        Ok(all)
    }

    async fn initialize_network(&self) -> Result<(), ContainerError> {
        for host in &self.config.hosts {
            let body = CreateNetworkRequest {
                name: self.defaults().network.clone(),
                driver: "bridge".to_string(),
                check_duplicate: true,
            };
            let body_json = serde_json::to_string(&body)?;
            let resp = transport::request(host, "POST", "/networks/create", Some(&body_json)).await?;
            // 409 means the network already exists — idempotent.
            if resp.status >= 400 && resp.status != 409 {
                tracing::warn!(host = host.id(), status = resp.status, "failed to create network");
            }
        }
        Ok(())
    }
}

impl RuntimeContainerDriver {
    async fn inspect(&self, host: &HostEndpoint, id: &str) -> Result<InspectResponse, ContainerError> {
        let resp = transport::request(host, "GET", &format!("/containers/{id}/json"), None).await?;
        if resp.status == 404 {
            return Err(ContainerError::NotFound(id.to_string()));
        }
        if resp.status >= 400 {
            return Err(ContainerError::Transport(format!("inspect failed: HTTP {}", resp.status)));
        }
        serde_json::from_str(&resp.body).map_err(ContainerError::from)
    }
}
