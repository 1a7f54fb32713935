// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON request/response shapes for the container-runtime control-plane API
//! (a Docker-Engine-compatible surface): create, inspect, remove, list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use drape_core::{ContainerDefaults, ContainerId, ProjectId, ServerId};

/// One bind mount: `host_path:container_path[:ro]`.
#[derive(Debug, Clone)]
pub struct BindMount {
    pub host_path: String,
    pub container_path: String,
    pub read_only: bool,
}

impl BindMount {
    pub fn to_bind_spec(&self) -> String {
        if self.read_only {
            format!("{}:{}:ro", self.host_path, self.container_path)
        } else {
            format!("{}:{}", self.host_path, self.container_path)
        }
    }
}

/// Bind mounts prepared for every workspace container, per spec.md §4.2:
/// project dir (rw), shared pnpm store (ro), host cache root (rw), and the
/// per-project Next.js build cache (rw).
pub fn standard_mounts(
    project_host_dir: &str,
    pnpm_store_host_dir: &str,
    cache_root_host_dir: &str,
    next_build_cache_host_dir: &str,
) -> Vec<BindMount> {
    vec![
        BindMount {
            host_path: project_host_dir.to_string(),
            container_path: "/home/coder/project".to_string(),
            read_only: false,
        },
        BindMount {
            host_path: pnpm_store_host_dir.to_string(),
            container_path: "/home/coder/volumes/pnpm-store".to_string(),
            read_only: true,
        },
        BindMount {
            host_path: cache_root_host_dir.to_string(),
            container_path: "/data/cache".to_string(),
            read_only: false,
        },
        BindMount {
            host_path: next_build_cache_host_dir.to_string(),
            container_path: "/home/coder/project/.next".to_string(),
            read_only: false,
        },
    ]
}

#[derive(Debug, Serialize)]
pub struct HealthCheckSpec {
    #[serde(rename = "Test")]
    pub test: Vec<String>,
    #[serde(rename = "Interval")]
    pub interval_ns: u64,
    #[serde(rename = "Timeout")]
    pub timeout_ns: u64,
    #[serde(rename = "Retries")]
    pub retries: u32,
    #[serde(rename = "StartPeriod")]
    pub start_period_ns: u64,
}

impl HealthCheckSpec {
    /// Pings the in-container agent's `/health` every 10s with a 2s start
    /// period and 3 retries, per spec.md §4.2.
    pub fn agent_health(agent_port: u16) -> Self {
        Self {
            test: vec![
                "CMD-SHELL".to_string(),
                format!("curl -f http://localhost:{agent_port}/health || exit 1"),
            ],
            interval_ns: 10_000_000_000,
            timeout_ns: 2_000_000_000,
            retries: 3,
            start_period_ns: 2_000_000_000,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateContainerRequest {
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Labels")]
    pub labels: HashMap<String, String>,
    #[serde(rename = "ExposedPorts")]
    pub exposed_ports: HashMap<String, serde_json::Value>,
    #[serde(rename = "HostConfig")]
    pub host_config: HostConfigSpec,
    #[serde(rename = "Healthcheck")]
    pub healthcheck: HealthCheckSpec,
}

#[derive(Debug, Serialize)]
pub struct HostConfigSpec {
    #[serde(rename = "Binds")]
    pub binds: Vec<String>,
    #[serde(rename = "PortBindings")]
    pub port_bindings: HashMap<String, Vec<HashMap<String, String>>>,
    #[serde(rename = "Memory")]
    pub memory: u64,
    #[serde(rename = "NanoCpus")]
    pub nano_cpus: u64,
    #[serde(rename = "NetworkMode")]
    pub network_mode: String,
    #[serde(rename = "Init")]
    pub init: bool,
    #[serde(rename = "SecurityOpt")]
    pub security_opt: Vec<String>,
}

/// Build the body for `POST /containers/create`, composing the bind mounts,
/// labels, resource defaults, exposed ports, no-new-privileges security
/// option, init process, and agent health check described in spec.md §4.2.
pub fn create_container_request(
    project_id: &ProjectId,
    server_id: &ServerId,
    defaults: &ContainerDefaults,
    agent_port: u16,
    dev_server_port: u16,
    mounts: &[BindMount],
) -> CreateContainerRequest {
    let mut labels = HashMap::new();
    labels.insert("managed".to_string(), "true".to_string());
    labels.insert("project".to_string(), project_id.as_str().to_string());
    labels.insert("drape".to_string(), "workspace".to_string());
    labels.insert("drape.server".to_string(), server_id.as_str().to_string());

    let mut exposed_ports = HashMap::new();
    exposed_ports.insert(format!("{agent_port}/tcp"), serde_json::json!({}));
    exposed_ports.insert(format!("{dev_server_port}/tcp"), serde_json::json!({}));

    let mut port_bindings = HashMap::new();
    // Ephemeral host port for the dev server only; the agent port stays
    // internal to the network (callers reach it by container IP).
    port_bindings
        .insert(format!("{dev_server_port}/tcp"), vec![HashMap::from([("HostPort".to_string(), "0".to_string())])]);

    CreateContainerRequest {
        image: defaults.image.clone(),
        labels,
        exposed_ports,
        host_config: HostConfigSpec {
            binds: mounts.iter().map(BindMount::to_bind_spec).collect(),
            port_bindings,
            memory: defaults.memory_bytes,
            nano_cpus: (defaults.cpu_quota * 1_000_000_000.0) as u64,
            network_mode: defaults.network.clone(),
            init: true,
            security_opt: vec!["no-new-privileges:true".to_string()],
        },
        healthcheck: HealthCheckSpec::agent_health(agent_port),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateContainerResponse {
    #[serde(rename = "Id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct InspectNetworkSettings {
    #[serde(rename = "IPAddress", default)]
    pub ip_address: String,
    #[serde(rename = "Ports", default)]
    pub ports: HashMap<String, Option<Vec<InspectPortBinding>>>,
}

#[derive(Debug, Deserialize)]
pub struct InspectPortBinding {
    #[serde(rename = "HostPort")]
    pub host_port: String,
}

#[derive(Debug, Deserialize)]
pub struct InspectResponse {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "State")]
    pub state: InspectState,
    #[serde(rename = "NetworkSettings")]
    pub network_settings: InspectNetworkSettings,
}

#[derive(Debug, Deserialize)]
pub struct InspectState {
    #[serde(rename = "Running")]
    pub running: bool,
    #[serde(rename = "Status")]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ListedContainer {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Labels", default)]
    pub labels: HashMap<String, String>,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Image")]
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct CreateNetworkRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Driver")]
    pub driver: String,
    #[serde(rename = "CheckDuplicate")]
    pub check_duplicate: bool,
}

pub fn resolve_preview_host_port(inspect: &InspectResponse, dev_server_port: u16) -> Option<u16> {
    inspect
        .network_settings
        .ports
        .get(&format!("{dev_server_port}/tcp"))
        .and_then(|bindings| bindings.as_ref())
        .and_then(|bindings| bindings.first())
        .and_then(|b| b.host_port.parse().ok())
}

pub fn agent_url(inspect: &InspectResponse, agent_port: u16) -> Option<String> {
    if inspect.network_settings.ip_address.is_empty() {
        return None;
    }
    Some(format!("http://{}:{agent_port}", inspect.network_settings.ip_address))
}

pub fn container_id(inspect_or_create_id: &str) -> ContainerId {
    ContainerId::new(inspect_or_create_id)
}
