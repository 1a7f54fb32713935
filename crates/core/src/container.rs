// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container runtime configuration and observable container state.

use crate::ids::{ContainerId, ProjectId, ServerId};
use crate::simple_display;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource defaults applied to every workspace container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDefaults {
    pub memory_bytes: u64,
    pub cpu_quota: f64,
    pub image: String,
    pub network: String,
}

impl Default for ContainerDefaults {
    fn default() -> Self {
        Self {
            memory_bytes: 2 * 1024 * 1024 * 1024,
            cpu_quota: 1.0,
            image: "drape/workspace:latest".to_string(),
            network: "drape-workspaces".to_string(),
        }
    }
}

/// Lifecycle state of a container as observed through the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    Creating,
    Running,
    Stopping,
    Stopped,
    Error,
}

simple_display! {
    ContainerState {
        Creating => "creating",
        Running => "running",
        Stopping => "stopping",
        Stopped => "stopped",
        Error => "error",
    }
}

/// Observable record of a workspace container, as returned by the driver.
///
/// This is the driver's view, not the registry's: `Session` references a
/// `ContainerRecord` by id only, never the other way around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: ContainerId,
    pub project_id: ProjectId,
    pub server_id: ServerId,
    pub state: ContainerState,
    /// `http://<container-ip>:<agentPort>`, valid once the container is running.
    pub agent_url: Option<String>,
    /// Ephemeral host port mapped to the dev server's container port, if started.
    pub preview_host_port: Option<u16>,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

/// Labels stamped on every workspace container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerLabels {
    pub managed: bool,
    pub project: ProjectId,
    pub drape: &'static str,
    #[serde(rename = "drape.server")]
    pub drape_server: ServerId,
}

impl ContainerLabels {
    pub fn new(project: ProjectId, server: ServerId) -> Self {
        Self { managed: true, project, drape: "workspace", drape_server: server }
    }
}
