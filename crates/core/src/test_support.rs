// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::container::{ContainerRecord, ContainerState};
use crate::ids::{ContainerId, ProjectId, ServerId, UserId};
use crate::project::{ProjectInfo, ProjectType};
use crate::session::Session;
use crate::usage::AIUsageEntry;
use chrono::Utc;

crate::builder! {
    pub struct SessionBuilder => Session {
        into {
            user_id: UserId = "test-user",
            project_id: ProjectId = "test-project",
            container_id: ContainerId = "container-1",
            agent_url: String = "http://10.0.1.4:8787",
            server_id: ServerId = "host-a"
        }
        option {
            preview_port: u16 = None,
            project_info: ProjectInfo = None
        }
        computed {
            created_at: chrono::DateTime<Utc> = Utc::now(),
            last_used: chrono::DateTime<Utc> = Utc::now(),
            prepared_at: Option<chrono::DateTime<Utc>> = None
        }
    }
}

pub fn sample_project_info(project_type: ProjectType) -> ProjectInfo {
    ProjectInfo {
        project_type,
        human_description: format!("a {project_type} project"),
        install_command: Some("npm install".to_string()),
        start_command: "npm run dev".to_string(),
        dev_server_port: 3000,
        package_manager: None,
        subdirectory: None,
    }
}

pub fn sample_container_record(id: &str, project: &str, server: &str) -> ContainerRecord {
    ContainerRecord {
        id: ContainerId::new(id),
        project_id: ProjectId::new(project),
        server_id: ServerId::new(server),
        state: ContainerState::Running,
        agent_url: Some("http://10.0.1.4:8787".to_string()),
        preview_host_port: None,
        image: "drape/workspace:latest".to_string(),
        created_at: Utc::now(),
    }
}

pub fn sample_usage_entry(user_id: &str, cost_eur: f64) -> AIUsageEntry {
    AIUsageEntry {
        user_id: UserId::new(user_id),
        model: "claude-sonnet".to_string(),
        input_tokens: 1000,
        output_tokens: 200,
        cached_tokens: 0,
        cost_eur,
        timestamp: Utc::now(),
    }
}
