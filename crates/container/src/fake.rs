// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `ContainerDriver` double for tests in dependent crates, mirroring
//! the teacher's `test-support`-gated `FakeAdapter`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use drape_core::{ContainerId, ContainerRecord, ContainerState, ProjectId, ServerId};
use parking_lot::Mutex;

use crate::driver::{ContainerDriver, ExecOutput};
use crate::errors::ContainerError;

/// Scripted response for one `exec` call, keyed by a substring match on the
/// command so tests can target specific commands.
#[derive(Debug, Clone)]
pub struct ScriptedExec {
    pub command_contains: String,
    pub output: ExecOutput,
}

pub struct FakeContainerDriver {
    counter: AtomicU64,
    containers: Mutex<HashMap<String, ContainerRecord>>,
    scripts: Mutex<Vec<ScriptedExec>>,
    pub exec_calls: Mutex<Vec<String>>,
    fail_next_create: Mutex<bool>,
    fail_agent_wait: Mutex<bool>,
}

impl Default for FakeContainerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeContainerDriver {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
            containers: Mutex::new(HashMap::new()),
            scripts: Mutex::new(Vec::new()),
            exec_calls: Mutex::new(Vec::new()),
            fail_next_create: Mutex::new(false),
            fail_agent_wait: Mutex::new(false),
        }
    }

    /// Register a scripted response for any `exec` call whose command
    /// contains `command_contains`. Default (unscripted) response is
    /// `exit_code: 0` with empty output.
    pub fn script_exec(&self, command_contains: impl Into<String>, output: ExecOutput) {
        self.scripts.lock().push(ScriptedExec { command_contains: command_contains.into(), output });
    }

    pub fn fail_next_create(&self) {
        *self.fail_next_create.lock() = true;
    }

    pub fn fail_agent_wait(&self) {
        *self.fail_agent_wait.lock() = true;
    }

    pub fn exec_call_count(&self) -> usize {
        self.exec_calls.lock().len()
    }

    pub fn created_container_count(&self) -> usize {
        self.containers.lock().len()
    }
}

#[async_trait]
impl ContainerDriver for FakeContainerDriver {
    async fn select_host(&self) -> Result<ServerId, ContainerError> {
        Ok(ServerId::new("fake-host"))
    }

    async fn create_container(&self, project_id: &ProjectId) -> Result<ContainerRecord, ContainerError> {
        if std::mem::take(&mut *self.fail_next_create.lock()) {
            return Err(ContainerError::CreateFailed("scripted failure".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = ContainerId::new(format!("fake-container-{n}"));
        let record = ContainerRecord {
            id: id.clone(),
            project_id: project_id.clone(),
            server_id: ServerId::new("fake-host"),
            state: ContainerState::Running,
            agent_url: Some(format!("http://10.0.{n}.1:8787")),
            preview_host_port: Some(30000 + n as u16),
            image: "drape/workspace:latest".to_string(),
            created_at: chrono::Utc::now(),
        };
        self.containers.lock().insert(id.as_str().to_string(), record.clone());
        Ok(record)
    }

    async fn destroy(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.containers.lock().remove(id.as_str());
        Ok(())
    }

    async fn exec(
        &self,
        _agent_url: &str,
        command: &str,
        _cwd: &str,
        _timeout_ms: u64,
        _silent: bool,
    ) -> Result<ExecOutput, ContainerError> {
        self.exec_calls.lock().push(command.to_string());
        let scripts = self.scripts.lock();
        if let Some(script) = scripts.iter().find(|s| command.contains(&s.command_contains)) {
            return Ok(script.output.clone());
        }
        Ok(ExecOutput { exit_code: 0, stdout: String::new(), stderr: String::new() })
    }

    async fn wait_for_agent(&self, agent_url: &str, _timeout_ms: u64) -> Result<(), ContainerError> {
        if *self.fail_agent_wait.lock() {
            return Err(ContainerError::AgentTimeout(agent_url.to_string()));
        }
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, ContainerError> {
        Ok(self.containers.lock().values().cloned().collect())
    }

    async fn initialize_network(&self) -> Result<(), ContainerError> {
        Ok(())
    }
}
