// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state handed to every axum handler.

use std::sync::Arc;

use drape_agent::AgentRunner;
use drape_container::RuntimeContainerDriver;
use drape_core::{BudgetTable, SystemClock};
use drape_providers::ModelRegistry;
use drape_storage::{SessionRegistry, UsageLedger};
use drape_tools::ToolDispatcher;
use drape_workspace::WorkspaceOrchestrator;

use crate::config::Config;

pub type Driver = RuntimeContainerDriver;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<WorkspaceOrchestrator<Driver>>,
    pub dispatcher: Arc<ToolDispatcher<Driver>>,
    pub runner: Arc<AgentRunner<Driver, SystemClock>>,
    pub registry: SessionRegistry,
    pub usage_ledger: UsageLedger,
    pub model_registry: Arc<ModelRegistry>,
    pub budgets: Arc<BudgetTable>,
}
