// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! drape-daemon: the backend process (spec.md §4.10, §6) — HTTP/SSE surface,
//! container adoption on startup, and the idle-reaper background task.

mod config;
mod errors;
mod routes;
mod sse;
mod state;

use std::sync::Arc;

use drape_agent::{AgentRunner, ProviderSet};
use drape_container::{ContainerDriver, RuntimeConfig, RuntimeContainerDriver};
use drape_core::SystemClock;
use drape_providers::{AnthropicProvider, ChatProvider, GeminiProvider, ModelRegistry, OpenAiProvider, ProviderKind};
use drape_storage::{SessionRegistry, UsageLedger};
use drape_tools::{ExaWebSearchProvider, ToolDispatcher};
use drape_workspace::{IdleReaper, OrchestratorConfig, WorkspaceOrchestrator};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::state::AppState;

fn init_tracing(log_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    let _ = std::fs::create_dir_all(log_dir);
    let file_appender = tracing_appender::rolling::daily(log_dir, "drape-daemon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    guard
}

fn provider_set(config: &Config) -> ProviderSet {
    let mut providers = ProviderSet::new();
    providers.insert_if(
        ProviderKind::Anthropic,
        config
            .anthropic_api_key
            .clone()
            .map(|key| Arc::new(AnthropicProvider::new(key)) as Arc<dyn ChatProvider>),
    );
    providers.insert_if(
        ProviderKind::Gemini,
        config.gemini_api_key.clone().map(|key| Arc::new(GeminiProvider::new(key)) as Arc<dyn ChatProvider>),
    );
    providers.insert_if(
        ProviderKind::OpenAi,
        config.openai_api_key.clone().map(|key| Arc::new(OpenAiProvider::new(key)) as Arc<dyn ChatProvider>),
    );
    providers
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _log_guard = init_tracing(&config.log_dir);

    tracing::info!("starting drape-daemon");

    let runtime_config = RuntimeConfig::parse(
        &config.container_hosts,
        config.container_tls_root.as_deref(),
        config.container_defaults.clone(),
        config.agent_port,
    )
    .await?;
    let driver = Arc::new(RuntimeContainerDriver::new(runtime_config));
    if let Err(err) = driver.initialize_network().await {
        tracing::warn!(%err, "failed to initialize container network, continuing anyway");
    }

    let registry = SessionRegistry::load(config.registry_path()).await;
    let usage_ledger = UsageLedger::load(config.usage_ledger_path()).await;

    let orchestrator_config = OrchestratorConfig {
        projects_root: config.projects_root.clone(),
        cache_root: config.cache_root.clone(),
        idle_timeout: config.idle_timeout,
        container_ready_timeout_ms: config.container_ready_timeout_ms(),
        public_host: config.public_host.clone(),
        public_port: config.public_port,
    };
    let orchestrator = Arc::new(WorkspaceOrchestrator::new(driver.clone(), registry.clone(), orchestrator_config));

    match orchestrator.adopt_orphans().await {
        Ok(adopted) if adopted > 0 => tracing::info!(adopted, "adopted orphaned containers on startup"),
        Ok(_) => {}
        Err(err) => tracing::warn!(%err, "container adoption failed on startup"),
    }

    let web_search: Arc<dyn drape_tools::WebSearchProvider> = Arc::new(match &config.exa_api_key {
        Some(key) => ExaWebSearchProvider::new(key.clone()),
        None => ExaWebSearchProvider::new(""),
    });
    let dispatcher = Arc::new(ToolDispatcher::new(orchestrator.clone(), web_search));

    let model_registry = Arc::new(ModelRegistry::with_defaults());
    let providers = provider_set(&config);
    let budgets = Arc::new(config.budgets.clone());

    let runner = Arc::new(AgentRunner::new(
        providers,
        model_registry.clone(),
        dispatcher.clone(),
        orchestrator.clone(),
        usage_ledger.clone(),
        budgets.clone(),
        SystemClock,
    ));

    let reaper = IdleReaper::new(driver.clone(), registry.clone(), SystemClock, config.idle_timeout);
    tokio::spawn(reaper.run());

    let app_state = AppState {
        config: Arc::new(config.clone()),
        orchestrator,
        dispatcher,
        runner,
        registry,
        usage_ledger,
        model_registry,
        budgets,
    };

    let app = routes::router(app_state);
    let listener = tokio::net::TcpListener::bind((config.bind_addr.as_str(), config.http_port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
