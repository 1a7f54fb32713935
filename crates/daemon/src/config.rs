// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-environment configuration (spec.md §6, SPEC_FULL.md §3), read
//! once at startup into a typed [`Config`] the rest of the daemon is built
//! from. Manual env parsing, matching `oj-daemon::env` rather than a
//! config-file crate.

use std::path::PathBuf;
use std::time::Duration;

use drape_core::{BudgetTable, ContainerDefaults, Plan};
use thiserror::Error;

const DEFAULT_IDLE_TIMEOUT_MINUTES: i64 = 20;
const DEFAULT_AGENT_PORT: u16 = 8787;
const DEFAULT_HTTP_PORT: u16 = 4000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be set")]
    Missing { key: &'static str },
    #[error("{key} is not a valid {kind}: {value}")]
    Invalid { key: &'static str, kind: &'static str, value: String },
}

/// Everything the daemon reads from the process environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Container runtime hosts list: `local` or `host:port,host:port,...`.
    pub container_hosts: String,
    /// Root directory holding one subdirectory of TLS material per host id.
    pub container_tls_root: Option<PathBuf>,
    pub container_defaults: ContainerDefaults,
    /// Port the in-container agent listens on.
    pub agent_port: u16,

    pub projects_root: PathBuf,
    pub cache_root: PathBuf,
    pub published_root: PathBuf,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,

    pub idle_timeout: chrono::Duration,

    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub exa_api_key: Option<String>,

    pub budgets: BudgetTable,

    pub public_host: String,
    pub public_port: u16,
    pub bind_addr: String,
    pub http_port: u16,
}

fn env_string(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_path(key: &'static str, default: &str) -> PathBuf {
    env_string(key).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(default))
}

fn env_u16(key: &'static str, default: u16) -> Result<u16, ConfigError> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, kind: "u16", value: raw }),
    }
}

fn env_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, kind: "u64", value: raw }),
    }
}

fn env_f64(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env_string(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, kind: "f64", value: raw }),
    }
}

/// Parse `DRAPE_PLAN_BUDGETS`, a comma-separated `plan:eur` list
/// (e.g. `free:1.5,go:8,pro:25,team:80`) overriding [`BudgetTable::default`].
fn parse_budget_overrides(raw: &str) -> Result<BudgetTable, ConfigError> {
    let mut table = BudgetTable::default();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (plan_name, amount) = entry.rsplit_once(':').ok_or_else(|| ConfigError::Invalid {
            key: "DRAPE_PLAN_BUDGETS",
            kind: "plan:eur pair",
            value: entry.to_string(),
        })?;
        let plan = match plan_name {
            "free" | "starter" => Plan::Free,
            "go" => Plan::Go,
            "pro" => Plan::Pro,
            "team" => Plan::Team,
            other => {
                return Err(ConfigError::Invalid {
                    key: "DRAPE_PLAN_BUDGETS",
                    kind: "plan name",
                    value: other.to_string(),
                })
            }
        };
        let amount: f64 = amount.parse().map_err(|_| ConfigError::Invalid {
            key: "DRAPE_PLAN_BUDGETS",
            kind: "eur amount",
            value: amount.to_string(),
        })?;
        table.set(plan, amount);
    }
    Ok(table)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let container_defaults = ContainerDefaults {
            memory_bytes: env_u64("DRAPE_CONTAINER_MEMORY_BYTES", ContainerDefaults::default().memory_bytes)?,
            cpu_quota: env_f64("DRAPE_CONTAINER_CPU_QUOTA", ContainerDefaults::default().cpu_quota)?,
            image: env_string("DRAPE_CONTAINER_IMAGE").unwrap_or(ContainerDefaults::default().image),
            network: env_string("DRAPE_CONTAINER_NETWORK").unwrap_or(ContainerDefaults::default().network),
        };

        let idle_timeout_ms = env_u64("DRAPE_IDLE_TIMEOUT_MS", (DEFAULT_IDLE_TIMEOUT_MINUTES * 60_000) as u64)?;
        let budgets = match env_string("DRAPE_PLAN_BUDGETS") {
            Some(raw) => parse_budget_overrides(&raw)?,
            None => BudgetTable::default(),
        };

        Ok(Self {
            container_hosts: env_string("DRAPE_CONTAINER_HOSTS").unwrap_or_else(|| "local".to_string()),
            container_tls_root: env_string("DRAPE_CONTAINER_TLS_ROOT").map(PathBuf::from),
            container_defaults,
            agent_port: env_u16("DRAPE_AGENT_PORT", DEFAULT_AGENT_PORT)?,

            projects_root: env_path("DRAPE_PROJECTS_ROOT", "/data/projects"),
            cache_root: env_path("DRAPE_CACHE_ROOT", "/data/cache"),
            published_root: env_path("DRAPE_PUBLISHED_ROOT", "/data/published"),
            state_dir: env_path("DRAPE_STATE_DIR", "/data/state"),
            log_dir: env_path("DRAPE_LOG_DIR", "/data/logs"),

            idle_timeout: chrono::Duration::milliseconds(idle_timeout_ms as i64),

            anthropic_api_key: env_string("DRAPE_ANTHROPIC_API_KEY"),
            gemini_api_key: env_string("DRAPE_GEMINI_API_KEY"),
            openai_api_key: env_string("DRAPE_OPENAI_API_KEY"),
            exa_api_key: env_string("DRAPE_EXA_API_KEY"),

            budgets,

            public_host: env_string("DRAPE_PUBLIC_HOST").unwrap_or_else(|| "localhost".to_string()),
            public_port: env_u16("DRAPE_PUBLIC_PORT", DEFAULT_HTTP_PORT)?,
            bind_addr: env_string("DRAPE_BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            http_port: env_u16("DRAPE_HTTP_PORT", DEFAULT_HTTP_PORT)?,
        })
    }

    pub fn container_ready_timeout_ms(&self) -> u64 {
        30_000
    }

    pub fn registry_path(&self) -> PathBuf {
        self.state_dir.join("registry.json")
    }

    pub fn usage_ledger_path(&self) -> PathBuf {
        self.state_dir.join("usage.jsonl")
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(5)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
