// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dev-server supervisor (spec.md §4.5): start/stop the framework dev server
//! inside a container, wait for it to respond, and classify the failure when
//! it doesn't.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use drape_container::ContainerDriver;
use drape_core::{ProjectId, ProjectInfo};
use regex::Regex;
use tokio::time::Instant;

use crate::errors::{CrashReason, WorkspaceError};
use crate::locks::SingleFlight;

const START_TIMEOUT: Duration = Duration::from_secs(60);
const PROBE_INTERVAL: Duration = Duration::from_secs(2);
const CRASH_CHECK_AFTER: Duration = Duration::from_secs(8);
const EXEC_TIMEOUT_MS: u64 = 10_000;

pub struct DevServerSupervisor<D: ContainerDriver> {
    driver: Arc<D>,
    http: reqwest::Client,
    single_flight: SingleFlight,
}

impl<D: ContainerDriver + 'static> DevServerSupervisor<D> {
    pub fn new(driver: Arc<D>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { driver, http, single_flight: SingleFlight::new() }
    }

    /// Start the dev server, guarded by a per-project single-flight lock
    /// identical in contract to the installer's.
    pub async fn start(
        &self,
        project_id: &ProjectId,
        agent_url: &str,
        cwd: &str,
        project_info: &ProjectInfo,
    ) -> Result<(), WorkspaceError> {
        let driver = self.driver.clone();
        let http = self.http.clone();
        let agent_url = agent_url.to_string();
        let cwd = cwd.to_string();
        let start_command = project_info.start_command.clone();
        let port = project_info.dev_server_port;

        self.single_flight
            .run(project_id, move || async move { start_locked(driver.as_ref(), &http, &agent_url, &cwd, &start_command, port).await })
            .await
    }

    /// Best-effort kill of the dev server process and its port, then clears
    /// any pending start lock for the project.
    pub async fn stop(&self, project_id: &ProjectId, agent_url: &str, cwd: &str, port: u16) {
        let kill_cmd = format!("pkill -f node 2>/dev/null; fuser -k {port}/tcp 2>/dev/null; true");
        if let Err(err) = self.driver.exec(agent_url, &kill_cmd, cwd, EXEC_TIMEOUT_MS, true).await {
            tracing::debug!(%err, "dev server stop exec failed (best-effort)");
        }
        self.single_flight.clear(project_id);
    }

    pub async fn is_responding(&self, agent_url: &str, cwd: &str, port: u16) -> bool {
        probe_status(self.driver.as_ref(), agent_url, cwd, port).await.map(|s| s >= 200).unwrap_or(false)
    }

    /// Re-run the response error scan against an already-responding dev
    /// server, used by `startPreview`'s fast path (spec.md §4.6) to catch a
    /// server that now answers with an application error.
    pub async fn check_for_errors(&self, agent_url: &str, cwd: &str, port: u16) -> Result<(), WorkspaceError> {
        check_response_for_errors(self.driver.as_ref(), agent_url, cwd, port).await
    }
}

async fn start_locked<D: ContainerDriver>(
    driver: &D,
    http: &reqwest::Client,
    agent_url: &str,
    cwd: &str,
    start_command: &str,
    port: u16,
) -> Result<(), WorkspaceError> {
    if probe_status(driver, agent_url, cwd, port).await.map(|s| s >= 200).unwrap_or(false) {
        return Ok(());
    }

    let body = serde_json::json!({"command": start_command, "cwd": cwd});
    if let Err(err) = http.post(format!("{agent_url}/setup")).json(&body).send().await {
        tracing::warn!(%err, "failed to post start command to in-container agent");
    }

    wait_for_ready(driver, agent_url, cwd, port).await
}

async fn wait_for_ready<D: ContainerDriver>(
    driver: &D,
    agent_url: &str,
    cwd: &str,
    port: u16,
) -> Result<(), WorkspaceError> {
    let started = Instant::now();
    loop {
        if let Some(status) = probe_status(driver, agent_url, cwd, port).await {
            if status >= 200 {
                return check_response_for_errors(driver, agent_url, cwd, port).await;
            }
        }

        if started.elapsed() >= CRASH_CHECK_AFTER {
            if let Some(reason) = detect_crash(driver, agent_url, cwd).await {
                return Err(WorkspaceError::DevServerCrashed(reason));
            }
        }

        if started.elapsed() >= START_TIMEOUT {
            return Err(WorkspaceError::DevServerTimeout);
        }
        tokio::time::sleep(PROBE_INTERVAL).await;
    }
}

async fn probe_status<D: ContainerDriver>(driver: &D, agent_url: &str, cwd: &str, port: u16) -> Option<u16> {
    let cmd = format!("curl -s -o /dev/null -w '%{{http_code}}' http://localhost:{port}/ 2>/dev/null || echo 000");
    let out = driver.exec(agent_url, &cmd, cwd, 5_000, true).await.ok()?;
    out.stdout.trim().parse::<u16>().ok().filter(|&code| code > 0)
}

async fn check_response_for_errors<D: ContainerDriver>(
    driver: &D,
    agent_url: &str,
    cwd: &str,
    port: u16,
) -> Result<(), WorkspaceError> {
    let cmd = format!("curl -s -w '\\n__STATUS__%{{http_code}}' http://localhost:{port}/ 2>/dev/null");
    let out = driver.exec(agent_url, &cmd, cwd, EXEC_TIMEOUT_MS, true).await?;
    let (body, status) = split_status(&out.stdout);
    if status < 500 {
        return Ok(());
    }
    match classify_error(&body) {
        Some(reason) => Err(WorkspaceError::DevServerAppError(reason)),
        None => Ok(()),
    }
}

async fn detect_crash<D: ContainerDriver>(driver: &D, agent_url: &str, cwd: &str) -> Option<CrashReason> {
    let out = driver.exec(agent_url, "tail -n 200 server.log 2>/dev/null || true", cwd, 5_000, true).await.ok()?;
    let log = out.stdout;
    let exit_count = EXIT_CODE
        .captures_iter(&log)
        .filter(|c| c[1].parse::<i32>().map(|n| n >= 1).unwrap_or(false))
        .count();
    if exit_count < 2 {
        return None;
    }
    classify_error(&log).or_else(|| {
        let code = EXIT_CODE.captures_iter(&log).last().and_then(|c| c[1].parse().ok()).unwrap_or(1);
        Some(CrashReason::GenericExit { code, last_lines: last_non_stack_lines(&log, 3) })
    })
}

fn split_status(output: &str) -> (String, u16) {
    match output.rsplit_once("__STATUS__") {
        Some((body, code)) => (body.to_string(), code.trim().parse().unwrap_or(0)),
        None => (output.to_string(), 0),
    }
}

static MISSING_ENV_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)Invalid env .* provided",
        r"(?i)Invalid environment variables",
        r"(?i)missing or invalid.*variables",
        r"(?i)Environment variable[s]? .* (?:is |are )?(?:not set|missing|required|undefined)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("env-var crash pattern is valid"))
    .collect()
});

static ENV_VAR_LINE_FORMS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?m)^\s*-\s*([A-Z][A-Z0-9_]*)\s*:\s*(?:Required|invalid|missing)", r"(?m)^\s*([A-Z][A-Z0-9_]*)\s*:\s*\[\s*'Required'\s*\]"]
        .iter()
        .map(|p| Regex::new(p).expect("env-var line pattern is valid"))
        .collect()
});

static UPPER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][A-Z0-9]*(?:_[A-Z0-9]+)+\b").expect("uppercase token pattern is valid"));

static MODULE_NOT_FOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Cannot find module '([^']+)'").expect("module-not-found pattern is valid"));

static SYNTAX_ERROR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"SyntaxError:\s*(.+)").expect("syntax-error pattern is valid"));

static EXIT_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"exited with code (\d+)").expect("exit-code pattern is valid"));

/// Common uppercase-with-underscore tokens that aren't env var names, to
/// filter out of the last-resort extraction heuristic.
const ENV_VAR_STOPLIST: &[&str] =
    &["NODE_ENV", "NOT_FOUND", "MODULE_NOT_FOUND", "ECONN_RESET", "ADDR_IN_USE"];

fn classify_error(text: &str) -> Option<CrashReason> {
    if MISSING_ENV_PATTERNS.iter().any(|re| re.is_match(text)) {
        return Some(CrashReason::MissingEnvVars(extract_env_vars(text)));
    }
    if text.contains("MODULE_NOT_FOUND") {
        let module = MODULE_NOT_FOUND.captures(text).map(|c| c[1].to_string()).unwrap_or_else(|| "unknown".to_string());
        return Some(CrashReason::MissingModule(module));
    }
    if let Some(caps) = SYNTAX_ERROR.captures(text) {
        return Some(CrashReason::SyntaxError(caps[1].trim().to_string()));
    }
    if text.contains("EADDRINUSE") {
        return Some(CrashReason::PortInUse);
    }
    if let Some(caps) = EXIT_CODE.captures_iter(text).last() {
        if let Ok(code) = caps[1].parse::<i32>() {
            if code >= 1 {
                return Some(CrashReason::GenericExit { code, last_lines: last_non_stack_lines(text, 3) });
            }
        }
    }
    None
}

fn extract_env_vars(text: &str) -> Vec<String> {
    let mut vars = Vec::new();
    for re in ENV_VAR_LINE_FORMS.iter() {
        for caps in re.captures_iter(text) {
            vars.push(caps[1].to_string());
        }
    }
    if vars.is_empty() {
        for m in UPPER_TOKEN.find_iter(text) {
            let token = m.as_str();
            if !ENV_VAR_STOPLIST.contains(&token) && !vars.iter().any(|v| v == token) {
                vars.push(token.to_string());
            }
        }
    }
    vars.sort();
    vars.dedup();
    vars
}

fn last_non_stack_lines(text: &str, n: usize) -> Vec<String> {
    let mut lines: Vec<String> = text
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with("at "))
        .rev()
        .take(n)
        .map(|s| s.trim().to_string())
        .collect();
    lines.reverse();
    lines
}

#[cfg(test)]
#[path = "devserver_tests.rs"]
mod tests;
