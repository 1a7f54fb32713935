// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tool dispatcher (spec.md §4.8): the closed set of tools available to
//! the agent loop, routed through `execute(toolName, input, projectId,
//! session?) -> ToolResult`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use drape_container::ContainerDriver;
use drape_core::{AskUserQuestion, ProjectId, TodoItem, UserId};
use drape_workspace::WorkspaceOrchestrator;
use serde_json::Value;

use crate::errors::ToolError;
use crate::outcome::ToolOutcome;
use crate::web_search::WebSearchProvider;
use crate::{diff, hotreload, security};

/// Names of the closed tool set, in the order spec.md §4.8's table lists
/// them. Part of the wire contract with the model — never renamed casually.
pub const TOOL_NAMES: &[&str] = &[
    "read_file",
    "write_file",
    "edit_file",
    "list_directory",
    "run_command",
    "glob_search",
    "grep_search",
    "web_search",
    "todo_write",
    "ask_user_question",
    "signal_completion",
];

const DEFAULT_RUN_COMMAND_TIMEOUT_MS: u64 = 60_000;
const GREP_MAX_RESULTS: usize = 200;
const GLOB_MAX_RESULTS: usize = 500;

/// What a dispatched `write_file`/`edit_file` call touched, so the agent
/// loop can track `filesCreated`/`filesModified` without the dispatcher
/// itself needing per-run state (spec.md §4.9, step 6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTouch {
    Written(String),
    Edited(String),
}

pub struct ToolCallResult {
    pub outcome: ToolOutcome,
    pub file_touch: Option<FileTouch>,
    /// Populated only by `todo_write`, so the agent loop can emit
    /// `AgentEvent::TodoUpdate` (spec.md §4.8, §4.9 step 6) without the
    /// dispatcher depending on `drape-agent`'s event type.
    pub todos: Option<Vec<TodoItem>>,
}

impl ToolCallResult {
    fn ok(content: impl Into<String>) -> Self {
        Self { outcome: ToolOutcome::Ok(content.into()), file_touch: None, todos: None }
    }

    fn error(message: impl Into<String>) -> Self {
        Self { outcome: ToolOutcome::Error(message.into()), file_touch: None, todos: None }
    }
}

pub struct ToolDispatcher<D: ContainerDriver> {
    orchestrator: Arc<WorkspaceOrchestrator<D>>,
    http: reqwest::Client,
    web_search: Arc<dyn WebSearchProvider>,
}

impl<D: ContainerDriver + 'static> ToolDispatcher<D> {
    pub fn new(orchestrator: Arc<WorkspaceOrchestrator<D>>, web_search: Arc<dyn WebSearchProvider>) -> Self {
        Self { orchestrator, http: reqwest::Client::new(), web_search }
    }

    /// `execute(toolName, input, projectId, session?) -> ToolResult`
    /// (spec.md §4.8). `todo_write` additionally returns the parsed todo
    /// list so the caller can emit `todo_update`.
    pub async fn execute(&self, tool_name: &str, input: &Value, user_id: &UserId, project_id: &ProjectId) -> ToolCallResult {
        let result = match tool_name {
            "read_file" => self.read_file(input, project_id).await,
            "write_file" => self.write_file(input, user_id, project_id).await,
            "edit_file" => self.edit_file(input, user_id, project_id).await,
            "list_directory" => self.list_directory(input, project_id).await,
            "run_command" => self.run_command(input, user_id, project_id).await,
            "glob_search" => self.glob_search(input, project_id).await,
            "grep_search" => self.grep_search(input, project_id).await,
            "web_search" => self.web_search(input).await,
            "todo_write" => self.todo_write(input),
            "ask_user_question" => self.ask_user_question(input),
            "signal_completion" => self.signal_completion(input),
            other => Err(ToolError::UnknownTool(other.to_string())),
        };

        match result {
            Ok(call_result) => call_result,
            Err(err) => ToolCallResult::error(err.to_string()),
        }
    }

    /// `executeTool(toolName, input)` (spec.md §4.9): a secondary entry
    /// point that obtains a container and runs a single tool outside any
    /// loop. Resolves the same way `execute` does once a session exists.
    pub async fn execute_tool(&self, tool_name: &str, input: &Value, user_id: &UserId, project_id: &ProjectId) -> ToolCallResult {
        if let Err(err) = self.orchestrator.get_or_create_container(user_id, project_id).await {
            return ToolCallResult::error(err.to_string());
        }
        self.execute(tool_name, input, user_id, project_id).await
    }

    fn project_root(&self, project_id: &ProjectId) -> PathBuf {
        self.orchestrator.project_root(project_id, None)
    }

    fn resolve_path(&self, project_id: &ProjectId, relative: &str) -> Result<PathBuf, ToolError> {
        let root = self.project_root(project_id);
        let joined = root.join(relative.trim_start_matches('/'));
        Ok(joined)
    }

    async fn read_file(&self, input: &Value, project_id: &ProjectId) -> Result<ToolCallResult, ToolError> {
        let file_path = string_field(input, "file_path")?;
        let path = self.resolve_path(project_id, &file_path)?;
        let bytes = tokio::fs::read(&path).await.map_err(|_| ToolError::FileNotFound(file_path.clone()))?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok(ToolCallResult::ok(text)),
            Err(_) => Ok(ToolCallResult::ok(format!("<binary file, {} bytes>", path.metadata().map(|m| m.len()).unwrap_or(0)))),
        }
    }

    async fn write_file(&self, input: &Value, user_id: &UserId, project_id: &ProjectId) -> Result<ToolCallResult, ToolError> {
        let file_path = string_field(input, "file_path")?;
        let content = string_field(input, "content")?;
        let description = input.get("description").and_then(Value::as_str);

        let path = self.resolve_path(project_id, &file_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content.as_bytes()).await?;

        self.notify_hot_reload(user_id, project_id, &file_path, &content).await;

        let message = match description {
            Some(desc) => format!("wrote {file_path}: {desc}"),
            None => format!("wrote {file_path}"),
        };
        Ok(ToolCallResult { outcome: ToolOutcome::Ok(message), file_touch: Some(FileTouch::Written(file_path)), todos: None })
    }

    async fn edit_file(&self, input: &Value, user_id: &UserId, project_id: &ProjectId) -> Result<ToolCallResult, ToolError> {
        let file_path = string_field(input, "file_path")?;
        let old_string = string_field(input, "old_string")?;
        let new_string = string_field(input, "new_string")?;

        let path = self.resolve_path(project_id, &file_path)?;
        let bytes = tokio::fs::read(&path).await.map_err(|_| ToolError::FileNotFound(file_path.clone()))?;
        let before = String::from_utf8(bytes).map_err(|_| ToolError::BinaryFile(file_path.clone()))?;

        let Some(at) = before.find(&old_string) else {
            return Err(ToolError::OldStringNotFound(file_path));
        };
        let mut after = String::with_capacity(before.len() - old_string.len() + new_string.len());
        after.push_str(&before[..at]);
        after.push_str(&new_string);
        after.push_str(&before[at + old_string.len()..]);

        tokio::fs::write(&path, after.as_bytes()).await?;
        self.notify_hot_reload(user_id, project_id, &file_path, &after).await;

        let rendered_diff = diff::unified_line_diff(&before, &after);
        Ok(ToolCallResult { outcome: ToolOutcome::Ok(rendered_diff), file_touch: Some(FileTouch::Edited(file_path)), todos: None })
    }

    async fn notify_hot_reload(&self, user_id: &UserId, project_id: &ProjectId, path: &str, content: &str) {
        match self.orchestrator.get_or_create_container(user_id, project_id).await {
            Ok(session) => hotreload::notify(&self.http, &session.agent_url, path, content).await,
            Err(err) => tracing::debug!(%project_id, %err, "skipping hot-reload notification, no session"),
        }
    }

    async fn list_directory(&self, input: &Value, project_id: &ProjectId) -> Result<ToolCallResult, ToolError> {
        let path = input.get("path").and_then(Value::as_str);
        let recursive = input.get("recursive").and_then(Value::as_bool).unwrap_or(false);
        let entries = self.orchestrator.list_files(project_id, path, recursive).await?;
        Ok(ToolCallResult::ok(entries.join("\n")))
    }

    async fn run_command(&self, input: &Value, user_id: &UserId, project_id: &ProjectId) -> Result<ToolCallResult, ToolError> {
        let command = string_field(input, "command")?;
        if let Err(reason) = security::check(&command) {
            return Err(ToolError::DeniedCommand(reason.to_string()));
        }
        let timeout_ms = input.get("timeout").and_then(Value::as_u64).unwrap_or(DEFAULT_RUN_COMMAND_TIMEOUT_MS);

        let output = tokio::time::timeout(Duration::from_millis(timeout_ms + 1_000), async {
            self.orchestrator.exec(user_id, project_id, &command, None).await
        })
        .await
        .map_err(|_| ToolError::Timeout(timeout_ms))??;

        let mut rendered = output.stdout;
        if !output.stderr.is_empty() {
            if !rendered.is_empty() {
                rendered.push('\n');
            }
            rendered.push_str(&output.stderr);
        }
        if output.exit_code != 0 {
            return Ok(ToolCallResult {
                outcome: ToolOutcome::Error(format!("command exited with code {}: {rendered}", output.exit_code)),
                file_touch: None,
                todos: None,
            });
        }
        Ok(ToolCallResult::ok(rendered))
    }

    async fn glob_search(&self, input: &Value, project_id: &ProjectId) -> Result<ToolCallResult, ToolError> {
        let pattern = string_field(input, "pattern")?;
        let path = input.get("path").and_then(Value::as_str);
        let entries = self.orchestrator.list_files(project_id, path, true).await?;
        let glob = glob_to_regex(&pattern);

        let matched: Vec<String> = entries.into_iter().filter(|entry| glob.is_match(entry)).take(GLOB_MAX_RESULTS).collect();
        Ok(ToolCallResult::ok(matched.join("\n")))
    }

    async fn grep_search(&self, input: &Value, project_id: &ProjectId) -> Result<ToolCallResult, ToolError> {
        let pattern_str = string_field(input, "pattern")?;
        let path = input.get("path").and_then(Value::as_str);
        let include = input.get("include").and_then(Value::as_str);

        let pattern = regex::Regex::new(&pattern_str).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let include_glob = include.map(glob_to_regex);

        let root = self.project_root(project_id);
        let entries = self.orchestrator.list_files(project_id, path, true).await?;

        let mut matches = Vec::new();
        'files: for entry in entries {
            if let Some(glob) = &include_glob {
                if !glob.is_match(&entry) {
                    continue;
                }
            }
            let full_path = root.join(&entry);
            let Ok(contents) = tokio::fs::read_to_string(&full_path).await else { continue };
            for (line_number, line) in contents.lines().enumerate() {
                if pattern.is_match(line) {
                    matches.push(format!("{entry}:{}:{line}", line_number + 1));
                    if matches.len() >= GREP_MAX_RESULTS {
                        break 'files;
                    }
                }
            }
        }
        Ok(ToolCallResult::ok(matches.join("\n")))
    }

    async fn web_search(&self, input: &Value) -> Result<ToolCallResult, ToolError> {
        let query = string_field(input, "query")?;
        let result = self.web_search.search(&query).await?;
        Ok(ToolCallResult::ok(result))
    }

    fn todo_write(&self, input: &Value) -> Result<ToolCallResult, ToolError> {
        let todos = parse_todos(input)?;
        let summary = format!("{} todo(s) recorded", todos.len());
        Ok(ToolCallResult { outcome: ToolOutcome::Ok(summary), file_touch: None, todos: Some(todos) })
    }

    fn ask_user_question(&self, input: &Value) -> Result<ToolCallResult, ToolError> {
        let questions = parse_questions(input)?;
        Ok(ToolCallResult { outcome: ToolOutcome::Pause(questions), file_touch: None, todos: None })
    }

    fn signal_completion(&self, input: &Value) -> Result<ToolCallResult, ToolError> {
        let result = string_field(input, "result")?;
        Ok(ToolCallResult { outcome: ToolOutcome::Complete(result), file_touch: None, todos: None })
    }
}

/// Parse a `todo_write` call's `todos[]` input into the shared
/// [`TodoItem`] shape, independent of any dispatcher instance so the agent
/// loop can reuse it when emitting `todo_update`.
pub fn parse_todos(input: &Value) -> Result<Vec<TodoItem>, ToolError> {
    let array = input.get("todos").and_then(Value::as_array).ok_or(ToolError::MissingInput("todos"))?;
    array.iter().map(parse_todo_item).collect()
}

fn parse_todo_item(value: &Value) -> Result<TodoItem, ToolError> {
    let content = value.get("content").and_then(Value::as_str).ok_or(ToolError::MissingInput("todos[].content"))?;
    let active_form = value.get("active_form").and_then(Value::as_str).unwrap_or(content);
    let status = match value.get("status").and_then(Value::as_str).unwrap_or("pending") {
        "pending" => drape_core::TodoStatus::Pending,
        "in_progress" => drape_core::TodoStatus::InProgress,
        "completed" => drape_core::TodoStatus::Completed,
        other => return Err(ToolError::InvalidInput(format!("unknown todo status: {other}"))),
    };
    Ok(TodoItem { content: content.to_string(), active_form: active_form.to_string(), status })
}

fn parse_questions(input: &Value) -> Result<Vec<AskUserQuestion>, ToolError> {
    let array = input.get("questions").and_then(Value::as_array).ok_or(ToolError::MissingInput("questions"))?;
    array
        .iter()
        .map(|q| {
            let question = q.get("question").and_then(Value::as_str).ok_or(ToolError::MissingInput("questions[].question"))?;
            let options = q
                .get("options")
                .and_then(Value::as_array)
                .map(|opts| opts.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            Ok(AskUserQuestion { question: question.to_string(), options })
        })
        .collect()
}

fn string_field(input: &Value, name: &'static str) -> Result<String, ToolError> {
    input.get(name).and_then(Value::as_str).map(str::to_string).ok_or(ToolError::MissingInput(name))
}

/// Minimal `*`/`?` glob-to-regex translation sufficient for filename
/// matching against a flat relative-path list; `**` is treated the same as
/// `*` since paths are already flattened by `listFiles`.
fn glob_to_regex(pattern: &str) -> regex::Regex {
    let mut rendered = String::from("(?i)^");
    for ch in pattern.chars() {
        match ch {
            '*' => rendered.push_str(".*"),
            '?' => rendered.push('.'),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                rendered.push('\\');
                rendered.push(ch);
            }
            other => rendered.push(other),
        }
    }
    rendered.push('$');
    regex::Regex::new(&rendered).unwrap_or_else(|_| regex::Regex::new("$^").expect("empty-match fallback is valid"))
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
