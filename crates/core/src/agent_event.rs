// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event sum type that flows from the agent loop over SSE.

use crate::conversation::ConversationMessage;
use serde::{Deserialize, Serialize};

/// A single question posed to the user via the `ask_user_question` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskUserQuestion {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// One item of the agent-managed todo list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    pub active_form: String,
    pub status: TodoStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

/// The AgentEvent sum type. `type` tags the SSE `event:` line (see
/// `drape-wire`); the remaining fields are the `data:` JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Start { mode: String, project_id: String, model: String },
    IterationStart { iteration: u32, max_iterations: u32 },
    Thinking {
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<bool>,
    },
    TextDelta { delta: String },
    ToolStart { id: String, tool: String },
    ToolInput { id: String, partial_json: String },
    ToolComplete { id: String, tool: String, result: String, success: bool, input: serde_json::Value },
    ToolError { id: String, tool: String, error: String },
    TodoUpdate { todos: Vec<TodoItem> },
    AskUserQuestion { questions: Vec<AskUserQuestion> },
    Complete {
        result: String,
        files_created: Vec<String>,
        files_modified: Vec<String>,
        tokens_used: u64,
        iterations: u32,
    },
    BudgetExceeded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percent_used: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plan: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error { error: String },
    FatalError { error: String, stack: String },
    Done,
}

impl AgentEvent {
    /// The SSE `event:` tag for this variant — the serde tag in snake_case.
    pub fn wire_type(&self) -> &'static str {
        match self {
            AgentEvent::Start { .. } => "start",
            AgentEvent::IterationStart { .. } => "iteration_start",
            AgentEvent::Thinking { .. } => "thinking",
            AgentEvent::TextDelta { .. } => "text_delta",
            AgentEvent::ToolStart { .. } => "tool_start",
            AgentEvent::ToolInput { .. } => "tool_input",
            AgentEvent::ToolComplete { .. } => "tool_complete",
            AgentEvent::ToolError { .. } => "tool_error",
            AgentEvent::TodoUpdate { .. } => "todo_update",
            AgentEvent::AskUserQuestion { .. } => "ask_user_question",
            AgentEvent::Complete { .. } => "complete",
            AgentEvent::BudgetExceeded { .. } => "budget_exceeded",
            AgentEvent::Error { .. } => "error",
            AgentEvent::FatalError { .. } => "fatal_error",
            AgentEvent::Done => "done",
        }
    }

    /// Whether this is one of the five terminal variants.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentEvent::Done
                | AgentEvent::Complete { .. }
                | AgentEvent::Error { .. }
                | AgentEvent::BudgetExceeded { .. }
                | AgentEvent::FatalError { .. }
        )
    }
}

/// A resumable pause point: the agent loop stops and the next `run()` call
/// replays this as a user message appended with the answers.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingQuestion {
    pub questions: Vec<AskUserQuestion>,
}

/// Used only to document the shape that a resumed conversation takes; kept
/// here since it's the natural companion of `ConversationMessage` above.
pub fn resume_with_answer(history: &mut Vec<ConversationMessage>, answer_text: String) {
    history.push(ConversationMessage::user_text(answer_text));
}

#[cfg(test)]
#[path = "agent_event_tests.rs"]
mod tests;
