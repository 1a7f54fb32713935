// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Rust-native replacement for the source's out-of-band marker fields on
//! tool results (spec.md §9): `ask_user_question` and `signal_completion`
//! return dedicated [`ToolOutcome`] variants instead of a sentinel-shaped
//! `Ok` payload, so the agent loop matches on a closed type rather than
//! probing JSON for a magic key.

use drape_core::AskUserQuestion;

/// What a dispatched tool call resolved to. `Ok` is the common case; the
/// remaining three variants are interpreted by the agent loop as control
/// flow rather than plain tool output (spec.md §4.9, step 6).
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Ordinary tool result text, appended to the conversation as a
    /// `tool_result` content block.
    Ok(String),
    /// `ask_user_question` fired: the loop stops and emits
    /// `ask_user_question{questions}`.
    Pause(Vec<AskUserQuestion>),
    /// `signal_completion` fired: the loop stops and emits `complete{...}`.
    Complete(String),
    /// The tool failed in a way the model should see and can react to, as
    /// opposed to a [`crate::errors::ToolError`] which never reaches the
    /// model.
    Error(String),
}

impl ToolOutcome {
    /// Render as the content string that goes into the conversation's
    /// `tool_result` block, regardless of which variant this is — even a
    /// `Pause`/`Complete` still needs a tool-result entry appended before
    /// the loop stops, since the model's request/response pairing is
    /// positional.
    pub fn as_tool_result_content(&self) -> &str {
        match self {
            ToolOutcome::Ok(content) => content,
            ToolOutcome::Pause(_) => "waiting for user input",
            ToolOutcome::Complete(result) => result,
            ToolOutcome::Error(message) => message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Error(_))
    }
}
