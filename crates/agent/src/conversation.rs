// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small helpers for assembling the conversation the agent loop drives,
//! kept separate from `run.rs` so the loop body reads as iteration control
//! flow rather than message-shape plumbing.

use drape_core::{ContentBlock, ConversationMessage, ImageSource, MessageContent, Role};
use drape_providers::ToolCall;

/// The initial user turn: plain text if there are no images, otherwise text
/// followed by inline image blocks (spec.md §3's `ConversationMessage`).
pub fn user_turn(prompt: &str, images: &[ImageSource]) -> ConversationMessage {
    if images.is_empty() {
        return ConversationMessage::user_text(prompt);
    }
    let mut blocks = vec![ContentBlock::Text { text: prompt.to_string() }];
    blocks.extend(images.iter().cloned().map(|source| ContentBlock::Image { source }));
    ConversationMessage { role: Role::User, content: MessageContent::Blocks(blocks) }
}

/// The assistant's turn for one iteration: its full text (if non-empty)
/// followed by every `tool_use` block it emitted, in order.
pub fn assistant_turn(full_text: &str, tool_calls: &[ToolCall]) -> ConversationMessage {
    let mut blocks = Vec::with_capacity(1 + tool_calls.len());
    if !full_text.is_empty() {
        blocks.push(ContentBlock::Text { text: full_text.to_string() });
    }
    for call in tool_calls {
        blocks.push(ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.input.clone(),
            reasoning_signature: call.reasoning_signature.clone(),
        });
    }
    ConversationMessage::assistant(blocks)
}

/// The single user-role message carrying all tool-result blocks for one
/// iteration, in call order (spec.md §4.9, step 6).
pub fn tool_results_turn(results: Vec<ContentBlock>) -> ConversationMessage {
    ConversationMessage::user_tool_results(results)
}

#[cfg(test)]
#[path = "conversation_tests.rs"]
mod tests;
