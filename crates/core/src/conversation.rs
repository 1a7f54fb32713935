// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The canonical conversation shape.
//!
//! `ConversationMessage` is the form the agent loop builds and the form
//! every provider adapter converts into and out of at the boundary.
//! Nothing outside `drape-providers` should construct a provider-native
//! request shape directly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// An opaque, provider-specific byte string some providers require to be
/// echoed back on the `tool_result` that answers a `tool_use`.
pub type ReasoningSignature = Vec<u8>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning_signature: Option<ReasoningSignature>,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

/// Either plain text or an ordered sequence of content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    pub fn as_blocks(&self) -> Vec<ContentBlock> {
        match self {
            MessageContent::Text(text) => vec![ContentBlock::Text { text: text.clone() }],
            MessageContent::Blocks(blocks) => blocks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ConversationMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Blocks(blocks) }
    }

    pub fn user_tool_results(blocks: Vec<ContentBlock>) -> Self {
        debug_assert!(blocks.iter().all(|b| matches!(b, ContentBlock::ToolResult { .. })));
        Self { role: Role::User, content: MessageContent::Blocks(blocks) }
    }

    /// Every `tool_use` id present in this message's content blocks, in order.
    pub fn tool_use_ids(&self) -> Vec<String> {
        self.content
            .as_blocks()
            .into_iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "conversation_tests.rs"]
mod tests;
