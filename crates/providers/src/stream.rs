// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed `StreamChunk` set every adapter translates its native stream
//! into, and the `ChatProvider` trait that produces it (spec.md §4.7).

use std::pin::Pin;

use async_trait::async_trait;
use drape_core::{ConversationMessage, ReasoningSignature};
use futures::Stream;

use crate::errors::ProviderError;

/// Token usage as reported on the terminal `done` chunk. Cost conversion is
/// the agent loop's job, not the fabric's.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChunkUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    pub cache_creation_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    pub reasoning_signature: Option<ReasoningSignature>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Other,
}

/// The closed set every provider adapter must translate its native stream
/// into (spec.md §4.7).
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Text { delta: String },
    ThinkingStart,
    Thinking { delta: String },
    ThinkingEnd,
    ToolStart { id: String, name: String },
    ToolUse { id: String, name: String, input: serde_json::Value, reasoning_signature: Option<ReasoningSignature> },
    Done { full_text: String, tool_calls: Vec<ToolCall>, stop_reason: StopReason, usage: ChunkUsage },
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// A tool definition offered to the model, in the fabric's provider-agnostic
/// shape; each adapter renders it into its own wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// One adapter per provider family. `model_id` is the provider-native model
/// identifier (already resolved out of the `ModelRegistry` by the caller).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat_stream(
        &self,
        model_id: &str,
        messages: &[ConversationMessage],
        tools: &[ToolSpec],
        system_prompt: Option<&str>,
        options: &ChatOptions,
    ) -> Result<ChunkStream, ProviderError>;
}
