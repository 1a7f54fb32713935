// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `ChatProvider` double for `drape-agent`'s tests, mirroring the
//! container driver's `test-support`-gated `FakeContainerDriver`.

use std::sync::Mutex;

use async_trait::async_trait;
use drape_core::ConversationMessage;

use crate::errors::ProviderError;
use crate::stream::{ChatOptions, ChatProvider, ChunkStream, StreamChunk, ToolSpec};

/// One scripted call: the chunks to emit, in order, for the Nth invocation
/// of `chat_stream`.
pub struct ScriptedCall {
    pub chunks: Vec<StreamChunk>,
}

impl ScriptedCall {
    pub fn new(chunks: Vec<StreamChunk>) -> Self {
        Self { chunks }
    }
}

/// Snapshot of one `chat_stream` invocation, recorded for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model_id: String,
    pub messages: Vec<ConversationMessage>,
    pub tool_names: Vec<String>,
    pub system_prompt: Option<String>,
}

/// A `ChatProvider` that replays a fixed queue of scripted responses rather
/// than talking to a real model endpoint. Calls past the end of the queue
/// replay the last scripted response, so a test can under-specify a long
/// oscillation sequence.
pub struct FakeChatProvider {
    scripts: Mutex<Vec<ScriptedCall>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for FakeChatProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeChatProvider {
    pub fn new() -> Self {
        Self { scripts: Mutex::new(Vec::new()), calls: Mutex::new(Vec::new()) }
    }

    /// Build a provider that always replays the same script, useful for the
    /// oscillation-guard test where every iteration returns an identical
    /// tool call.
    pub fn repeating(chunks: Vec<StreamChunk>) -> Self {
        let provider = Self::new();
        provider.scripts.lock().unwrap_or_else(|e| e.into_inner()).push(ScriptedCall::new(chunks));
        provider
    }

    /// Push one more scripted response onto the queue.
    pub fn push(&self, call: ScriptedCall) {
        self.scripts.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ChatProvider for FakeChatProvider {
    async fn chat_stream(
        &self,
        model_id: &str,
        messages: &[ConversationMessage],
        tools: &[ToolSpec],
        system_prompt: Option<&str>,
        _options: &ChatOptions,
    ) -> Result<ChunkStream, ProviderError> {
        let index = {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            calls.push(RecordedCall {
                model_id: model_id.to_string(),
                messages: messages.to_vec(),
                tool_names: tools.iter().map(|t| t.name.clone()).collect(),
                system_prompt: system_prompt.map(str::to_string),
            });
            calls.len() - 1
        };

        let scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        let script_index = index.min(scripts.len().saturating_sub(1));
        let chunks = scripts
            .get(script_index)
            .map(|s| s.chunks.clone())
            .ok_or_else(|| ProviderError::BadRequest("no scripted response configured".to_string()))?;

        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}
