// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenAI adapter: chat-completions schema (spec.md §4.7's third formatting
//! contract). Multimodal content is stripped to text, a leading system
//! message is injected, and tools are wrapped as `{type: "function",
//! function: {...}}`.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use drape_core::{ContentBlock, ConversationMessage, Role};
use futures::StreamExt;
use serde_json::{json, Value};

use crate::errors::ProviderError;
use crate::sse_client::sse_data_stream;
use crate::stream::{ChatOptions, ChatProvider, ChunkStream, ChunkUsage, StopReason, StreamChunk, ToolCall, ToolSpec};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), base_url: DEFAULT_BASE_URL.to_string() }
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), base_url: base_url.into() }
    }
}

/// Collapse a block sequence to plain text: the chat-completions schema has
/// no concept of a content block, images included.
fn text_only(message: &ConversationMessage) -> String {
    message
        .content
        .as_blocks()
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Image { .. } => Some("[image omitted]".to_string()),
            ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_messages(messages: &[ConversationMessage], system_prompt: Option<&str>) -> Vec<Value> {
    let mut out = Vec::new();
    if let Some(system) = system_prompt {
        out.push(json!({"role": "system", "content": system}));
    }

    for message in messages {
        let blocks = message.content.as_blocks();
        let tool_calls: Vec<Value> = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input, .. } => {
                    Some(json!({"id": id, "type": "function", "function": {"name": name, "arguments": input.to_string()}}))
                }
                _ => None,
            })
            .collect();

        let tool_results: Vec<&ContentBlock> = blocks.iter().filter(|b| matches!(b, ContentBlock::ToolResult { .. })).collect();
        if !tool_results.is_empty() {
            for block in tool_results {
                if let ContentBlock::ToolResult { tool_use_id, content, .. } = block {
                    out.push(json!({"role": "tool", "tool_call_id": tool_use_id, "content": content}));
                }
            }
            continue;
        }

        match message.role {
            Role::System => out.push(json!({"role": "system", "content": text_only(message)})),
            Role::User => out.push(json!({"role": "user", "content": text_only(message)})),
            Role::Assistant => {
                let mut entry = json!({"role": "assistant", "content": text_only(message)});
                if !tool_calls.is_empty() {
                    entry["tool_calls"] = json!(tool_calls);
                }
                out.push(entry);
            }
        }
    }
    out
}

fn build_body(model_id: &str, messages: &[ConversationMessage], tools: &[ToolSpec], system_prompt: Option<&str>, options: &ChatOptions) -> Value {
    let mut body = json!({
        "model": model_id,
        "messages": build_messages(messages, system_prompt),
        "stream": true,
        "stream_options": {"include_usage": true},
    });
    if let Some(max_tokens) = options.max_tokens {
        body["max_completion_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }
    if !tools.is_empty() {
        body["tools"] = json!(tools
            .iter()
            .map(|t| json!({"type": "function", "function": {"name": t.name, "description": t.description, "parameters": t.parameters_schema}}))
            .collect::<Vec<_>>());
    }
    body
}

struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

struct TranslateState {
    events: std::pin::Pin<Box<dyn futures::Stream<Item = Result<String, ProviderError>> + Send>>,
    queue: VecDeque<StreamChunk>,
    full_text: String,
    tool_calls: HashMap<u64, PendingToolCall>,
    started_tool_indices: std::collections::HashSet<u64>,
    thinking_open: bool,
    stop_reason: StopReason,
    usage: ChunkUsage,
    done: bool,
}

fn close_thinking(state: &mut TranslateState) {
    if state.thinking_open {
        state.thinking_open = false;
        state.queue.push_back(StreamChunk::ThinkingEnd);
    }
}

fn apply_event(state: &mut TranslateState, event: &Value) {
    if let Some(usage) = event.get("usage") {
        state.usage.input_tokens = usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(state.usage.input_tokens);
        state.usage.output_tokens = usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(state.usage.output_tokens);
        state.usage.cached_tokens =
            usage.pointer("/prompt_tokens_details/cached_tokens").and_then(Value::as_u64).unwrap_or(state.usage.cached_tokens);
    }

    let Some(choice) = event.pointer("/choices/0") else { return };
    if let Some(finish) = choice.get("finish_reason").and_then(Value::as_str) {
        state.stop_reason = match finish {
            "tool_calls" => StopReason::ToolUse,
            "length" => StopReason::MaxTokens,
            "stop" => StopReason::EndTurn,
            _ => StopReason::Other,
        };
    }

    let Some(delta) = choice.get("delta") else { return };
    if let Some(reasoning) = delta.get("reasoning_content").and_then(Value::as_str) {
        if !state.thinking_open {
            state.thinking_open = true;
            state.queue.push_back(StreamChunk::ThinkingStart);
        }
        state.queue.push_back(StreamChunk::Thinking { delta: reasoning.to_string() });
    }
    if let Some(content) = delta.get("content").and_then(Value::as_str) {
        close_thinking(state);
        state.full_text.push_str(content);
        state.queue.push_back(StreamChunk::Text { delta: content.to_string() });
    }
    if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
        close_thinking(state);
        for call in tool_calls {
            let index = call.get("index").and_then(Value::as_u64).unwrap_or(0);
            let entry = state.tool_calls.entry(index).or_insert_with(|| PendingToolCall {
                id: String::new(),
                name: String::new(),
                arguments: String::new(),
            });
            if let Some(id) = call.get("id").and_then(Value::as_str) {
                entry.id = id.to_string();
            }
            if let Some(name) = call.pointer("/function/name").and_then(Value::as_str) {
                entry.name = name.to_string();
            }
            if let Some(args) = call.pointer("/function/arguments").and_then(Value::as_str) {
                entry.arguments.push_str(args);
            }
            if !entry.id.is_empty() && !entry.name.is_empty() && state.started_tool_indices.insert(index) {
                state.queue.push_back(StreamChunk::ToolStart { id: entry.id.clone(), name: entry.name.clone() });
            }
        }
    }
}

fn translate(events: impl futures::Stream<Item = Result<String, ProviderError>> + Send + 'static) -> ChunkStream {
    let state = TranslateState {
        events: Box::pin(events),
        queue: VecDeque::new(),
        full_text: String::new(),
        tool_calls: HashMap::new(),
        started_tool_indices: std::collections::HashSet::new(),
        thinking_open: false,
        stop_reason: StopReason::EndTurn,
        usage: ChunkUsage::default(),
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.queue.pop_front() {
                return Some((Ok(chunk), state));
            }
            if state.done {
                return None;
            }
            let raw = match state.events.next().await {
                Some(Ok(raw)) => raw,
                Some(Err(err)) => return Some((Err(err), state)),
                None => {
                    state.done = true;
                    close_thinking(&mut state);
                    let mut indices: Vec<u64> = state.tool_calls.keys().copied().collect();
                    indices.sort_unstable();
                    let tool_calls: Vec<ToolCall> = indices
                        .into_iter()
                        .filter_map(|idx| state.tool_calls.remove(&idx))
                        .map(|pending| ToolCall {
                            id: pending.id,
                            name: pending.name,
                            input: serde_json::from_str(&pending.arguments).unwrap_or(Value::Null),
                            reasoning_signature: None,
                        })
                        .collect();
                    for call in &tool_calls {
                        state.queue.push_back(StreamChunk::ToolUse {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            input: call.input.clone(),
                            reasoning_signature: None,
                        });
                    }
                    state.queue.push_back(StreamChunk::Done {
                        full_text: state.full_text.clone(),
                        tool_calls,
                        stop_reason: state.stop_reason,
                        usage: state.usage,
                    });
                    continue;
                }
            };
            let event: Value = match serde_json::from_str(&raw) {
                Ok(v) => v,
                Err(err) => return Some((Err(ProviderError::MalformedResponse(err.to_string())), state)),
            };
            apply_event(&mut state, &event);
        }
    }))
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn chat_stream(
        &self,
        model_id: &str,
        messages: &[ConversationMessage],
        tools: &[ToolSpec],
        system_prompt: Option<&str>,
        options: &ChatOptions,
    ) -> Result<ChunkStream, ProviderError> {
        let body = build_body(model_id, messages, tools, system_prompt, options);
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(if matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504) {
                ProviderError::Transient(format!("{status}: {body}"))
            } else {
                ProviderError::BadRequest(format!("{status}: {body}"))
            });
        }

        Ok(translate(sse_data_stream(response)))
    }
}

#[cfg(test)]
#[path = "openai_tests.rs"]
mod tests;
