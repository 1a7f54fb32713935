// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Anthropic adapter: role/content-block schema aligned with the internal
//! conversation form (spec.md §4.7's first formatting contract). Content is
//! always promoted to a block sequence; the system prompt may carry a
//! cache-control hint; image blocks support base64 or URL sources.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use drape_core::{ContentBlock, ConversationMessage, ImageSource, Role};
use futures::StreamExt;
use serde_json::{json, Value};

use crate::errors::ProviderError;
use crate::sse_client::sse_data_stream;
use crate::stream::{ChatOptions, ChatProvider, ChunkStream, ChunkUsage, StopReason, StreamChunk, ToolCall, ToolSpec};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8_192;

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), base_url: DEFAULT_BASE_URL.to_string() }
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), base_url: base_url.into() }
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "user",
    }
}

fn content_block_json(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({"type": "text", "text": text}),
        ContentBlock::Image { source } => match source {
            ImageSource::Base64 { media_type, data } => {
                json!({"type": "image", "source": {"type": "base64", "media_type": media_type, "data": data}})
            }
            ImageSource::Url { url } => json!({"type": "image", "source": {"type": "url", "url": url}}),
        },
        ContentBlock::ToolUse { id, name, input, .. } => json!({"type": "tool_use", "id": id, "name": name, "input": input}),
        ContentBlock::ToolResult { tool_use_id, content, is_error } => {
            json!({"type": "tool_result", "tool_use_id": tool_use_id, "content": content, "is_error": is_error})
        }
    }
}

fn build_body(
    model_id: &str,
    messages: &[ConversationMessage],
    tools: &[ToolSpec],
    system_prompt: Option<&str>,
    options: &ChatOptions,
) -> Value {
    let messages_json: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| json!({"role": role_str(m.role), "content": m.content.as_blocks().iter().map(content_block_json).collect::<Vec<_>>()}))
        .collect();

    let mut body = json!({
        "model": model_id,
        "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": messages_json,
        "stream": true,
    });

    if let Some(system) = system_prompt {
        body["system"] = json!([{"type": "text", "text": system, "cache_control": {"type": "ephemeral"}}]);
    }
    if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }
    if !tools.is_empty() {
        body["tools"] = json!(tools
            .iter()
            .map(|t| json!({"name": t.name, "description": t.description, "input_schema": t.parameters_schema}))
            .collect::<Vec<_>>());
    }
    body
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Thinking,
    ToolUse,
}

struct TranslateState {
    events: std::pin::Pin<Box<dyn futures::Stream<Item = Result<String, ProviderError>> + Send>>,
    queue: VecDeque<StreamChunk>,
    block_kinds: HashMap<u64, BlockKind>,
    tool_meta: HashMap<u64, (String, String)>,
    partial_json: HashMap<u64, String>,
    full_text: String,
    tool_calls: Vec<ToolCall>,
    thinking_open: bool,
    stop_reason: StopReason,
    usage: ChunkUsage,
    done: bool,
}

fn translate(events: impl futures::Stream<Item = Result<String, ProviderError>> + Send + 'static) -> ChunkStream {
    let state = TranslateState {
        events: Box::pin(events),
        queue: VecDeque::new(),
        block_kinds: HashMap::new(),
        tool_meta: HashMap::new(),
        partial_json: HashMap::new(),
        full_text: String::new(),
        tool_calls: Vec::new(),
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
                    state.queue.push_back(StreamChunk::Done {
                        full_text: state.full_text.clone(),
                        tool_calls: state.tool_calls.clone(),
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

fn close_thinking(state: &mut TranslateState) {
    if state.thinking_open {
        state.thinking_open = false;
        state.queue.push_back(StreamChunk::ThinkingEnd);
    }
}

fn apply_event(state: &mut TranslateState, event: &Value) {
    let kind = event.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "message_start" => {
            if let Some(usage) = event.pointer("/message/usage") {
                state.usage.input_tokens = usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
                state.usage.cache_creation_tokens =
                    usage.get("cache_creation_input_tokens").and_then(Value::as_u64).unwrap_or(0);
                state.usage.cached_tokens = usage.get("cache_read_input_tokens").and_then(Value::as_u64).unwrap_or(0);
            }
        }
        "content_block_start" => {
            let index = event.get("index").and_then(Value::as_u64).unwrap_or(0);
            let block = event.get("content_block").cloned().unwrap_or(Value::Null);
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    close_thinking(state);
                    state.block_kinds.insert(index, BlockKind::Text);
                }
                Some("thinking") | Some("redacted_thinking") => {
                    state.block_kinds.insert(index, BlockKind::Thinking);
                    if !state.thinking_open {
                        state.thinking_open = true;
                        state.queue.push_back(StreamChunk::ThinkingStart);
                    }
                }
                Some("tool_use") => {
                    close_thinking(state);
                    state.block_kinds.insert(index, BlockKind::ToolUse);
                    let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                    let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                    state.tool_meta.insert(index, (id.clone(), name.clone()));
                    state.queue.push_back(StreamChunk::ToolStart { id, name });
                }
                _ => {}
            }
        }
        "content_block_delta" => {
            let index = event.get("index").and_then(Value::as_u64).unwrap_or(0);
            let delta = event.get("delta").cloned().unwrap_or(Value::Null);
            match delta.get("type").and_then(Value::as_str) {
                Some("text_delta") => {
                    let text = delta.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
                    state.full_text.push_str(&text);
                    state.queue.push_back(StreamChunk::Text { delta: text });
                }
                Some("thinking_delta") => {
                    let text = delta.get("thinking").and_then(Value::as_str).unwrap_or_default().to_string();
                    state.queue.push_back(StreamChunk::Thinking { delta: text });
                }
                Some("input_json_delta") => {
                    let partial = delta.get("partial_json").and_then(Value::as_str).unwrap_or_default();
                    state.partial_json.entry(index).or_default().push_str(partial);
                }
                _ => {}
            }
        }
        "content_block_stop" => {
            let index = event.get("index").and_then(Value::as_u64).unwrap_or(0);
            if state.block_kinds.get(&index) == Some(&BlockKind::ToolUse) {
                if let Some((id, name)) = state.tool_meta.remove(&index) {
                    let raw_input = state.partial_json.remove(&index).unwrap_or_default();
                    let input = if raw_input.is_empty() {
                        json!({})
                    } else {
                        serde_json::from_str(&raw_input).unwrap_or(Value::Null)
                    };
                    state.tool_calls.push(ToolCall { id: id.clone(), name: name.clone(), input: input.clone(), reasoning_signature: None });
                    state.queue.push_back(StreamChunk::ToolUse { id, name, input, reasoning_signature: None });
                }
            }
        }
        "message_delta" => {
            if let Some(reason) = event.pointer("/delta/stop_reason").and_then(Value::as_str) {
                state.stop_reason = match reason {
                    "tool_use" => StopReason::ToolUse,
                    "max_tokens" => StopReason::MaxTokens,
                    "end_turn" | "stop_sequence" => StopReason::EndTurn,
                    _ => StopReason::Other,
                };
            }
            if let Some(output) = event.pointer("/usage/output_tokens").and_then(Value::as_u64) {
                state.usage.output_tokens = output;
            }
        }
        _ => {}
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
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
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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
#[path = "anthropic_tests.rs"]
mod tests;
