// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini adapter: role-plus-parts schema (spec.md §4.7's second formatting
//! contract). Assistant messages map to role `model`; `tool_use` blocks
//! become function-call parts; `tool_result` blocks become function-response
//! parts and must carry the same function name as the originating call, so
//! the adapter keeps a tool-use-id → function-name map built from the
//! conversation history on every call. A reasoning signature received on a
//! `tool_use` is echoed back on the matching function-response part. Only
//! base64 image sources are inlined; URL sources degrade to a text
//! placeholder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use drape_core::{ContentBlock, ConversationMessage, ImageSource, ReasoningSignature, Role};
use futures::StreamExt;
use serde_json::{json, Value};

use crate::errors::ProviderError;
use crate::sse_client::sse_data_stream;
use crate::stream::{ChatOptions, ChatProvider, ChunkStream, ChunkUsage, StopReason, StreamChunk, ToolCall, ToolSpec};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), base_url: DEFAULT_BASE_URL.to_string() }
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), base_url: base_url.into() }
    }
}

/// tool-use-id → (function name, reasoning signature echoed from the call).
type ToolNameMap = HashMap<String, (String, Option<ReasoningSignature>)>;

fn build_tool_name_map(messages: &[ConversationMessage]) -> ToolNameMap {
    let mut map = ToolNameMap::new();
    for message in messages {
        for block in message.content.as_blocks() {
            if let ContentBlock::ToolUse { id, name, reasoning_signature, .. } = block {
                map.insert(id, (name, reasoning_signature));
            }
        }
    }
    map
}

fn image_part(source: &ImageSource) -> Value {
    match source {
        ImageSource::Base64 { media_type, data } => json!({"inlineData": {"mimeType": media_type, "data": data}}),
        ImageSource::Url { url } => json!({"text": format!("[image omitted: {url}]")}),
    }
}

fn message_parts(message: &ConversationMessage, tool_names: &ToolNameMap) -> Vec<Value> {
    message
        .content
        .as_blocks()
        .into_iter()
        .map(|block| match block {
            ContentBlock::Text { text } => json!({"text": text}),
            ContentBlock::Image { source } => image_part(&source),
            ContentBlock::ToolUse { name, input, reasoning_signature, .. } => {
                let mut part = json!({"functionCall": {"name": name, "args": input}});
                if let Some(sig) = reasoning_signature {
                    part["thoughtSignature"] = json!(BASE64.encode(sig));
                }
                part
            }
            ContentBlock::ToolResult { tool_use_id, content, is_error } => {
                let name = tool_names.get(&tool_use_id).map(|(n, _)| n.clone()).unwrap_or_else(|| "unknown_tool".to_string());
                let response = if is_error { json!({"error": content}) } else { json!({"content": content}) };
                let mut part = json!({"functionResponse": {"name": name, "response": response}});
                if let Some(Some(sig)) = tool_names.get(&tool_use_id).map(|(_, s)| s.clone()) {
                    part["thoughtSignature"] = json!(BASE64.encode(sig));
                }
                part
            }
        })
        .collect()
}

fn build_body(messages: &[ConversationMessage], tools: &[ToolSpec], system_prompt: Option<&str>, options: &ChatOptions) -> Value {
    let tool_names = build_tool_name_map(messages);
    let contents: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            let role = match m.role {
                Role::Assistant => "model",
                _ => "user",
            };
            json!({"role": role, "parts": message_parts(m, &tool_names)})
        })
        .collect();

    let mut body = json!({ "contents": contents });
    if let Some(system) = system_prompt {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }
    if !tools.is_empty() {
        body["tools"] = json!([{
            "functionDeclarations": tools.iter().map(|t| json!({
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters_schema,
            })).collect::<Vec<_>>(),
        }]);
    }
    let mut generation_config = json!({});
    if let Some(max_tokens) = options.max_tokens {
        generation_config["maxOutputTokens"] = json!(max_tokens);
    }
    if let Some(temperature) = options.temperature {
        generation_config["temperature"] = json!(temperature);
    }
    if generation_config.as_object().map(|o| !o.is_empty()).unwrap_or(false) {
        body["generationConfig"] = generation_config;
    }
    body
}

struct TranslateState {
    events: std::pin::Pin<Box<dyn futures::Stream<Item = Result<String, ProviderError>> + Send>>,
    queue: std::collections::VecDeque<StreamChunk>,
    full_text: String,
    tool_calls: Vec<ToolCall>,
    thinking_open: bool,
    stop_reason: StopReason,
    usage: ChunkUsage,
    call_counter: AtomicU64,
    done: bool,
}

fn close_thinking(state: &mut TranslateState) {
    if state.thinking_open {
        state.thinking_open = false;
        state.queue.push_back(StreamChunk::ThinkingEnd);
    }
}

fn apply_event(state: &mut TranslateState, event: &Value) {
    if let Some(usage) = event.get("usageMetadata") {
        state.usage.input_tokens = usage.get("promptTokenCount").and_then(Value::as_u64).unwrap_or(state.usage.input_tokens);
        state.usage.output_tokens =
            usage.get("candidatesTokenCount").and_then(Value::as_u64).unwrap_or(state.usage.output_tokens);
        state.usage.cached_tokens =
            usage.get("cachedContentTokenCount").and_then(Value::as_u64).unwrap_or(state.usage.cached_tokens);
    }

    let Some(candidate) = event.pointer("/candidates/0") else { return };
    if let Some(finish) = candidate.get("finishReason").and_then(Value::as_str) {
        state.stop_reason = match finish {
            "MAX_TOKENS" => StopReason::MaxTokens,
            "STOP" if !state.tool_calls.is_empty() => StopReason::ToolUse,
            "STOP" => StopReason::EndTurn,
            _ => StopReason::Other,
        };
    }

    let Some(parts) = candidate.pointer("/content/parts").and_then(Value::as_array) else { return };
    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            let is_thought = part.get("thought").and_then(Value::as_bool).unwrap_or(false);
            if is_thought {
                if !state.thinking_open {
                    state.thinking_open = true;
                    state.queue.push_back(StreamChunk::ThinkingStart);
                }
                state.queue.push_back(StreamChunk::Thinking { delta: text.to_string() });
            } else {
                close_thinking(state);
                state.full_text.push_str(text);
                state.queue.push_back(StreamChunk::Text { delta: text.to_string() });
            }
            continue;
        }
        if let Some(call) = part.get("functionCall") {
            close_thinking(state);
            let name = call.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let input = call.get("args").cloned().unwrap_or_else(|| json!({}));
            let n = state.call_counter.fetch_add(1, Ordering::SeqCst);
            let id = format!("call_{n}");
            let reasoning_signature =
                part.get("thoughtSignature").and_then(Value::as_str).and_then(|s| BASE64.decode(s).ok());
            state.tool_calls.push(ToolCall { id: id.clone(), name: name.clone(), input: input.clone(), reasoning_signature: reasoning_signature.clone() });
            state.queue.push_back(StreamChunk::ToolStart { id: id.clone(), name: name.clone() });
            state.queue.push_back(StreamChunk::ToolUse { id, name, input, reasoning_signature });
        }
    }
}

fn translate(events: impl futures::Stream<Item = Result<String, ProviderError>> + Send + 'static) -> ChunkStream {
    let state = TranslateState {
        events: Box::pin(events),
        queue: std::collections::VecDeque::new(),
        full_text: String::new(),
        tool_calls: Vec::new(),
        thinking_open: false,
        stop_reason: StopReason::EndTurn,
        usage: ChunkUsage::default(),
        call_counter: AtomicU64::new(0),
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

#[async_trait]
impl ChatProvider for GeminiProvider {
    async fn chat_stream(
        &self,
        model_id: &str,
        messages: &[ConversationMessage],
        tools: &[ToolSpec],
        system_prompt: Option<&str>,
        options: &ChatOptions,
    ) -> Result<ChunkStream, ProviderError> {
        let body = build_body(messages, tools, system_prompt, options);
        let url = format!("{}/v1beta/models/{model_id}:streamGenerateContent?alt=sse&key={}", self.base_url, self.api_key);
        let response = self.client.post(url).json(&body).send().await.map_err(|err| ProviderError::Transport(err.to_string()))?;

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
#[path = "gemini_tests.rs"]
mod tests;
