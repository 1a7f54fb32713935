// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! drape-providers: the model provider fabric (spec.md §4.7). A uniform
//! `chatStream` interface over three concrete adapters, and the model
//! registry that resolves a client-facing short name to one of them.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod anthropic;
mod errors;
mod gemini;
mod openai;
mod registry;
mod sse_client;
mod stream;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use anthropic::AnthropicProvider;
pub use errors::ProviderError;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use registry::{ModelRegistry, ModelSpec, ProviderKind};
pub use stream::{ChatOptions, ChatProvider, ChunkStream, ChunkUsage, StopReason, StreamChunk, ToolCall, ToolSpec};
