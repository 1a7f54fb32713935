// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model registry: maps a stable short name chosen by the client to the
//! provider/model record needed to route and price a request (spec.md
//! §4.7). Unknown names are a hard failure, never a fallback.

use std::collections::HashMap;

use drape_core::ModelPrice;

use crate::errors::ProviderError;

/// Which adapter a model routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Anthropic,
    Gemini,
    OpenAi,
}

/// Everything the fabric and agent loop need to know about one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub max_tokens: u32,
    pub supports_tools: bool,
    pub supports_streaming: bool,
    pub supports_images: bool,
    pub price: ModelPrice,
}

/// Short name → `ModelSpec` lookup table.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry(HashMap<String, ModelSpec>);

impl ModelRegistry {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn register(&mut self, short_name: impl Into<String>, spec: ModelSpec) {
        self.0.insert(short_name.into(), spec);
    }

    pub fn resolve(&self, short_name: &str) -> Result<&ModelSpec, ProviderError> {
        self.0.get(short_name).ok_or_else(|| ProviderError::UnknownModel(short_name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The stock set of slugs this deployment ships with, one representative
    /// model per adapter. Operators extend this via configuration; this is
    /// the baseline so an empty environment still has a working registry.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            "claude-sonnet",
            ModelSpec {
                provider: ProviderKind::Anthropic,
                model_id: "claude-sonnet-4-5-20250929".to_string(),
                max_tokens: 64_000,
                supports_tools: true,
                supports_streaming: true,
                supports_images: true,
                price: ModelPrice { input_per_mtok_usd: 3.0, cached_per_mtok_usd: 0.30, output_per_mtok_usd: 15.0 },
            },
        );
        registry.register(
            "gemini-flash",
            ModelSpec {
                provider: ProviderKind::Gemini,
                model_id: "gemini-2.5-flash".to_string(),
                max_tokens: 65_536,
                supports_tools: true,
                supports_streaming: true,
                supports_images: true,
                price: ModelPrice { input_per_mtok_usd: 0.30, cached_per_mtok_usd: 0.075, output_per_mtok_usd: 2.50 },
            },
        );
        registry.register(
            "gpt-4o",
            ModelSpec {
                provider: ProviderKind::OpenAi,
                model_id: "gpt-4o".to_string(),
                max_tokens: 16_384,
                supports_tools: true,
                supports_streaming: true,
                supports_images: false,
                price: ModelPrice { input_per_mtok_usd: 2.50, cached_per_mtok_usd: 1.25, output_per_mtok_usd: 10.0 },
            },
        );
        registry
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
