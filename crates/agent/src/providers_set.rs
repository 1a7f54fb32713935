// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binds each [`drape_providers::ProviderKind`] to the concrete
//! [`ChatProvider`] adapter the agent loop routes a model's requests
//! through, resolved once at startup from the model registry rather than
//! re-dispatched on a string per call (spec.md §9's design note on
//! provider polymorphism).

use std::collections::HashMap;
use std::sync::Arc;

use drape_providers::{ChatProvider, ProviderError, ProviderKind};

#[derive(Clone, Default)]
pub struct ProviderSet {
    adapters: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self { adapters: HashMap::new() }
    }

    pub fn insert(&mut self, kind: ProviderKind, provider: Arc<dyn ChatProvider>) {
        self.adapters.insert(kind, provider);
    }

    /// Enable an adapter only when its API key is configured, matching
    /// spec.md §6: "Model provider API keys — Enable the corresponding
    /// adapter".
    pub fn insert_if(&mut self, kind: ProviderKind, provider: Option<Arc<dyn ChatProvider>>) {
        if let Some(provider) = provider {
            self.insert(kind, provider);
        }
    }

    pub fn get(&self, kind: ProviderKind) -> Result<&Arc<dyn ChatProvider>, ProviderError> {
        self.adapters.get(&kind).ok_or_else(|| ProviderError::BadRequest(format!("no adapter configured for {kind:?}")))
    }
}
