// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token/cost accounting types.

use crate::ids::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single usage record, persisted append-only and periodically compacted
/// to the start-of-current-month window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIUsageEntry {
    pub user_id: UserId,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    pub cost_eur: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-million-token pricing for a model, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_mtok_usd: f64,
    pub cached_per_mtok_usd: f64,
    pub output_per_mtok_usd: f64,
}

/// USD→EUR conversion constant. Fixed rather than fed from a live FX feed;
/// see DESIGN.md for the tradeoff.
pub const USD_TO_EUR: f64 = 0.92;

/// `costEur = ((inputTokens - cachedTokens) * inputPrice + cachedTokens *
/// cachedPrice + outputTokens * outputPrice) / 1_000_000 * USD_TO_EUR`.
pub fn compute_cost_eur(price: &ModelPrice, input_tokens: u64, cached_tokens: u64, output_tokens: u64) -> f64 {
    let billed_input = input_tokens.saturating_sub(cached_tokens) as f64;
    let usd = billed_input * price.input_per_mtok_usd / 1_000_000.0
        + cached_tokens as f64 * price.cached_per_mtok_usd / 1_000_000.0
        + output_tokens as f64 * price.output_per_mtok_usd / 1_000_000.0;
    usd * USD_TO_EUR
}

/// Maps a model's stable short name to its price. Unknown models are a hard
/// failure at the model-registry layer (`drape-providers`), not here.
#[derive(Debug, Clone, Default)]
pub struct PriceTable(HashMap<String, ModelPrice>);

impl PriceTable {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, model: impl Into<String>, price: ModelPrice) {
        self.0.insert(model.into(), price);
    }

    pub fn get(&self, model: &str) -> Option<&ModelPrice> {
        self.0.get(model)
    }
}

/// Plan tiers. Two plan names, `free` and `starter`, are treated as one
/// tier with two accepted wire aliases (see DESIGN.md for why).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[serde(alias = "starter")]
    Free,
    Go,
    Pro,
    Team,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Go, Plan::Pro, Plan::Team];

    pub fn wire_name(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Go => "go",
            Plan::Pro => "pro",
            Plan::Team => "team",
        }
    }
}

/// Monthly EUR budget per plan tier.
#[derive(Debug, Clone)]
pub struct BudgetTable(HashMap<Plan, f64>);

impl Default for BudgetTable {
    fn default() -> Self {
        let mut table = HashMap::new();
        table.insert(Plan::Free, 1.50);
        table.insert(Plan::Go, 8.00);
        table.insert(Plan::Pro, 25.00);
        table.insert(Plan::Team, 80.00);
        Self(table)
    }
}

impl BudgetTable {
    pub fn budget_for(&self, plan: Plan) -> f64 {
        self.0.get(&plan).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, plan: Plan, budget_eur: f64) {
        self.0.insert(plan, budget_eur);
    }
}

/// Sum of `costEur` over a set of usage entries.
pub fn sum_cost_eur(entries: &[AIUsageEntry]) -> f64 {
    entries.iter().map(|e| e.cost_eur).sum()
}

/// Percent of a plan's budget consumed, as reported on a `budget_exceeded`
/// event.
pub fn percent_used(spent_eur: f64, budget_eur: f64) -> u32 {
    if budget_eur <= 0.0 {
        return 100;
    }
    ((spent_eur / budget_eur) * 100.0).round().min(u32::MAX as f64) as u32
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
