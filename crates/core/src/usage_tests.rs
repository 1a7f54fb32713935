// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn price() -> ModelPrice {
    ModelPrice { input_per_mtok_usd: 3.0, cached_per_mtok_usd: 0.3, output_per_mtok_usd: 15.0 }
}

#[test]
fn compute_cost_eur_bills_cached_tokens_at_cached_rate() {
    let cost = compute_cost_eur(&price(), 1_000_000, 400_000, 0);
    let expected_usd = 600_000.0 * 3.0 / 1_000_000.0 + 400_000.0 * 0.3 / 1_000_000.0;
    assert!((cost - expected_usd * USD_TO_EUR).abs() < 1e-9);
}

#[test]
fn sum_cost_eur_is_additive_across_entries() {
    let entries = vec![
        AIUsageEntry {
            user_id: UserId::new("u1"),
            model: "m".into(),
            input_tokens: 100,
            output_tokens: 50,
            cached_tokens: 0,
            cost_eur: 0.01,
            timestamp: Utc::now(),
        },
        AIUsageEntry {
            user_id: UserId::new("u1"),
            model: "m".into(),
            input_tokens: 200,
            output_tokens: 20,
            cached_tokens: 0,
            cost_eur: 0.02,
            timestamp: Utc::now(),
        },
    ];
    assert!((sum_cost_eur(&entries) - 0.03).abs() < 1e-9);
}

#[test]
fn percent_used_saturates_at_full_budget_when_zero() {
    assert_eq!(percent_used(5.0, 0.0), 100);
    assert_eq!(percent_used(10.0, 20.0), 50);
}

#[test]
fn plan_accepts_starter_alias_for_free() {
    let plan: Plan = serde_json::from_str("\"starter\"").unwrap();
    assert_eq!(plan, Plan::Free);
    let plan: Plan = serde_json::from_str("\"free\"").unwrap();
    assert_eq!(plan, Plan::Free);
}

#[test]
fn budget_table_has_an_entry_for_every_plan() {
    let table = BudgetTable::default();
    for plan in Plan::ALL {
        assert!(table.budget_for(plan) > 0.0);
    }
}
