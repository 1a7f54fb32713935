// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Budget gate (spec.md §4.9, step 2): sum a user's usage entries since the
//! start of the current month, convert to EUR, compare to the plan budget.

use chrono::{DateTime, Utc};
use drape_core::{BudgetTable, Plan, UserId};
use drape_storage::{start_of_month, UsageLedger};

/// Outcome of evaluating the budget gate for one `run` call.
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetVerdict {
    /// Spend so far is below the plan's monthly budget; the run proceeds.
    Ok,
    /// Spend has reached or exceeded the budget; the run must stop before
    /// any model call.
    Exceeded { percent_used: u32 },
}

/// Evaluate the gate for `user_id` on `plan`, as of `now`.
pub fn check(ledger: &UsageLedger, budgets: &BudgetTable, user_id: &UserId, plan: Plan, now: DateTime<Utc>) -> BudgetVerdict {
    let spent = ledger.sum_since(user_id, start_of_month(now));
    let budget = budgets.budget_for(plan);
    let percent_used = drape_core::percent_used(spent, budget);
    if spent >= budget {
        BudgetVerdict::Exceeded { percent_used }
    } else {
        BudgetVerdict::Ok
    }
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod tests;
