use super::*;
use drape_core::test_support::sample_usage_entry;
use drape_core::AIUsageEntry;

async fn ledger_with(entries: Vec<AIUsageEntry>) -> UsageLedger {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("usage.jsonl");
    let ledger = UsageLedger::load(path).await;
    for entry in entries {
        ledger.append(entry).await.expect("append");
    }
    ledger
}

#[tokio::test]
async fn under_budget_is_ok() {
    let ledger = ledger_with(vec![sample_usage_entry("u1", 0.50)]).await;
    let mut budgets = BudgetTable::default();
    budgets.set(Plan::Free, 1.50);
    let verdict = check(&ledger, &budgets, &UserId::new("u1"), Plan::Free, Utc::now());
    assert_eq!(verdict, BudgetVerdict::Ok);
}

#[tokio::test]
async fn spend_at_budget_is_exceeded() {
    let ledger = ledger_with(vec![sample_usage_entry("u1", 1.50)]).await;
    let mut budgets = BudgetTable::default();
    budgets.set(Plan::Free, 1.50);
    let verdict = check(&ledger, &budgets, &UserId::new("u1"), Plan::Free, Utc::now());
    assert_eq!(verdict, BudgetVerdict::Exceeded { percent_used: 100 });
}

#[tokio::test]
async fn spend_over_budget_reports_percent_over_100() {
    let ledger = ledger_with(vec![sample_usage_entry("u1", 3.00)]).await;
    let mut budgets = BudgetTable::default();
    budgets.set(Plan::Free, 1.50);
    let verdict = check(&ledger, &budgets, &UserId::new("u1"), Plan::Free, Utc::now());
    assert_eq!(verdict, BudgetVerdict::Exceeded { percent_used: 200 });
}

#[tokio::test]
async fn other_users_spend_does_not_count() {
    let ledger = ledger_with(vec![sample_usage_entry("other", 10.0)]).await;
    let mut budgets = BudgetTable::default();
    budgets.set(Plan::Free, 1.50);
    let verdict = check(&ledger, &budgets, &UserId::new("u1"), Plan::Free, Utc::now());
    assert_eq!(verdict, BudgetVerdict::Ok);
}

#[tokio::test]
async fn entries_before_this_month_do_not_count() {
    let mut stale = sample_usage_entry("u1", 5.0);
    stale.timestamp = Utc::now() - chrono::Duration::days(45);
    let ledger = ledger_with(vec![stale]).await;
    let mut budgets = BudgetTable::default();
    budgets.set(Plan::Free, 1.50);
    let verdict = check(&ledger, &budgets, &UserId::new("u1"), Plan::Free, Utc::now());
    assert_eq!(verdict, BudgetVerdict::Ok);
}
