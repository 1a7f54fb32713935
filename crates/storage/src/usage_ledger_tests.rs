// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drape_core::test_support::sample_usage_entry;

#[tokio::test]
async fn append_then_reload_preserves_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usage.jsonl");
    let ledger = UsageLedger::load(path.clone()).await;
    ledger.append(sample_usage_entry("u1", 0.5)).await.unwrap();
    ledger.append(sample_usage_entry("u1", 0.25)).await.unwrap();

    let reloaded = UsageLedger::load(path).await;
    assert_eq!(reloaded.sum_since(&UserId::new("u1"), DateTime::<Utc>::UNIX_EPOCH), 0.75);
}

#[tokio::test]
async fn sum_since_excludes_other_users_and_older_entries() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = UsageLedger::load(dir.path().join("usage.jsonl")).await;

    let mut old_entry = sample_usage_entry("u1", 10.0);
    old_entry.timestamp = Utc::now() - chrono::Duration::days(40);
    ledger.append(old_entry).await.unwrap();
    ledger.append(sample_usage_entry("u1", 1.0)).await.unwrap();
    ledger.append(sample_usage_entry("u2", 5.0)).await.unwrap();

    let since = start_of_month(Utc::now());
    assert_eq!(ledger.sum_since(&UserId::new("u1"), since), 1.0);
}

#[tokio::test]
async fn compact_drops_entries_before_month_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("usage.jsonl");
    let ledger = UsageLedger::load(path.clone()).await;

    let mut stale = sample_usage_entry("u1", 9.0);
    stale.timestamp = Utc::now() - chrono::Duration::days(90);
    ledger.append(stale).await.unwrap();
    ledger.append(sample_usage_entry("u1", 1.5)).await.unwrap();

    ledger.compact(Utc::now()).await.unwrap();
    let reloaded = UsageLedger::load(path).await;
    assert_eq!(reloaded.sum_since(&UserId::new("u1"), DateTime::<Utc>::UNIX_EPOCH), 1.5);
}

#[test]
fn start_of_month_zeroes_day_and_time_fields() {
    let at = "2026-07-28T14:32:10Z".parse::<DateTime<Utc>>().unwrap();
    let start = start_of_month(at);
    assert_eq!(start.day(), 1);
    assert_eq!(start.hour(), 0);
    assert_eq!(start.minute(), 0);
}
