// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only AI usage ledger, compacted to the start of the current month.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use drape_core::{AIUsageEntry, UserId};
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;

use crate::errors::StorageError;

struct Inner {
    path: PathBuf,
    entries: RwLock<Vec<AIUsageEntry>>,
}

/// Cheaply cloneable handle onto the ledger.
#[derive(Clone)]
pub struct UsageLedger(Arc<Inner>);

/// Midnight on the first of the month containing `at`, in UTC.
///
/// The source reasons about local midnight; this crate has no timezone
/// database dependency, so UTC midnight is used as the month boundary (see
/// DESIGN.md).
pub fn start_of_month(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_day(1)
        .and_then(|d| d.with_hour(0))
        .and_then(|d| d.with_minute(0))
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(at)
}

impl UsageLedger {
    /// Load all entries from `path`'s newline-delimited JSON, skipping and
    /// logging any line that fails to parse.
    pub async fn load(path: PathBuf) -> Self {
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .filter_map(|line| match serde_json::from_str::<AIUsageEntry>(line) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping corrupt usage ledger line");
                        None
                    }
                })
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read usage ledger, starting empty");
                Vec::new()
            }
        };

        Self(Arc::new(Inner { path, entries: RwLock::new(entries) }))
    }

    /// Append one entry, both in memory and on disk.
    pub async fn append(&self, entry: AIUsageEntry) -> Result<(), StorageError> {
        self.0.entries.write().push(entry.clone());

        if let Some(parent) = self.0.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file =
            tokio::fs::OpenOptions::new().create(true).append(true).open(&self.0.path).await?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Sum of `costEur` for `user_id` since `since` (inclusive).
    pub fn sum_since(&self, user_id: &UserId, since: DateTime<Utc>) -> f64 {
        self.0
            .entries
            .read()
            .iter()
            .filter(|e| &e.user_id == user_id && e.timestamp >= since)
            .map(|e| e.cost_eur)
            .sum()
    }

    /// Drop every in-memory entry older than the start of the current month
    /// and rewrite the on-disk file to match. Called periodically, not on
    /// every append, since a full rewrite is O(n) in ledger size.
    pub async fn compact(&self, now: DateTime<Utc>) -> Result<(), StorageError> {
        let cutoff = start_of_month(now);
        let retained: Vec<AIUsageEntry> = {
            let mut entries = self.0.entries.write();
            entries.retain(|e| e.timestamp >= cutoff);
            entries.clone()
        };

        let mut buf = String::new();
        for entry in &retained {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }
        if let Some(parent) = self.0.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.0.path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp_path, buf.as_bytes()).await?;
        tokio::fs::rename(&tmp_path, &self.0.path).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "usage_ledger_tests.rs"]
mod tests;
