// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use drape_core::simple_display;
use serde::{Deserialize, Serialize};

/// The three system-prompt postures a `run` call can take (spec.md §4.9,
/// step 4). `Plan` is instructed never to execute: it must finish via
/// `todo_write` + `signal_completion` rather than editing files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    Fast,
    Plan,
    Execute,
}

simple_display! {
    AgentMode {
        Fast => "fast",
        Plan => "plan",
        Execute => "execute",
    }
}
