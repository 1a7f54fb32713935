// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-Sent Events framing for the agent event stream.
//!
//! Wire format per frame: `event: <type>\ndata: <json>\n\n`. Comment lines
//! (`: ...\n\n`) carry the initial connection marker and periodic keep-alives
//! and are never parsed as events by a conforming client.

use drape_core::AgentEvent;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("failed to serialize event: {0}")]
    Serialize(String),
    #[error("malformed SSE frame: {0}")]
    Malformed(String),
}

/// The frame sent immediately on connect, before the first `AgentEvent`.
pub const CONNECTED_COMMENT: &str = ": connected\n\n";

/// Interval on which the daemon writes a keep-alive comment to hold the
/// connection open through idle proxies.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 15;

/// A single keep-alive comment frame.
pub fn keepalive_frame() -> &'static str {
    ": keepalive\n\n"
}

/// Encode one `AgentEvent` as a complete SSE frame.
pub fn encode_event(event: &AgentEvent) -> Result<String, FrameError> {
    let data = serde_json::to_string(event).map_err(|e| FrameError::Serialize(e.to_string()))?;
    Ok(format!("event: {}\ndata: {}\n\n", event.wire_type(), data))
}

/// A decoded frame: either a comment (keep-alive or connection marker) or a
/// typed event with its raw JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Comment(String),
    Event { event_type: String, data: String },
}

/// Parse one frame (delimited by a blank line) out of `input`, returning the
/// frame and the remainder of `input` past the delimiter. Returns `None` if
/// `input` contains no complete frame yet (the caller should buffer more
/// bytes before retrying — this mirrors how a streaming SSE client reads).
pub fn parse_frame(input: &str) -> Option<(Frame, &str)> {
    let delim = input.find("\n\n")?;
    let (frame, rest) = input.split_at(delim);
    let rest = &rest[2..];

    if let Some(comment) = frame.strip_prefix(':') {
        return Some((Frame::Comment(comment.trim_start().to_string()), rest));
    }

    let mut event_type = None;
    let mut data_lines = Vec::new();
    for line in frame.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim_start().to_string());
        }
    }

    let event_type = event_type?;
    Some((Frame::Event { event_type, data: data_lines.join("\n") }, rest))
}

/// Decode a frame's `data:` payload into a typed `AgentEvent`. The caller is
/// expected to have already matched `event_type` against the tag it wants.
pub fn decode_event(data: &str) -> Result<AgentEvent, FrameError> {
    serde_json::from_str(data).map_err(|e| FrameError::Malformed(e.to_string()))
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;
