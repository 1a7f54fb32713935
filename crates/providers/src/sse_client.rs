// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal SSE line reader shared by the Anthropic, Gemini, and OpenAI
//! adapters: turns a streaming HTTP response into a stream of `data:`
//! payload strings, with no interpretation of their contents.

use std::collections::VecDeque;

use futures::Stream;

use crate::errors::ProviderError;

struct SseState {
    response: reqwest::Response,
    buf: String,
    pending: VecDeque<String>,
}

/// Reads `response` chunk by chunk, splitting on blank lines per the SSE
/// framing, and yields the `data:` field of each frame (OpenAI's literal
/// `[DONE]` sentinel is swallowed, never yielded).
pub(crate) fn sse_data_stream(response: reqwest::Response) -> impl Stream<Item = Result<String, ProviderError>> + Send {
    futures::stream::unfold(
        SseState { response, buf: String::new(), pending: VecDeque::new() },
        |mut state| async move {
            loop {
                if let Some(data) = state.pending.pop_front() {
                    return Some((Ok(data), state));
                }
                match state.response.chunk().await {
                    Ok(Some(bytes)) => {
                        state.buf.push_str(&String::from_utf8_lossy(&bytes));
                        drain_frames(&mut state.buf, &mut state.pending);
                        if state.pending.is_empty() {
                            continue;
                        }
                    }
                    Ok(None) => {
                        drain_frames(&mut state.buf, &mut state.pending);
                        if let Some(data) = state.pending.pop_front() {
                            return Some((Ok(data), state));
                        }
                        return None;
                    }
                    Err(err) => return Some((Err(ProviderError::Transport(err.to_string())), state)),
                }
            }
        },
    )
}

fn drain_frames(buf: &mut String, pending: &mut VecDeque<String>) {
    while let Some(idx) = buf.find("\n\n") {
        let frame: String = buf.drain(..idx + 2).collect();
        for line in frame.lines() {
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() && data != "[DONE]" {
                    pending.push_back(data.to_string());
                }
            }
        }
    }
}
