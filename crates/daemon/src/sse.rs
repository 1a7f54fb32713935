// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapts an [`drape_agent::AgentEventStream`] into the raw SSE response
//! spec.md §4.10/§6 describes: `: connected\n\n` on open, `event:
//! <type>\ndata: <json>\n\n` per `AgentEvent`, a `: keepalive\n\n` comment
//! every 15s while the connection is open, and the headers
//! `Content-Type: text/event-stream`, `Cache-Control: no-cache`,
//! `Connection: keep-alive`, `X-Accel-Buffering: no`.
//!
//! Framed with `drape-wire` rather than axum's own `sse::Event` builder, so
//! the exact byte format on the wire is owned by one crate. Client
//! disconnect is detected the simple way: once the HTTP body future is
//! dropped by the server (the client closed the socket), this task's
//! internal channel receiver is dropped too, so the next `tx.send` from the
//! merge loop — and, one level up, the agent loop's own `tx.send` — fails
//! and both stop before doing further work. This collapses spec.md §4.10's
//! two distinct signals (socket-close vs. request-body-end) into one;
//! recorded as a simplification in DESIGN.md.

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderValue, Response, StatusCode};
use drape_agent::AgentEventStream;
use drape_wire::{encode_event, keepalive_frame, CONNECTED_COMMENT, KEEPALIVE_INTERVAL_SECS};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Wrap an agent-event stream as a complete SSE `Response`.
pub fn agent_event_response(mut events: AgentEventStream) -> Response<Body> {
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        if tx.send(CONNECTED_COMMENT.to_string()).is_err() {
            return;
        }

        let mut keepalive = tokio::time::interval(std::time::Duration::from_secs(KEEPALIVE_INTERVAL_SECS));
        keepalive.tick().await; // first tick fires immediately; discard it.

        loop {
            tokio::select! {
                chunk = events.next() => {
                    match chunk {
                        Some(event) => {
                            let frame = match encode_event(&event) {
                                Ok(frame) => frame,
                                Err(err) => format!(": failed to encode event: {err}\n\n"),
                            };
                            if tx.send(frame).is_err() {
                                return;
                            }
                            if event.is_terminal() {
                                return;
                            }
                        }
                        None => return,
                    }
                }
                _ = keepalive.tick() => {
                    if tx.send(keepalive_frame().to_string()).is_err() {
                        return;
                    }
                }
            }
        }
    });

    let body_stream = UnboundedReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>);
    let mut response = Response::new(Body::from_stream(body_stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    response
}
