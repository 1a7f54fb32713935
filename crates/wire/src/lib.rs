// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE wire protocol between the daemon and connected agent-stream clients.
//!
//! Wire format: `event: <type>\ndata: <json>\n\n`, with comment lines
//! (`: ...\n\n`) for the initial connection marker and periodic keep-alives.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod sse;

pub use sse::{
    decode_event, encode_event, keepalive_frame, parse_frame, Frame, FrameError, CONNECTED_COMMENT,
    KEEPALIVE_INTERVAL_SECS,
};
