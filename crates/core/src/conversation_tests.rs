// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn user_text_round_trips_through_serde() {
    let msg = ConversationMessage::user_text("hello");
    let json = serde_json::to_string(&msg).unwrap();
    let back: ConversationMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(msg, back);
}

#[test]
fn tool_use_ids_extracts_only_tool_use_blocks() {
    let msg = ConversationMessage::assistant(vec![
        ContentBlock::Text { text: "thinking".into() },
        ContentBlock::ToolUse {
            id: "call_1".into(),
            name: "read_file".into(),
            input: serde_json::json!({"file_path": "a.txt"}),
            reasoning_signature: None,
        },
    ]);
    assert_eq!(msg.tool_use_ids(), vec!["call_1".to_string()]);
}

#[test]
fn message_content_text_promotes_to_single_text_block() {
    let content = MessageContent::Text("hi".to_string());
    assert_eq!(content.as_blocks(), vec![ContentBlock::Text { text: "hi".into() }]);
}
