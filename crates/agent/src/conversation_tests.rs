use super::*;
use drape_core::ContentBlock;
use drape_providers::ToolCall;

#[test]
fn user_turn_without_images_is_plain_text() {
    let message = user_turn("fix the bug", &[]);
    assert_eq!(message.role, Role::User);
    assert_eq!(message.content, MessageContent::Text("fix the bug".to_string()));
}

#[test]
fn user_turn_with_images_promotes_to_blocks() {
    let image = ImageSource::Base64 { media_type: "image/png".to_string(), data: "abc".to_string() };
    let message = user_turn("what is this", std::slice::from_ref(&image));
    assert_eq!(message.role, Role::User);
    let blocks = message.content.as_blocks();
    assert_eq!(blocks.len(), 2);
    assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "what is this"));
    assert!(matches!(&blocks[1], ContentBlock::Image { source } if *source == image));
}

#[test]
fn assistant_turn_orders_text_before_tool_uses() {
    let calls = vec![ToolCall {
        id: "call-1".to_string(),
        name: "read_file".to_string(),
        input: serde_json::json!({"file_path": "a.txt"}),
        reasoning_signature: None,
    }];
    let message = assistant_turn("reading the file", &calls);
    let blocks = message.content.as_blocks();
    assert_eq!(blocks.len(), 2);
    assert!(matches!(&blocks[0], ContentBlock::Text { .. }));
    assert!(matches!(&blocks[1], ContentBlock::ToolUse { id, .. } if id == "call-1"));
}

#[test]
fn assistant_turn_with_empty_text_emits_only_tool_uses() {
    let calls = vec![ToolCall {
        id: "call-1".to_string(),
        name: "signal_completion".to_string(),
        input: serde_json::json!({"result": "done"}),
        reasoning_signature: None,
    }];
    let message = assistant_turn("", &calls);
    assert_eq!(message.content.as_blocks().len(), 1);
}

#[test]
fn tool_results_turn_is_user_role() {
    let message = tool_results_turn(vec![ContentBlock::ToolResult {
        tool_use_id: "call-1".to_string(),
        content: "ok".to_string(),
        is_error: false,
    }]);
    assert_eq!(message.role, Role::User);
    assert_eq!(message.tool_use_ids().len(), 0);
}
