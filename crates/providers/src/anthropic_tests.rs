use super::*;
use drape_core::ContentBlock;
use futures::stream;

fn event(raw: &str) -> Result<String, ProviderError> {
    Ok(raw.to_string())
}

#[tokio::test]
async fn translate_assembles_text_thinking_and_tool_use() {
    let events = vec![
        event(r#"{"type":"message_start","message":{"usage":{"input_tokens":10,"cache_read_input_tokens":2}}}"#),
        event(r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking"}}"#),
        event(r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"let me check"}}"#),
        event(r#"{"type":"content_block_stop","index":0}"#),
        event(r#"{"type":"content_block_start","index":1,"content_block":{"type":"text"}}"#),
        event(r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"Sure, "}}"#),
        event(r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"reading the file."}}"#),
        event(r#"{"type":"content_block_stop","index":1}"#),
        event(
            r#"{"type":"content_block_start","index":2,"content_block":{"type":"tool_use","id":"toolu_1","name":"read_file"}}"#,
        ),
        event(r#"{"type":"content_block_delta","index":2,"delta":{"type":"input_json_delta","partial_json":"{\"path\":"}}"#),
        event(r#"{"type":"content_block_delta","index":2,"delta":{"type":"input_json_delta","partial_json":"\"a.rs\"}"}}"#),
        event(r#"{"type":"content_block_stop","index":2}"#),
        event(r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":42}}"#),
    ];

    let mut stream = translate(stream::iter(events));
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.expect("chunk should parse"));
    }

    assert!(matches!(chunks[0], StreamChunk::ThinkingStart));
    assert!(chunks.iter().any(|c| matches!(c, StreamChunk::Thinking { delta } if delta == "let me check")));
    assert!(chunks.iter().any(|c| matches!(c, StreamChunk::ThinkingEnd)));
    assert!(chunks
        .iter()
        .any(|c| matches!(c, StreamChunk::ToolStart { id, name } if id == "toolu_1" && name == "read_file")));

    let done = chunks.last().expect("stream should end with a done chunk");
    match done {
        StreamChunk::Done { full_text, tool_calls, stop_reason, usage } => {
            assert_eq!(full_text, "Sure, reading the file.");
            assert_eq!(tool_calls.len(), 1);
            assert_eq!(tool_calls[0].name, "read_file");
            assert_eq!(tool_calls[0].input, serde_json::json!({"path": "a.rs"}));
            assert_eq!(*stop_reason, StopReason::ToolUse);
            assert_eq!(usage.input_tokens, 10);
            assert_eq!(usage.cached_tokens, 2);
            assert_eq!(usage.output_tokens, 42);
        }
        other => panic!("expected Done chunk, got {other:?}"),
    }
}

#[test]
fn build_body_demotes_system_role_messages_and_sets_cache_control() {
    let messages = vec![ConversationMessage::user_text("hello"), ConversationMessage::assistant(vec![ContentBlock::Text { text: "hi".to_string() }])];
    let body = build_body("claude-sonnet-4-5-20250929", &messages, &[], Some("be helpful"), &ChatOptions::default());

    assert_eq!(body["model"], "claude-sonnet-4-5-20250929");
    assert_eq!(body["system"][0]["text"], "be helpful");
    assert_eq!(body["system"][0]["cache_control"]["type"], "ephemeral");
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
}

#[test]
fn build_body_renders_tool_specs_with_input_schema_key() {
    let tools = vec![ToolSpec {
        name: "read_file".to_string(),
        description: "reads a file".to_string(),
        parameters_schema: serde_json::json!({"type": "object"}),
    }];
    let body = build_body("claude-sonnet-4-5-20250929", &[], &tools, None, &ChatOptions::default());
    assert_eq!(body["tools"][0]["name"], "read_file");
    assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
}

#[test]
fn content_block_json_round_trips_tool_result_error_flag() {
    let block = ContentBlock::ToolResult { tool_use_id: "toolu_1".to_string(), content: "boom".to_string(), is_error: true };
    let json = content_block_json(&block);
    assert_eq!(json["type"], "tool_result");
    assert_eq!(json["is_error"], true);
    assert_eq!(json["content"], "boom");
}
