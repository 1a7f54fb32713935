use super::*;
use drape_core::ContentBlock;
use futures::stream;

fn event(raw: &str) -> Result<String, ProviderError> {
    Ok(raw.to_string())
}

#[tokio::test]
async fn translate_accumulates_streamed_tool_call_arguments() {
    let events = vec![
        event(r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#),
        event(r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"write_file","arguments":""}}]}}]}"#),
        event(r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"path\":"}}]}}}]}"#),
        event(r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"a.rs\"}"}}]}}]}"#),
        event(r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}],"usage":{"prompt_tokens":12,"completion_tokens":4}}"#),
    ];

    let mut stream = translate(stream::iter(events));
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.expect("chunk should parse"));
    }

    assert!(chunks.iter().any(|c| matches!(c, StreamChunk::ToolStart{id, name} if id == "call_abc" && name == "write_file")));
    let done = chunks.last().expect("should end with done");
    match done {
        StreamChunk::Done { tool_calls, stop_reason, usage, .. } => {
            assert_eq!(tool_calls.len(), 1);
            assert_eq!(tool_calls[0].input, serde_json::json!({"path": "a.rs"}));
            assert_eq!(*stop_reason, StopReason::ToolUse);
            assert_eq!(usage.input_tokens, 12);
            assert_eq!(usage.output_tokens, 4);
        }
        other => panic!("expected Done, got {other:?}"),
    }
}

#[tokio::test]
async fn translate_maps_length_finish_reason_to_max_tokens() {
    let events = vec![
        event(r#"{"choices":[{"index":0,"delta":{"content":"partial"}}]}"#),
        event(r#"{"choices":[{"index":0,"delta":{},"finish_reason":"length"}]}"#),
    ];
    let mut stream = translate(stream::iter(events));
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.expect("chunk should parse"));
    }
    match chunks.last().unwrap() {
        StreamChunk::Done { stop_reason, full_text, .. } => {
            assert_eq!(*stop_reason, StopReason::MaxTokens);
            assert_eq!(full_text, "partial");
        }
        other => panic!("expected Done, got {other:?}"),
    }
}

#[test]
fn text_only_renders_images_as_a_placeholder_and_drops_tool_blocks() {
    let message = ConversationMessage::assistant(vec![
        ContentBlock::Text { text: "look:".to_string() },
        ContentBlock::Image { source: drape_core::ImageSource::Url { url: "https://example.com/x.png".to_string() } },
        ContentBlock::ToolUse { id: "1".to_string(), name: "n".to_string(), input: serde_json::json!({}), reasoning_signature: None },
    ]);
    let rendered = text_only(&message);
    assert_eq!(rendered, "look:\n[image omitted]");
}

#[test]
fn build_messages_splits_tool_results_into_separate_tool_role_messages() {
    let messages = vec![ConversationMessage::user_tool_results(vec![
        ContentBlock::ToolResult { tool_use_id: "call_1".to_string(), content: "done".to_string(), is_error: false },
        ContentBlock::ToolResult { tool_use_id: "call_2".to_string(), content: "fail".to_string(), is_error: true },
    ])];
    let rendered = build_messages(&messages, None);
    assert_eq!(rendered.len(), 2);
    assert_eq!(rendered[0]["role"], "tool");
    assert_eq!(rendered[0]["tool_call_id"], "call_1");
    assert_eq!(rendered[1]["tool_call_id"], "call_2");
}

#[test]
fn build_body_wraps_tool_specs_as_function_definitions() {
    let tools = vec![ToolSpec { name: "grep_search".to_string(), description: "search".to_string(), parameters_schema: serde_json::json!({"type": "object"}) }];
    let body = build_body("gpt-4o", &[], &tools, Some("sys"), &ChatOptions::default());
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["tools"][0]["type"], "function");
    assert_eq!(body["tools"][0]["function"]["name"], "grep_search");
    assert_eq!(body["stream"], true);
}
