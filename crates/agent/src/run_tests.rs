use std::sync::Arc;

use drape_container::FakeContainerDriver;
use drape_core::{BudgetTable, FakeClock, ProjectId, UserId};
use drape_providers::test_support::FakeChatProvider;
use drape_providers::{ChunkUsage, ModelRegistry, ProviderKind, StopReason, StreamChunk, ToolCall};
use drape_storage::{SessionRegistry, UsageLedger};
use drape_tools::web_search::FakeWebSearchProvider;
use drape_tools::ToolDispatcher;
use drape_workspace::{OrchestratorConfig, WorkspaceOrchestrator};
use futures::StreamExt;

use super::*;

async fn runner_with(
    provider: FakeChatProvider,
) -> (Arc<AgentRunner<FakeContainerDriver, FakeClock>>, tempfile::TempDir, UsageLedger) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let driver = Arc::new(FakeContainerDriver::new());
    let registry = SessionRegistry::load(tmp.path().join("registry.json")).await;
    let config = OrchestratorConfig {
        projects_root: tmp.path().join("projects"),
        cache_root: tmp.path().join("cache"),
        idle_timeout: chrono::Duration::minutes(20),
        container_ready_timeout_ms: 1_000,
        public_host: "example.test".to_string(),
        public_port: 9999,
    };
    let orchestrator = Arc::new(WorkspaceOrchestrator::new(driver, registry, config));
    let web_search = Arc::new(FakeWebSearchProvider { response: "scripted search result".to_string() });
    let dispatcher = Arc::new(ToolDispatcher::new(orchestrator.clone(), web_search));

    let mut providers = ProviderSet::new();
    providers.insert(ProviderKind::Anthropic, Arc::new(provider));

    let mut model_registry = ModelRegistry::with_defaults();
    // `with_defaults` already registers "claude-sonnet" against Anthropic.
    let _ = &mut model_registry;

    let ledger = UsageLedger::load(tmp.path().join("usage.jsonl")).await;
    let runner = AgentRunner::new(
        providers,
        Arc::new(model_registry),
        dispatcher,
        orchestrator,
        ledger.clone(),
        Arc::new(BudgetTable::default()),
        FakeClock::new(),
    );
    (Arc::new(runner), tmp, ledger)
}

fn tool_use_chunks(id: &str, name: &str, input: serde_json::Value) -> Vec<StreamChunk> {
    vec![
        StreamChunk::ToolStart { id: id.to_string(), name: name.to_string() },
        StreamChunk::ToolUse { id: id.to_string(), name: name.to_string(), input: input.clone(), reasoning_signature: None },
        StreamChunk::Done {
            full_text: String::new(),
            tool_calls: vec![ToolCall { id: id.to_string(), name: name.to_string(), input, reasoning_signature: None }],
            stop_reason: StopReason::ToolUse,
            usage: ChunkUsage { input_tokens: 100, output_tokens: 20, cached_tokens: 0, cache_creation_tokens: 0 },
        },
    ]
}

fn text_only_chunks(text: &str) -> Vec<StreamChunk> {
    vec![
        StreamChunk::Text { delta: text.to_string() },
        StreamChunk::Done {
            full_text: text.to_string(),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: ChunkUsage { input_tokens: 50, output_tokens: 10, cached_tokens: 0, cache_creation_tokens: 0 },
        },
    ]
}

#[tokio::test]
async fn oscillation_guard_stops_after_five_identical_tool_calls() {
    let provider = FakeChatProvider::repeating(tool_use_chunks("call-1", "read_file", serde_json::json!({"file_path": "a.txt"})));
    let (runner, tmp, _ledger) = runner_with(provider).await;
    tokio::fs::create_dir_all(tmp.path().join("projects").join("proj-a")).await.expect("mkdir");

    let request = RunRequest {
        user_id: UserId::new("alice"),
        project_id: ProjectId::new("proj-a"),
        mode: AgentMode::Execute,
        model: "claude-sonnet".to_string(),
        plan: drape_core::Plan::Pro,
        prompt: "read the file repeatedly".to_string(),
        images: vec![],
    };

    let mut events = Vec::new();
    let mut stream = runner.run(request);
    while let Some(event) = stream.next().await {
        let is_terminal = event.is_terminal();
        events.push(event);
        if is_terminal {
            break;
        }
    }

    let tool_complete_count = events.iter().filter(|e| matches!(e, AgentEvent::ToolComplete { .. })).count();
    assert_eq!(tool_complete_count, 5, "oscillation guard must let exactly 5 iterations through");

    match events.last() {
        Some(AgentEvent::Error { error }) => assert!(error.contains("stuck in a loop calling read_file")),
        other => panic!("expected a terminal error event, got {other:?}"),
    }

    assert!(matches!(events.first(), Some(AgentEvent::Start { .. })));
}

#[tokio::test]
async fn budget_exceeded_stops_before_any_model_call() {
    let provider = FakeChatProvider::new();
    let (runner, tmp, ledger) = runner_with(provider).await;
    tokio::fs::create_dir_all(tmp.path().join("projects").join("proj-b")).await.expect("mkdir");

    // Drive the ledger over the `free` plan's budget before running.
    let entry = drape_core::AIUsageEntry {
        user_id: UserId::new("bob"),
        model: "claude-sonnet".to_string(),
        input_tokens: 0,
        output_tokens: 0,
        cached_tokens: 0,
        cost_eur: 999.0,
        timestamp: chrono::Utc::now(),
    };
    ledger.append(entry).await.expect("append usage");

    let request = RunRequest {
        user_id: UserId::new("bob"),
        project_id: ProjectId::new("proj-b"),
        mode: AgentMode::Fast,
        model: "claude-sonnet".to_string(),
        plan: drape_core::Plan::Free,
        prompt: "do anything".to_string(),
        images: vec![],
    };

    let events: Vec<_> = runner.run(request).collect().await;
    assert_eq!(events.len(), 2, "expected exactly start + budget_exceeded, got {events:?}");
    assert!(matches!(events[0], AgentEvent::Start { .. }));
    assert!(matches!(events[1], AgentEvent::BudgetExceeded { plan: Some(ref p), .. } if p == "free"));
}

#[tokio::test]
async fn ask_user_question_pauses_then_emits_a_trailing_done() {
    let provider = FakeChatProvider::repeating(tool_use_chunks(
        "call-1",
        "ask_user_question",
        serde_json::json!({"questions": [{"question": "Use Postgres or SQLite?", "options": ["Postgres", "SQLite"]}]}),
    ));
    let (runner, tmp, _ledger) = runner_with(provider).await;
    tokio::fs::create_dir_all(tmp.path().join("projects").join("proj-d")).await.expect("mkdir");

    let request = RunRequest {
        user_id: UserId::new("dave"),
        project_id: ProjectId::new("proj-d"),
        mode: AgentMode::Execute,
        model: "claude-sonnet".to_string(),
        plan: drape_core::Plan::Pro,
        prompt: "pick a database".to_string(),
        images: vec![],
    };

    let events: Vec<_> = runner.run(request).collect().await;
    assert!(matches!(events.iter().rev().nth(1), Some(AgentEvent::AskUserQuestion { .. })));
    assert!(
        matches!(events.last(), Some(AgentEvent::Done)),
        "stream must end with a terminal Done after a pause, got {events:?}"
    );
}

#[tokio::test]
async fn todo_write_emits_a_todo_update_event() {
    let provider = FakeChatProvider::repeating(tool_use_chunks(
        "call-1",
        "todo_write",
        serde_json::json!({"todos": [{"content": "add tests", "status": "in_progress"}]}),
    ));
    let (runner, tmp, _ledger) = runner_with(provider).await;
    tokio::fs::create_dir_all(tmp.path().join("projects").join("proj-e")).await.expect("mkdir");

    let request = RunRequest {
        user_id: UserId::new("erin"),
        project_id: ProjectId::new("proj-e"),
        mode: AgentMode::Execute,
        model: "claude-sonnet".to_string(),
        plan: drape_core::Plan::Pro,
        prompt: "track the work".to_string(),
        images: vec![],
    };

    let mut events = Vec::new();
    let mut stream = runner.run(request);
    while let Some(event) = stream.next().await {
        let is_terminal = event.is_terminal();
        events.push(event);
        if is_terminal {
            break;
        }
    }

    match events.iter().find(|e| matches!(e, AgentEvent::TodoUpdate { .. })) {
        Some(AgentEvent::TodoUpdate { todos }) => {
            assert_eq!(todos.len(), 1);
            assert_eq!(todos[0].content, "add tests");
        }
        other => panic!("expected a TodoUpdate event, got {other:?}"),
    }
}

#[tokio::test]
async fn no_tool_calls_completes_on_first_iteration() {
    let provider = FakeChatProvider::repeating(text_only_chunks("all done"));
    let (runner, tmp, _ledger) = runner_with(provider).await;
    tokio::fs::create_dir_all(tmp.path().join("projects").join("proj-c")).await.expect("mkdir");

    let request = RunRequest {
        user_id: UserId::new("carol"),
        project_id: ProjectId::new("proj-c"),
        mode: AgentMode::Fast,
        model: "claude-sonnet".to_string(),
        plan: drape_core::Plan::Team,
        prompt: "say hello".to_string(),
        images: vec![],
    };

    let events: Vec<_> = runner.run(request).collect().await;
    assert!(matches!(events.first(), Some(AgentEvent::Start { .. })));
    match events.last() {
        Some(AgentEvent::Complete { result, iterations, .. }) => {
            assert_eq!(result, "all done");
            assert_eq!(*iterations, 1);
        }
        other => panic!("expected Complete, got {other:?}"),
    }
}
