// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The ReAct reasoning loop (spec.md §4.9): streams a model response,
//! dispatches tool calls, enforces the budget gate and oscillation guard,
//! and produces the `AgentEvent` sequence consumed by the SSE fabric.
//!
//! Implemented as an explicit channel written by a spawned task and read as
//! a `Stream` by the caller (spec.md §9's coroutine-control-flow note), so a
//! slow or disconnected SSE client naturally applies backpressure: once the
//! receiver is dropped, the next `send` fails and the loop stops before its
//! next model call.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use drape_container::ContainerDriver;
use drape_core::{
    compute_cost_eur, AIUsageEntry, AgentEvent, Clock, ContentBlock, ImageSource, Plan, ProjectId, UserId,
};
use drape_providers::{ChatOptions, ModelRegistry, StopReason, StreamChunk, ToolCall, ToolSpec};
use drape_storage::UsageLedger;
use drape_tools::{FileTouch, ToolDispatcher, ToolOutcome};
use drape_workspace::WorkspaceOrchestrator;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::constants::{FILE_LISTING_CAP, MAX_ITERATIONS};
use crate::conversation::{assistant_turn, tool_results_turn, user_turn};
use crate::mode::AgentMode;
use crate::oscillation::OscillationGuard;
use crate::prompt::{build_system_prompt, EnvironmentHints};
use crate::providers_set::ProviderSet;

pub type AgentEventStream = Pin<Box<dyn futures::Stream<Item = AgentEvent> + Send>>;

/// One `run(prompt, images?)` invocation (spec.md §4.9).
pub struct RunRequest {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub mode: AgentMode,
    pub model: String,
    pub plan: Plan,
    pub prompt: String,
    pub images: Vec<ImageSource>,
}

pub struct AgentRunner<D: ContainerDriver + 'static, C: Clock + 'static> {
    providers: ProviderSet,
    registry: Arc<ModelRegistry>,
    dispatcher: Arc<ToolDispatcher<D>>,
    orchestrator: Arc<WorkspaceOrchestrator<D>>,
    usage_ledger: UsageLedger,
    budgets: Arc<drape_core::BudgetTable>,
    clock: C,
}

impl<D: ContainerDriver + 'static, C: Clock + 'static> AgentRunner<D, C> {
    pub fn new(
        providers: ProviderSet,
        registry: Arc<ModelRegistry>,
        dispatcher: Arc<ToolDispatcher<D>>,
        orchestrator: Arc<WorkspaceOrchestrator<D>>,
        usage_ledger: UsageLedger,
        budgets: Arc<drape_core::BudgetTable>,
        clock: C,
    ) -> Self {
        Self { providers, registry, dispatcher, orchestrator, usage_ledger, budgets, clock }
    }

    /// `run(prompt, images?)` (spec.md §4.9): returns a lazy sequence of
    /// `AgentEvent`. The returned stream ends with exactly one of `done`,
    /// `complete`, `error`, `budget_exceeded`, or `fatal_error`, unless the
    /// caller drops it first (client disconnect).
    pub fn run(self: Arc<Self>, request: RunRequest) -> AgentEventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            self.drive(request, &tx).await;
        });
        Box::pin(UnboundedReceiverStream::new(rx))
    }

    /// `executeTool(toolName, input)` (spec.md §4.9): a secondary entry
    /// point outside any loop, delegated straight to the dispatcher.
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        input: &serde_json::Value,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> drape_tools::ToolCallResult {
        self.dispatcher.execute_tool(tool_name, input, user_id, project_id).await
    }

    async fn drive(&self, request: RunRequest, tx: &mpsc::UnboundedSender<AgentEvent>) {
        let model_spec = match self.registry.resolve(&request.model) {
            Ok(spec) => spec.clone(),
            Err(err) => {
                let _ = tx.send(AgentEvent::FatalError { error: err.to_string(), stack: String::new() });
                return;
            }
        };

        if tx
            .send(AgentEvent::Start {
                mode: request.mode.to_string(),
                project_id: request.project_id.to_string(),
                model: request.model.clone(),
            })
            .is_err()
        {
            return;
        }

        // Step 2: budget gate, before any model call.
        let now = self.clock.utc_now();
        match crate::budget::check(&self.usage_ledger, &self.budgets, &request.user_id, request.plan, now) {
            crate::budget::BudgetVerdict::Exceeded { percent_used } => {
                let _ = tx.send(AgentEvent::BudgetExceeded {
                    percent_used: Some(percent_used),
                    plan: Some(request.plan.wire_name().to_string()),
                    message: None,
                });
                return;
            }
            crate::budget::BudgetVerdict::Ok => {}
        }

        // Step 3: obtain or create the container.
        let session = match self.orchestrator.get_or_create_container(&request.user_id, &request.project_id).await {
            Ok(session) => session,
            Err(err) => {
                let _ = tx.send(AgentEvent::FatalError { error: err.to_string(), stack: String::new() });
                return;
            }
        };

        // Step 4: system prompt — mode base, truncated file listing, env hints.
        let file_listing =
            self.orchestrator.list_files(&request.project_id, None, true).await.unwrap_or_default();
        let truncated: Vec<String> = file_listing.into_iter().take(FILE_LISTING_CAP).collect();
        let hints = EnvironmentHints {
            project_dir: drape_workspace::CONTAINER_PROJECT_DIR,
            agent_url: &session.agent_url,
            project_info: session.project_info.as_ref(),
        };
        let system_prompt = build_system_prompt(request.mode, &truncated, &hints);

        let provider = match self.providers.get(model_spec.provider) {
            Ok(provider) => provider.clone(),
            Err(err) => {
                let _ = tx.send(AgentEvent::FatalError { error: err.to_string(), stack: String::new() });
                return;
            }
        };

        let tool_specs = tool_specs();
        let mut history = vec![user_turn(&request.prompt, &request.images)];
        let mut oscillation = OscillationGuard::new();
        let mut total_tokens: u64 = 0;
        let mut files_created: Vec<String> = Vec::new();
        let mut files_modified: Vec<String> = Vec::new();
        let mut created_set: HashSet<String> = HashSet::new();

        let options = ChatOptions { max_tokens: Some(model_spec.max_tokens), temperature: None };

        for iteration in 1..=MAX_ITERATIONS {
            if tx.send(AgentEvent::IterationStart { iteration, max_iterations: MAX_ITERATIONS }).is_err() {
                return;
            }

            let stream_result =
                provider.chat_stream(&model_spec.model_id, &history, &tool_specs, Some(&system_prompt), &options).await;
            let mut stream = match stream_result {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = tx.send(AgentEvent::Error { error: format!("AI error: {err}") });
                    return;
                }
            };

            let mut full_text = String::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();
            let mut thinking_open = false;
            let mut done_payload = None;

            loop {
                let Some(chunk) = stream.next().await else { break };
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = tx.send(AgentEvent::Error { error: format!("AI error: {err}") });
                        return;
                    }
                };

                match chunk {
                    StreamChunk::ThinkingStart => {
                        thinking_open = true;
                        if tx.send(AgentEvent::Thinking { delta: String::new(), start: Some(true), end: None }).is_err() {
                            return;
                        }
                    }
                    StreamChunk::Thinking { delta } => {
                        if tx.send(AgentEvent::Thinking { delta, start: None, end: None }).is_err() {
                            return;
                        }
                    }
                    StreamChunk::ThinkingEnd => {
                        thinking_open = false;
                        if tx.send(AgentEvent::Thinking { delta: String::new(), start: None, end: Some(true) }).is_err() {
                            return;
                        }
                    }
                    StreamChunk::Text { delta } => {
                        if thinking_open {
                            thinking_open = false;
                            if tx.send(AgentEvent::Thinking { delta: String::new(), start: None, end: Some(true) }).is_err()
                            {
                                return;
                            }
                        }
                        full_text.push_str(&delta);
                        if tx.send(AgentEvent::TextDelta { delta }).is_err() {
                            return;
                        }
                    }
                    StreamChunk::ToolStart { id, name } => {
                        if tx.send(AgentEvent::ToolStart { id, tool: name }).is_err() {
                            return;
                        }
                    }
                    StreamChunk::ToolUse { id, name, input, reasoning_signature } => {
                        if tx.send(AgentEvent::ToolInput { id: id.clone(), partial_json: input.to_string() }).is_err() {
                            return;
                        }
                        tool_calls.push(ToolCall { id, name, input, reasoning_signature });
                    }
                    StreamChunk::Done { full_text: text, tool_calls: calls, stop_reason, usage } => {
                        if !text.is_empty() {
                            full_text = text;
                        }
                        if tool_calls.is_empty() {
                            tool_calls = calls;
                        }
                        done_payload = Some((stop_reason, usage));
                    }
                }
            }

            let Some((_stop_reason, usage)) = done_payload else {
                let _ = tx.send(AgentEvent::Error { error: "AI error: stream ended without a done chunk".to_string() });
                return;
            };

            // Record usage and cost for this iteration.
            let cost_eur =
                compute_cost_eur(&model_spec.price, usage.input_tokens, usage.cached_tokens, usage.output_tokens);
            let entry = AIUsageEntry {
                user_id: request.user_id.clone(),
                model: request.model.clone(),
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                cached_tokens: usage.cached_tokens,
                cost_eur,
                timestamp: self.clock.utc_now(),
            };
            if let Err(err) = self.usage_ledger.append(entry).await {
                tracing::warn!(%err, "failed to persist usage entry");
            }
            total_tokens += usage.input_tokens + usage.output_tokens;

            history.push(assistant_turn(&full_text, &tool_calls));

            if tool_calls.is_empty() {
                let _ = tx.send(AgentEvent::Complete {
                    result: full_text,
                    files_created,
                    files_modified,
                    tokens_used: total_tokens,
                    iterations: iteration,
                });
                return;
            }

            let mut result_blocks = Vec::with_capacity(tool_calls.len());
            let mut should_stop: Option<AgentEvent> = None;

            for call in &tool_calls {
                let outcome = self
                    .dispatcher
                    .execute(&call.name, &call.input, &request.user_id, &request.project_id)
                    .await;

                if let Some(touch) = &outcome.file_touch {
                    match touch {
                        FileTouch::Written(path) => {
                            if created_set.insert(path.clone()) {
                                files_created.push(path.clone());
                            } else if !files_modified.contains(path) {
                                files_modified.push(path.clone());
                            }
                        }
                        FileTouch::Edited(path) => {
                            if !files_modified.contains(path) {
                                files_modified.push(path.clone());
                            }
                        }
                    }
                }

                if let Some(todos) = outcome.todos {
                    if tx.send(AgentEvent::TodoUpdate { todos }).is_err() {
                        return;
                    }
                }

                match outcome.outcome {
                    ToolOutcome::Pause(questions) => {
                        result_blocks.push(ContentBlock::ToolResult {
                            tool_use_id: call.id.clone(),
                            content: "waiting for user input".to_string(),
                            is_error: false,
                        });
                        should_stop = Some(AgentEvent::AskUserQuestion { questions });
                        break;
                    }
                    ToolOutcome::Complete(result) => {
                        result_blocks.push(ContentBlock::ToolResult {
                            tool_use_id: call.id.clone(),
                            content: result.clone(),
                            is_error: false,
                        });
                        should_stop = Some(AgentEvent::Complete {
                            result,
                            files_created: files_created.clone(),
                            files_modified: files_modified.clone(),
                            tokens_used: total_tokens,
                            iterations: iteration,
                        });
                        break;
                    }
                    ToolOutcome::Ok(content) => {
                        if tx
                            .send(AgentEvent::ToolComplete {
                                id: call.id.clone(),
                                tool: call.name.clone(),
                                result: content.clone(),
                                success: true,
                                input: call.input.clone(),
                            })
                            .is_err()
                        {
                            return;
                        }
                        result_blocks.push(ContentBlock::ToolResult {
                            tool_use_id: call.id.clone(),
                            content,
                            is_error: false,
                        });
                    }
                    ToolOutcome::Error(message) => {
                        if tx
                            .send(AgentEvent::ToolError { id: call.id.clone(), tool: call.name.clone(), error: message.clone() })
                            .is_err()
                        {
                            return;
                        }
                        result_blocks.push(ContentBlock::ToolResult {
                            tool_use_id: call.id.clone(),
                            content: format!("Error: {message}"),
                            is_error: true,
                        });
                    }
                }
            }

            history.push(tool_results_turn(result_blocks));

            if let Some(stop_event) = should_stop {
                // `ask_user_question` is not itself a terminal event (the run
                // pauses rather than finishes) — follow it with `Done` so
                // every stream still ends with a terminal frame, per
                // spec.md §4.10 / §8 testable property 6.
                let is_pause = matches!(stop_event, AgentEvent::AskUserQuestion { .. });
                let _ = tx.send(stop_event);
                if is_pause {
                    let _ = tx.send(AgentEvent::Done);
                }
                return;
            }

            // Oscillation guard: only the first tool call of the iteration
            // counts, checked after dispatch so a stuck run's final
            // iteration still completes its tool call before the loop
            // reports the error.
            let first_tool_name = tool_calls.first().map(|c| c.name.as_str());
            if let Some(stuck_on) = oscillation.record(first_tool_name) {
                let _ = tx.send(AgentEvent::Error { error: format!("stuck in a loop calling {stuck_on}") });
                return;
            }
        }

        let _ = tx.send(AgentEvent::BudgetExceeded {
            percent_used: None,
            plan: None,
            message: Some("Maximum iterations reached".to_string()),
        });
    }
}

/// Render the closed tool set as the provider-agnostic `ToolSpec` shape
/// every `ChatProvider` adapter converts into its own wire format.
fn tool_specs() -> Vec<ToolSpec> {
    drape_tools::tool_descriptors()
        .into_iter()
        .map(|d| ToolSpec { name: d.name.to_string(), description: d.description.to_string(), parameters_schema: d.input_schema })
        .collect()
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
