//! Agent Controller - the conversation loop
//!
//! The controller owns one message history. Each turn it sends the history
//! and the tool schemas to the model, appends the reply, and answers every
//! tool call in that reply in order before asking the model again. A reply
//! without tool calls ends the run.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::dispatcher::Dispatcher;
use super::events::{AgentEvent, EventSink, LogStyle};
use crate::metrics::{AGENT_RUNS, AGENT_TURNS, MODEL_CALL_DURATION};
use crate::model::{ChatError, ChatMessage, ModelClient, ModelRequest};

/// Configuration for the agent controller
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier sent with every request
    pub model: String,
    /// Maximum number of model invocations in one run
    pub max_turns: usize,
    /// `max_tokens` for the top-level agent
    pub max_output_tokens: u32,
    /// `max_tokens` for subagents
    pub subagent_max_output_tokens: u32,
    /// Wall-clock budget for one shell command
    pub command_timeout_secs: u64,
    /// Custom system prompt for the top-level agent (built from the catalog if None)
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-v3-2-251201".to_string(),
            max_turns: 50,
            max_output_tokens: 32 * 1024,
            subagent_max_output_tokens: 8000,
            command_timeout_secs: 60,
            system_prompt: None,
        }
    }
}

/// Result of an agent run
#[derive(Debug, Clone)]
pub struct AgentResult {
    /// Text of the last assistant message
    pub final_response: String,
    /// Number of model invocations made
    pub turns: usize,
    /// Number of tool calls answered
    pub tool_calls_made: usize,
    /// Unique trace ID for this run
    pub trace_id: String,
}

/// Fatal failures of a run; tool failures never end up here
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Model call failed: {0}")]
    Model(#[from] ChatError),
    #[error("Stopped after {0} turns without a final answer")]
    TurnLimit(usize),
    #[error("Agent run cancelled")]
    Cancelled,
}

impl AgentError {
    fn outcome(&self) -> &'static str {
        match self {
            AgentError::Model(_) => "model_error",
            AgentError::TurnLimit(_) => "turn_limit",
            AgentError::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    AwaitingModel,
    Done,
}

struct TurnOutcome {
    state: DriverState,
    tool_calls: usize,
}

pub struct AgentController {
    client: Arc<dyn ModelClient>,
    dispatcher: Dispatcher,
    config: AgentConfig,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
    history: Vec<ChatMessage>,
    max_tokens: u32,
}

impl AgentController {
    /// Create a controller whose history starts with `system_prompt`
    pub fn new(
        client: Arc<dyn ModelClient>,
        dispatcher: Dispatcher,
        config: AgentConfig,
        events: Arc<dyn EventSink>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let max_tokens = config.max_output_tokens;
        Self {
            client,
            dispatcher,
            config,
            events,
            cancel: CancellationToken::new(),
            history: vec![ChatMessage::system(system_prompt)],
            max_tokens,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.set_cancellation(cancel);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Replace the cancellation token, e.g. before each interactive turn
    ///
    /// Subagents spawned afterwards are cancelled along with this agent.
    pub fn set_cancellation(&mut self, cancel: CancellationToken) {
        self.dispatcher.set_cancellation(cancel.clone());
        self.cancel = cancel;
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::user(content));
    }

    /// Append `content` as a user message and run until the model is done
    pub async fn send(&mut self, content: &str) -> Result<AgentResult, AgentError> {
        self.push_user(content);
        self.run().await
    }

    /// Drive the loop from the current history until a reply has no tool calls
    pub async fn run(&mut self) -> Result<AgentResult, AgentError> {
        let trace_id = Uuid::now_v7().to_string();
        let agent = self.dispatcher.agent().to_string();

        let root_span = info_span!(
            "agent_run",
            trace_id = %trace_id,
            agent = %agent,
            model = %self.config.model,
            otel.name = "agent_run"
        );

        let result = self.run_loop(&trace_id).instrument(root_span).await;

        match &result {
            Ok(r) => {
                info!(trace_id = %trace_id, agent = %agent, turns = r.turns, tool_calls = r.tool_calls_made, "Agent run completed");
                AGENT_RUNS.with_label_values(&[&agent, "success"]).inc();
                AGENT_TURNS.observe(r.turns as f64);
            }
            Err(e) => {
                warn!(trace_id = %trace_id, agent = %agent, error = %e, "Agent run failed");
                AGENT_RUNS.with_label_values(&[&agent, e.outcome()]).inc();
            }
        }
        result
    }

    async fn run_loop(&mut self, trace_id: &str) -> Result<AgentResult, AgentError> {
        let mut turns = 0;
        let mut tool_calls_made = 0;

        loop {
            if turns >= self.config.max_turns {
                return Err(AgentError::TurnLimit(turns));
            }
            turns += 1;

            let outcome = self.advance(turns).await?;
            tool_calls_made += outcome.tool_calls;

            if outcome.state == DriverState::Done {
                let final_response = self
                    .history
                    .last()
                    .map(|m| m.text().to_string())
                    .unwrap_or_default();
                return Ok(AgentResult {
                    final_response,
                    turns,
                    tool_calls_made,
                    trace_id: trace_id.to_string(),
                });
            }
        }
    }

    /// One turn: ask the model, then answer each of its tool calls in order
    async fn advance(&mut self, turn: usize) -> Result<TurnOutcome, AgentError> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let request = ModelRequest {
            model: self.config.model.clone(),
            messages: self.history.clone(),
            tools: self.dispatcher.schemas(),
            max_tokens: self.max_tokens,
        };

        let model_span = info_span!(
            "model_call",
            turn,
            model = %self.config.model,
            otel.name = "model_call"
        );
        let start = Instant::now();
        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AgentError::Cancelled),
            response = self.client.complete(&request).instrument(model_span) => response?,
        };
        let elapsed = start.elapsed().as_secs_f64();
        MODEL_CALL_DURATION
            .with_label_values(&[&self.config.model])
            .observe(elapsed);
        debug!(turn, duration_secs = elapsed, finish_reason = ?response.finish_reason, "Model call completed");

        let wants_tools = response.wants_tools();
        let message = response.message;
        if !message.text().trim().is_empty() {
            self.events
                .emit(AgentEvent::log(LogStyle::Assistant, message.text()));
        }
        let calls = message.tool_calls.clone();
        self.history.push(message);

        if !wants_tools {
            return Ok(TurnOutcome {
                state: DriverState::Done,
                tool_calls: 0,
            });
        }

        for call in &calls {
            self.events
                .emit(AgentEvent::tool_call(&call.function.name, &call.function.arguments));
            let output = self
                .dispatcher
                .dispatch_text(&call.function.name, &call.function.arguments)
                .await;
            self.events.emit(AgentEvent::tool_output(&output));
            self.history.push(ChatMessage::tool(call.id.clone(), output));
        }

        Ok(TurnOutcome {
            state: DriverState::AwaitingModel,
            tool_calls: calls.len(),
        })
    }
}
