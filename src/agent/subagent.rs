//! The `Task` tool: delegate a subtask to an isolated child agent
//!
//! A child starts from a brand-new history holding only its type's system
//! prompt and the delegated prompt. It shares the workspace with its parent
//! but has its own task list, and it cannot delegate further. The parent
//! waits for the child to finish and gets back only its final text.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::catalog::{AgentCatalog, AgentType};
use super::controller::{AgentConfig, AgentController};
use super::dispatcher::Dispatcher;
use super::events::{AgentEvent, EventSink, LogStyle};
use super::tools::{ToolName, ToolSet};
use crate::error::ToolError;
use crate::model::ModelClient;
use crate::workspace::Workspace;

/// Returned to the parent when a child finishes without any text
pub const NO_SUBAGENT_TEXT: &str = "(subagent returned no text)";

/// Everything needed to build agents over one workspace
#[derive(Clone)]
pub struct Spawner {
    client: Arc<dyn ModelClient>,
    catalog: Arc<AgentCatalog>,
    workspace: Arc<Workspace>,
    config: AgentConfig,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl Spawner {
    pub fn new(
        client: Arc<dyn ModelClient>,
        catalog: Arc<AgentCatalog>,
        workspace: Arc<Workspace>,
        config: AgentConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            client,
            catalog,
            workspace,
            config,
            events,
            cancel: CancellationToken::new(),
        }
    }

    /// Tie every agent built from here to `cancel`
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn set_cancellation(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }

    /// The top-level agent: every tool, including `Task`
    pub fn root_agent(&self) -> AgentController {
        let dispatcher = Dispatcher::new(
            self.workspace.clone(),
            ToolSet::All,
            "root",
            self.events.clone(),
        )
        .with_spawner(self.clone());

        let system_prompt = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(|| self.catalog.root_prompt(self.workspace.root()));

        AgentController::new(
            self.client.clone(),
            dispatcher,
            self.config.clone(),
            self.events.clone(),
            system_prompt,
        )
        .with_cancellation(self.cancel.clone())
    }

    /// Child agent of type `kind` with `prompt` as its only user message
    pub fn build_child(&self, kind: &AgentType, prompt: &str) -> AgentController {
        let dispatcher = Dispatcher::new(
            self.workspace.clone(),
            kind.allowed_tools.without(ToolName::Task),
            kind.name.clone(),
            self.events.clone(),
        );

        let mut child = AgentController::new(
            self.client.clone(),
            dispatcher,
            self.config.clone(),
            self.events.clone(),
            kind.system_prompt(self.workspace.root()),
        )
        .with_max_tokens(self.config.subagent_max_output_tokens)
        .with_cancellation(self.cancel.child_token());
        child.push_user(prompt);
        child
    }

    /// Run a child agent to completion and return its final text
    ///
    /// Boxed because the child's loop may itself dispatch through a
    /// `Dispatcher`, which makes the future type recursive.
    pub fn spawn<'a>(
        &'a self,
        agent_type: &'a str,
        description: &'a str,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<String, ToolError>> {
        async move {
            let kind = self.catalog.lookup(agent_type)?;
            info!(agent_type = %kind.name, description, "Spawning subagent");
            self.events.emit(AgentEvent::log(
                LogStyle::Info,
                format!("[{}] {}", kind.name, description),
            ));

            let mut child = self.build_child(kind, prompt);
            let result = child
                .run()
                .await
                .map_err(|e| ToolError::Subagent(e.to_string()))?;

            if result.final_response.trim().is_empty() {
                Ok(NO_SUBAGENT_TEXT.to_string())
            } else {
                Ok(result.final_response)
            }
        }
        .boxed()
    }
}
