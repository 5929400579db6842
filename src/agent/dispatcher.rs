//! Tool dispatch for one agent
//!
//! A [`Dispatcher`] is built per conversation with the tool set that
//! conversation is allowed to use and its own [`TodoList`]. Checks run in
//! a fixed order: the name must be a known tool, the tool must be allowed
//! for this agent, and only then are the arguments decoded and the tool
//! executed. A rejected call touches nothing.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use super::events::{AgentEvent, EventSink};
use super::subagent::Spawner;
use super::todo::TodoList;
use super::tools::{ToolInvocation, ToolName, ToolSet};
use crate::error::ToolError;
use crate::metrics::TOOL_CALLS;
use crate::model::Tool;
use crate::workspace::{truncate_chars, Workspace, MAX_OUTPUT_CHARS};

pub struct Dispatcher {
    workspace: Arc<Workspace>,
    todo: TodoList,
    tools: ToolSet,
    agent: String,
    spawner: Option<Spawner>,
    events: Arc<dyn EventSink>,
}

impl Dispatcher {
    /// Dispatcher for an agent labelled `agent`, limited to `tools`
    ///
    /// Without a spawner the `Task` tool is neither offered nor callable.
    pub fn new(
        workspace: Arc<Workspace>,
        tools: ToolSet,
        agent: impl Into<String>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            workspace,
            todo: TodoList::new(),
            tools,
            agent: agent.into(),
            spawner: None,
            events,
        }
    }

    pub fn with_spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn set_cancellation(&mut self, cancel: CancellationToken) {
        if let Some(spawner) = self.spawner.as_mut() {
            spawner.set_cancellation(cancel);
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn todo(&self) -> &TodoList {
        &self.todo
    }

    fn allows(&self, tool: ToolName) -> bool {
        match tool {
            ToolName::Task if self.spawner.is_none() => false,
            _ => self.tools.allows(tool),
        }
    }

    /// Tools this agent may call, in registry order
    pub fn offered(&self) -> Vec<ToolName> {
        ToolName::ALL.into_iter().filter(|t| self.allows(*t)).collect()
    }

    /// Schemas sent to the model with every request
    pub fn schemas(&self) -> Vec<Tool> {
        let agent_types = self
            .spawner
            .as_ref()
            .map(|s| s.catalog().descriptions())
            .unwrap_or_default();
        self.offered()
            .into_iter()
            .map(|t| t.schema(&agent_types))
            .collect()
    }

    /// Execute one tool call
    ///
    /// `arguments` is the JSON-encoded argument object exactly as the model
    /// sent it.
    pub async fn dispatch(&mut self, name: &str, arguments: &str) -> Result<String, ToolError> {
        let tool: ToolName = match name.parse() {
            Ok(tool) => tool,
            Err(e) => {
                TOOL_CALLS.with_label_values(&["unknown", "unknown_tool"]).inc();
                return Err(e);
            }
        };

        let span = info_span!("tool_call", tool = %tool, agent = %self.agent, otel.name = "tool_call");
        let result = self.execute(tool, arguments).instrument(span).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        TOOL_CALLS.with_label_values(&[tool.as_str(), outcome]).inc();
        result
    }

    /// Like [`dispatch`](Self::dispatch), rendered as tool-message text
    ///
    /// Errors become `Error: ...`; either way the text is capped at
    /// [`MAX_OUTPUT_CHARS`].
    pub async fn dispatch_text(&mut self, name: &str, arguments: &str) -> String {
        let text = match self.dispatch(name, arguments).await {
            Ok(output) => output,
            Err(e) => format!("Error: {}", e),
        };
        truncate_chars(&text, MAX_OUTPUT_CHARS)
    }

    async fn execute(&mut self, tool: ToolName, arguments: &str) -> Result<String, ToolError> {
        if !self.allows(tool) {
            warn!(tool = %tool, agent = %self.agent, "Rejected disallowed tool call");
            return Err(ToolError::ToolNotAllowed {
                tool: tool.to_string(),
                agent: self.agent.clone(),
            });
        }

        let invocation = ToolInvocation::parse(tool, arguments)?;
        debug!(tool = %tool, "Executing tool");

        let result = match invocation {
            ToolInvocation::Bash { command } => self.workspace.run(&command).await,
            ToolInvocation::ReadFile { path, limit } => self.workspace.read(&path, limit).await,
            ToolInvocation::WriteFile { path, content } => {
                self.workspace.write(&path, &content).await
            }
            ToolInvocation::EditFile {
                path,
                old_text,
                new_text,
            } => self.workspace.edit(&path, &old_text, &new_text).await,
            ToolInvocation::TodoWrite { items } => self.todo.update(items),
            ToolInvocation::Task {
                description,
                prompt,
                agent_type,
            } => match &self.spawner {
                Some(spawner) => spawner.spawn(&agent_type, &description, &prompt).await,
                None => Err(ToolError::ToolNotAllowed {
                    tool: tool.to_string(),
                    agent: self.agent.clone(),
                }),
            },
        };

        if result.is_ok() && tool.mutates_workspace() {
            self.events.emit(AgentEvent::FilesChanged);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::events::{CollectingSink, NullSink};

    fn dispatcher(tools: ToolSet) -> (tempfile::TempDir, Dispatcher) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Arc::new(Workspace::open(dir.path()).unwrap());
        (dir, Dispatcher::new(ws, tools, "code", Arc::new(NullSink)))
    }

    #[tokio::test]
    async fn test_unknown_tool_has_no_side_effect() {
        let (dir, mut d) = dispatcher(ToolSet::All);
        let err = d
            .dispatch("delete_everything", r#"{"path":"a.txt"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_disallowed_tool_is_checked_before_arguments() {
        let (dir, mut d) = dispatcher(ToolSet::only(&[ToolName::Bash, ToolName::ReadFile]));

        let err = d
            .dispatch("write_file", r#"{"path":"x.txt","content":"data"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ToolNotAllowed { .. }));
        assert!(!dir.path().join("x.txt").exists());

        // Garbage arguments still report the permission failure
        let err = d.dispatch("edit_file", "garbage").await.unwrap_err();
        assert!(matches!(err, ToolError::ToolNotAllowed { .. }));
    }

    #[tokio::test]
    async fn test_task_unavailable_without_spawner() {
        let (_dir, mut d) = dispatcher(ToolSet::All);
        assert!(!d.offered().contains(&ToolName::Task));
        assert_eq!(d.schemas().len(), 5);

        let args = r#"{"description":"look","prompt":"look around","agent_type":"explore"}"#;
        assert!(matches!(
            d.dispatch("Task", args).await,
            Err(ToolError::ToolNotAllowed { .. })
        ));
    }

    #[tokio::test]
    async fn test_dispatch_text_formats_errors() {
        let (_dir, mut d) = dispatcher(ToolSet::All);
        let text = d.dispatch_text("read_file", r#"{"path":"missing.txt"}"#).await;
        assert_eq!(text, "Error: File not found: missing.txt");
    }

    #[tokio::test]
    async fn test_mutating_tools_emit_files_changed() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Arc::new(Workspace::open(dir.path()).unwrap());
        let sink = Arc::new(CollectingSink::new());
        let mut d = Dispatcher::new(ws, ToolSet::All, "code", sink.clone());

        d.dispatch("write_file", r#"{"path":"a.txt","content":"x"}"#).await.unwrap();
        d.dispatch("read_file", r#"{"path":"a.txt"}"#).await.unwrap();

        let changes = sink
            .events()
            .into_iter()
            .filter(|e| *e == AgentEvent::FilesChanged)
            .count();
        assert_eq!(changes, 1);
    }

    #[tokio::test]
    async fn test_todo_state_is_per_dispatcher() {
        let (_dir, mut a) = dispatcher(ToolSet::All);
        let (_dir2, b) = dispatcher(ToolSet::All);
        let args = r#"{"items":[{"content":"build","status":"pending","activeForm":"Building"}]}"#;
        a.dispatch("TodoWrite", args).await.unwrap();
        assert_eq!(a.todo().items().len(), 1);
        assert!(b.todo().items().is_empty());
    }
}
