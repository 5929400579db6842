//! agentbox - a tool-calling coding agent over a sandboxed workspace
//!
//! A language model drives a loop of tool calls (shell commands, file
//! reads/writes/edits, a task list, and delegation to isolated subagents)
//! against one workspace directory until it has nothing left to do. The
//! same engine runs as an interactive CLI and as a multi-session websocket
//! service.
//!
//! # Modules
//!
//! - `model` - chat-completions contract and clients
//! - `workspace` - path sandbox, file tools, command execution, tree/zip helpers
//! - `security` - best-effort command deny-list
//! - `agent` - conversation loop, tool dispatch, task list, subagents
//! - `server` - session manager, websocket protocol, HTTP routes
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - logging and OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use agentbox::agent::{AgentCatalog, AgentConfig, NullSink, Spawner};
//! use agentbox::model::ChatClient;
//! use agentbox::workspace::Workspace;
//!
//! let client = Arc::new(ChatClient::new("https://api.openai.com/v1", Some(key))?);
//! let workspace = Arc::new(Workspace::open("./project")?);
//! let spawner = Spawner::new(client, Arc::new(AgentCatalog::default()), workspace,
//!     AgentConfig::default(), Arc::new(NullSink));
//! let mut agent = spawner.root_agent();
//! let result = agent.send("add a README").await?;
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod security;
pub mod server;
pub mod tracing;
pub mod workspace;

pub use agent::{AgentConfig, AgentController, AgentError};
pub use error::ToolError;
pub use workspace::Workspace;
