//! Recoverable tool failures
//!
//! Every variant here is fed back to the model as an `Error: ...` tool
//! result. The only fatal failure class is [`AgentError`], which lives with
//! the conversation loop.
//!
//! [`AgentError`]: crate::agent::AgentError

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Path escapes workspace: {0}")]
    PathEscape(String),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Text not found in {0}")]
    TextNotFound(String),
    #[error("Dangerous command blocked (matched '{0}')")]
    DangerousCommand(String),
    #[error("Command timed out after {0} seconds")]
    Timeout(u64),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool '{tool}' is not allowed for {agent} agents")]
    ToolNotAllowed { tool: String, agent: String },
    #[error("Unknown agent type '{0}'")]
    UnknownAgentType(String),
    #[error("{0}")]
    Validation(String),
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("Subagent failed: {0}")]
    Subagent(String),
    #[error("{0}")]
    Io(#[from] io::Error),
}

impl ToolError {
    pub fn invalid_arguments(tool: impl Into<String>, reason: impl ToString) -> Self {
        ToolError::InvalidArguments {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::PathEscape(_) => "path_escape",
            ToolError::NotFound(_) => "not_found",
            ToolError::TextNotFound(_) => "text_not_found",
            ToolError::DangerousCommand(_) => "dangerous_command",
            ToolError::Timeout(_) => "timeout",
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::ToolNotAllowed { .. } => "tool_not_allowed",
            ToolError::UnknownAgentType(_) => "unknown_agent_type",
            ToolError::Validation(_) => "validation",
            ToolError::InvalidArguments { .. } => "invalid_arguments",
            ToolError::Subagent(_) => "subagent",
            ToolError::Io(_) => "io",
        }
    }
}
