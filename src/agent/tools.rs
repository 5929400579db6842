//! The closed set of tools an agent can call
//!
//! [`ToolName`] is the registry: a name the model sends either parses into
//! one of these variants or is an unknown tool. [`ToolInvocation`] carries
//! the decoded arguments, one variant per tool, so dispatch is a single
//! exhaustive match.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::json;

use super::todo::TodoDraft;
use crate::error::ToolError;
use crate::model::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    Bash,
    ReadFile,
    WriteFile,
    EditFile,
    TodoWrite,
    Task,
}

impl ToolName {
    pub const ALL: [ToolName; 6] = [
        ToolName::Bash,
        ToolName::ReadFile,
        ToolName::WriteFile,
        ToolName::EditFile,
        ToolName::TodoWrite,
        ToolName::Task,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::Bash => "bash",
            ToolName::ReadFile => "read_file",
            ToolName::WriteFile => "write_file",
            ToolName::EditFile => "edit_file",
            ToolName::TodoWrite => "TodoWrite",
            ToolName::Task => "Task",
        }
    }

    /// Whether a successful call may have changed files in the workspace
    pub fn mutates_workspace(self) -> bool {
        matches!(self, ToolName::Bash | ToolName::WriteFile | ToolName::EditFile)
    }

    /// JSON schema offered to the model
    ///
    /// `agent_types` lists the names accepted by `Task`; it is ignored for
    /// every other tool.
    pub fn schema(self, agent_types: &[(String, String)]) -> Tool {
        match self {
            ToolName::Bash => Tool::function(
                self.as_str(),
                "Run a shell command in the workspace root.",
                json!({
                    "type": "object",
                    "properties": {"command": {"type": "string"}},
                    "required": ["command"]
                }),
            ),
            ToolName::ReadFile => Tool::function(
                self.as_str(),
                "Read file contents.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "limit": {"type": "integer", "description": "Maximum number of lines to return"}
                    },
                    "required": ["path"]
                }),
            ),
            ToolName::WriteFile => Tool::function(
                self.as_str(),
                "Write content to a file, creating parent directories.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "content": {"type": "string"}
                    },
                    "required": ["path", "content"]
                }),
            ),
            ToolName::EditFile => Tool::function(
                self.as_str(),
                "Replace the first occurrence of exact text in a file.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "old_text": {"type": "string"},
                        "new_text": {"type": "string"}
                    },
                    "required": ["path", "old_text", "new_text"]
                }),
            ),
            ToolName::TodoWrite => Tool::function(
                self.as_str(),
                "Update the task list. Use to plan and track progress.",
                json!({
                    "type": "object",
                    "properties": {
                        "items": {
                            "type": "array",
                            "description": "Complete list of tasks (replaces existing)",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "content": {"type": "string", "description": "Task description"},
                                    "status": {
                                        "type": "string",
                                        "enum": ["pending", "in_progress", "completed"]
                                    },
                                    "activeForm": {
                                        "type": "string",
                                        "description": "Present tense action, e.g. 'Reading files'"
                                    }
                                },
                                "required": ["content", "status", "activeForm"]
                            }
                        }
                    },
                    "required": ["items"]
                }),
            ),
            ToolName::Task => {
                let names: Vec<&str> = agent_types.iter().map(|(n, _)| n.as_str()).collect();
                let listing: Vec<String> = agent_types
                    .iter()
                    .map(|(n, d)| format!("- {}: {}", n, d))
                    .collect();
                Tool::function(
                    self.as_str(),
                    format!(
                        "Spawn a subagent for a focused subtask.\n\n\
                         Subagents run in an ISOLATED context: they don't see the parent's history \
                         and only their final summary comes back.\n\nAgent types:\n{}",
                        listing.join("\n")
                    ),
                    json!({
                        "type": "object",
                        "properties": {
                            "description": {
                                "type": "string",
                                "description": "Short task name (3-5 words) for progress display"
                            },
                            "prompt": {
                                "type": "string",
                                "description": "Detailed instructions for the subagent"
                            },
                            "agent_type": {
                                "type": "string",
                                "enum": names,
                                "description": "Type of agent to spawn"
                            }
                        },
                        "required": ["description", "prompt", "agent_type"]
                    }),
                )
            }
        }
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded tool call
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", content = "arguments")]
pub enum ToolInvocation {
    #[serde(rename = "bash")]
    Bash { command: String },
    #[serde(rename = "read_file")]
    ReadFile {
        path: String,
        #[serde(default)]
        limit: Option<usize>,
    },
    #[serde(rename = "write_file")]
    WriteFile { path: String, content: String },
    #[serde(rename = "edit_file")]
    EditFile {
        path: String,
        old_text: String,
        new_text: String,
    },
    #[serde(rename = "TodoWrite")]
    TodoWrite { items: Vec<TodoDraft> },
    #[serde(rename = "Task")]
    Task {
        description: String,
        prompt: String,
        agent_type: String,
    },
}

impl ToolInvocation {
    /// Decode the JSON-encoded `arguments` of a call to `tool`
    ///
    /// Empty arguments are read as `{}` so tools with only optional fields
    /// still parse.
    pub fn parse(tool: ToolName, arguments: &str) -> Result<Self, ToolError> {
        let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
        let args: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ToolError::invalid_arguments(tool.as_str(), e))?;
        serde_json::from_value(json!({"name": tool.as_str(), "arguments": args}))
            .map_err(|e| ToolError::invalid_arguments(tool.as_str(), e))
    }
}

/// Tools an agent is allowed to call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSet {
    All,
    Only(Vec<ToolName>),
}

impl ToolSet {
    pub fn only(tools: &[ToolName]) -> Self {
        ToolSet::Only(tools.to_vec())
    }

    pub fn allows(&self, tool: ToolName) -> bool {
        match self {
            ToolSet::All => true,
            ToolSet::Only(tools) => tools.contains(&tool),
        }
    }

    /// Allowed tools in registry order
    pub fn tools(&self) -> Vec<ToolName> {
        ToolName::ALL.into_iter().filter(|t| self.allows(*t)).collect()
    }

    pub fn without(&self, excluded: ToolName) -> Self {
        ToolSet::Only(self.tools().into_iter().filter(|t| *t != excluded).collect())
    }
}
