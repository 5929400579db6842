//! Subagent types available to the `Task` tool

use std::path::Path;

use super::tools::{ToolName, ToolSet};
use crate::error::ToolError;

/// A named agent profile: which tools it may call and how it is prompted
#[derive(Debug, Clone, PartialEq)]
pub struct AgentType {
    pub name: String,
    pub description: String,
    pub allowed_tools: ToolSet,
    pub prompt: String,
}

impl AgentType {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        allowed_tools: ToolSet,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            allowed_tools,
            prompt: prompt.into(),
        }
    }

    /// System prompt for a subagent of this type working under `root`
    pub fn system_prompt(&self, root: &Path) -> String {
        format!(
            "You are a {} subagent at {}.\n\n{}\n\nComplete the task and return a clear, concise summary.",
            self.name,
            root.display(),
            self.prompt
        )
    }
}

/// Registry of agent types, looked up by name
#[derive(Debug, Clone)]
pub struct AgentCatalog {
    types: Vec<AgentType>,
}

impl AgentCatalog {
    pub fn new(types: Vec<AgentType>) -> Self {
        Self { types }
    }

    pub fn lookup(&self, name: &str) -> Result<&AgentType, ToolError> {
        self.types
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ToolError::UnknownAgentType(name.to_string()))
    }

    /// `(name, description)` pairs in registration order
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.types
            .iter()
            .map(|t| (t.name.clone(), t.description.clone()))
            .collect()
    }

    /// System prompt for the top-level agent rooted at `root`
    pub fn root_prompt(&self, root: &Path) -> String {
        let listing: Vec<String> = self
            .types
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect();
        format!(
            "You are a coding agent at {}.\n\n\
             Loop: plan -> act with tools -> report.\n\n\
             You can spawn subagents for complex subtasks:\n{}\n\n\
             Rules:\n\
             - Use Task tool for subtasks that need focused exploration or implementation\n\
             - Use TodoWrite to track multi-step work\n\
             - Prefer tools over prose. Act, don't just explain.\n\
             - After finishing, summarize what changed.",
            root.display(),
            listing.join("\n")
        )
    }
}

impl Default for AgentCatalog {
    fn default() -> Self {
        let read_only = ToolSet::only(&[ToolName::Bash, ToolName::ReadFile]);
        Self::new(vec![
            AgentType::new(
                "explore",
                "Read-only agent for exploring code, finding files, searching",
                read_only.clone(),
                "You are an exploration agent. Search and analyze, but never modify files. \
                 Return a concise summary.",
            ),
            AgentType::new(
                "code",
                "Full agent for implementing features and fixing bugs",
                ToolSet::All,
                "You are a coding agent. Implement the requested changes efficiently.",
            ),
            AgentType::new(
                "plan",
                "Planning agent for designing implementation strategies",
                read_only,
                "You are a planning agent. Analyze the codebase and output a numbered \
                 implementation plan. Do NOT make changes.",
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let catalog = AgentCatalog::default();
        let explore = catalog.lookup("explore").unwrap();
        assert!(explore.allowed_tools.allows(ToolName::ReadFile));
        assert!(!explore.allowed_tools.allows(ToolName::WriteFile));
        assert!(catalog.lookup("code").unwrap().allowed_tools.allows(ToolName::EditFile));
        assert!(!catalog.lookup("plan").unwrap().allowed_tools.allows(ToolName::EditFile));
    }

    #[test]
    fn test_unknown_type() {
        let err = AgentCatalog::default().lookup("review").unwrap_err();
        assert_eq!(err.to_string(), "Unknown agent type 'review'");
    }

    #[test]
    fn test_prompts_mention_root() {
        let catalog = AgentCatalog::default();
        let root = Path::new("/work/s1");
        let sub = catalog.lookup("plan").unwrap().system_prompt(root);
        assert!(sub.starts_with("You are a plan subagent at /work/s1."));

        let top = catalog.root_prompt(root);
        assert!(top.contains("- explore: Read-only agent"));
    }
}
