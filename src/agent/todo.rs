//! Task list kept by an agent through the `TodoWrite` tool
//!
//! Updates are validate-then-replace: the whole new list is checked and
//! either installed wholesale or rejected, leaving the old list as it was.

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Longest list an agent may keep
pub const MAX_TODOS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "pending" => Some(TodoStatus::Pending),
            "in_progress" => Some(TodoStatus::InProgress),
            "completed" => Some(TodoStatus::Completed),
            _ => None,
        }
    }

    fn glyph(self) -> &'static str {
        match self {
            TodoStatus::Pending => "[ ]",
            TodoStatus::InProgress => "[>]",
            TodoStatus::Completed => "[x]",
        }
    }
}

/// A validated task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
    /// Present-tense label, e.g. "Running tests"
    #[serde(rename = "activeForm")]
    pub active_form: String,
}

/// An item as the model sent it, before validation
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TodoDraft {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "activeForm")]
    pub active_form: String,
}

impl TodoDraft {
    pub fn new(content: &str, status: &str, active_form: &str) -> Self {
        Self {
            content: content.to_string(),
            status: status.to_string(),
            active_form: active_form.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoList {
    items: Vec<TodoItem>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    /// Replace the whole list with `drafts` and return its rendering
    ///
    /// Fails with `ToolError::Validation` if any item is malformed, the list
    /// is longer than [`MAX_TODOS`], or more than one item is in progress.
    pub fn update(&mut self, drafts: Vec<TodoDraft>) -> Result<String, ToolError> {
        if drafts.len() > MAX_TODOS {
            return Err(ToolError::Validation(format!(
                "Max {} todos allowed, got {}",
                MAX_TODOS,
                drafts.len()
            )));
        }

        let mut validated = Vec::with_capacity(drafts.len());
        for (i, draft) in drafts.into_iter().enumerate() {
            let content = draft.content.trim();
            let active_form = draft.active_form.trim();
            if content.is_empty() {
                return Err(ToolError::Validation(format!("Item {}: content required", i)));
            }
            if active_form.is_empty() {
                return Err(ToolError::Validation(format!("Item {}: activeForm required", i)));
            }
            let status = TodoStatus::parse(&draft.status).ok_or_else(|| {
                ToolError::Validation(format!("Item {}: invalid status '{}'", i, draft.status))
            })?;
            validated.push(TodoItem {
                content: content.to_string(),
                status,
                active_form: active_form.to_string(),
            });
        }

        let in_progress = validated
            .iter()
            .filter(|t| t.status == TodoStatus::InProgress)
            .count();
        if in_progress > 1 {
            return Err(ToolError::Validation(
                "Only one task can be in_progress at a time".to_string(),
            ));
        }

        self.items = validated;
        Ok(self.render())
    }

    /// One line per item, then a `(done/total done)` summary
    pub fn render(&self) -> String {
        if self.items.is_empty() {
            return "No todos.".to_string();
        }

        let mut lines: Vec<String> = self
            .items
            .iter()
            .map(|t| match t.status {
                TodoStatus::InProgress => {
                    format!("{} {} <- {}", t.status.glyph(), t.content, t.active_form)
                }
                _ => format!("{} {}", t.status.glyph(), t.content),
            })
            .collect();

        let done = self
            .items
            .iter()
            .filter(|t| t.status == TodoStatus::Completed)
            .count();
        lines.push(format!("({}/{} done)", done, self.items.len()));
        lines.join("\n")
    }
}
