//! Progress events emitted while an agent works
//!
//! The conversation loop never writes to a terminal or socket itself; it
//! hands [`AgentEvent`]s to an [`EventSink`]. The CLI prints them, the
//! session server forwards them as `log` and `fs_update` frames.

use std::sync::Mutex;

use colored::Colorize;

/// Longest tool output shown in progress logs; the model sees the full text
pub const PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    Assistant,
    ToolCall,
    ToolOutput,
    Error,
    Info,
}

impl LogStyle {
    /// Apply the ANSI color for this style
    pub fn paint(self, text: &str) -> String {
        match self {
            LogStyle::Assistant => text.green().to_string(),
            LogStyle::ToolCall => text.yellow().to_string(),
            LogStyle::ToolOutput => text.white().to_string(),
            LogStyle::Error => text.red().to_string(),
            LogStyle::Info => text.cyan().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Log { style: LogStyle, text: String },
    /// A tool may have changed files in the workspace
    FilesChanged,
}

impl AgentEvent {
    pub fn log(style: LogStyle, text: impl Into<String>) -> Self {
        AgentEvent::Log {
            style,
            text: text.into(),
        }
    }

    /// `$ name: args` line announcing a tool call
    pub fn tool_call(name: &str, arguments: &str) -> Self {
        Self::log(LogStyle::ToolCall, format!("$ {}: {}", name, arguments))
    }

    /// Tool output cut to [`PREVIEW_CHARS`]
    pub fn tool_output(output: &str) -> Self {
        let preview = match output.char_indices().nth(PREVIEW_CHARS) {
            Some((idx, _)) => format!("{}...", &output[..idx]),
            None => output.to_string(),
        };
        Self::log(LogStyle::ToolOutput, preview)
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::log(LogStyle::Error, format!("System Error: {}", message))
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: AgentEvent) {}
}

/// Keeps every event in memory, for tests and transcripts
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<AgentEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Texts of all log events with the given style
    pub fn logs(&self, style: LogStyle) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AgentEvent::Log { style: s, text } if s == style => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: AgentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
