//! JSON frames exchanged over a session websocket
//!
//! Every frame is an object with a `type` tag; payload fields sit beside
//! it.

use serde::{Deserialize, Serialize};

use crate::workspace::FileNode;

/// Frames sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    UserMessage { content: String },
    GetFileTree,
    ReadFile { path: String },
    SaveFile { path: String, content: String },
}

/// Frames sent to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One colourized progress line
    Log { content: String },
    /// Echo of the user's message
    User { content: String },
    Status { content: String },
    FileTree { content: Vec<FileNode> },
    /// `content` is null when the file does not exist
    FileContent {
        path: String,
        content: Option<String>,
    },
    /// Something in the workspace changed; the client should re-fetch the tree
    FsUpdate,
}

impl ServerMessage {
    pub fn log(content: impl Into<String>) -> Self {
        ServerMessage::Log {
            content: content.into(),
        }
    }

    pub fn status(content: impl Into<String>) -> Self {
        ServerMessage::Status {
            content: content.into(),
        }
    }

    pub fn ready() -> Self {
        Self::status("ready")
    }
}
