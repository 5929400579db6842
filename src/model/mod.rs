//! Model capability module
//!
//! The conversation loop only ever sees [`ModelClient`]; everything about
//! the HTTP endpoint stays in [`client`].

pub mod client;
pub mod scripted;
pub mod types;

pub use client::{ChatClient, ChatError, ModelClient};
pub use scripted::ScriptedClient;
pub use types::{ChatMessage, FunctionCall, ModelRequest, ModelResponse, Role, Tool, ToolCall, ToolFunction};
