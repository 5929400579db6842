//! Workspace module: the directory an agent operates on
//!
//! ```text
//! tool call ──► Sandbox::resolve ──► files (read / write / edit)
//!                     │
//!                     └──────────► CommandExecutor (cwd = root)
//! ```
//!
//! [`Workspace`] bundles the sandbox and command executor that every tool
//! handler goes through. The file tree and archive helpers serve the
//! networked session layer.

pub mod archive;
pub mod command;
pub mod files;
pub mod sandbox;
pub mod tree;

use std::path::Path;

pub use command::{CommandExecutor, DEFAULT_COMMAND_TIMEOUT, NO_OUTPUT};
pub use sandbox::Sandbox;
pub use tree::{file_tree, FileNode, NodeKind};

use crate::error::ToolError;

/// Hard cap on any text handed back to the model
pub const MAX_OUTPUT_CHARS: usize = 50_000;

/// Directories that belong to the service rather than the project
pub const INTERNAL_DIRS: &[&str] = &["backend", "venv"];

/// Whether a single path component is hidden from listings and archives
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || INTERNAL_DIRS.contains(&name)
}

/// Keep at most `max` characters of `text`, on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Sandboxed file and command access rooted at one directory
#[derive(Debug, Clone)]
pub struct Workspace {
    sandbox: Sandbox,
    executor: CommandExecutor,
}

impl Workspace {
    pub fn new(sandbox: Sandbox, executor: CommandExecutor) -> Self {
        Self { sandbox, executor }
    }

    /// Workspace at `root` with the default executor
    pub fn open(root: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::new(Sandbox::new(root)?, CommandExecutor::default()))
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Run a shell command with the workspace root as working directory
    pub async fn run(&self, command: &str) -> Result<String, ToolError> {
        self.executor.run(command, self.sandbox.root()).await
    }
}
