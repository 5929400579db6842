//! Command deny-list
//!
//! # What This Is (and Is Not)
//!
//! A substring check run over shell input before it is spawned. It catches
//! the obvious destructive requests a model might produce by accident:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  "sudo rm -rf /"  ──► contains "rm -rf /"  ──► DangerousCommand  │
//! │  "ls -la src"     ──► no match             ──► spawn             │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! It is NOT a security boundary. Quoting, variables, `eval`, base64 or a
//! script file all walk straight past it. Confinement of a command comes
//! only from its working directory and the wall-clock timeout; anything
//! stronger needs OS-level isolation.

use crate::error::ToolError;

/// Fragments rejected by default
pub const DEFAULT_DENY_LIST: &[&str] = &[
    "rm -rf /",
    "rm -fr /",
    "sudo",
    "shutdown",
    "reboot",
    "mkfs",
];

// ═══════════════════════════════════════════════════════════════════════════
// CommandGuard
// ═══════════════════════════════════════════════════════════════════════════
// HOW TO USE:
//   let guard = CommandGuard::default();
//   guard.check("cargo test")?;       // Ok(())
//   guard.check("sudo reboot")?;      // Err(DangerousCommand("sudo"))
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct CommandGuard {
    patterns: Vec<String>,
}

impl CommandGuard {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Reject `command` if it contains any deny-listed fragment
    pub fn check(&self, command: &str) -> Result<(), ToolError> {
        match self.patterns.iter().find(|p| command.contains(p.as_str())) {
            Some(pattern) => Err(ToolError::DangerousCommand(pattern.clone())),
            None => Ok(()),
        }
    }
}

impl Default for CommandGuard {
    fn default() -> Self {
        Self::new(DEFAULT_DENY_LIST.iter().copied())
    }
}
