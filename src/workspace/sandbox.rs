//! Workspace sandbox
//!
//! Every path the model supplies is resolved here before any read, write
//! or command touches storage.
//!
//! ```text
//! root.join(path) ──► walk components ──► canonicalize each existing prefix
//!                                    │
//!                                    ▼
//!                        starts_with(root)? ── no ──► PathEscape
//!                                    │
//!                                   yes ──► absolute path
//! ```
//!
//! Canonicalizing as we walk means a symlink is followed at the point it is
//! met, so `link/../x` resolves the way the kernel would resolve it.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::ToolError;

/// A directory that tool paths are confined to
#[derive(Debug, Clone)]
pub struct Sandbox {
    /// Canonical root; all resolved paths start with it
    root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at `root`, creating the directory if needed
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against the root and reject anything outside it
    ///
    /// Absolute paths are not re-rooted: they replace the root entirely and
    /// are then subject to the same containment check.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, ToolError> {
        let requested = path.as_ref();
        let escape = || ToolError::PathEscape(requested.display().to_string());

        let joined = self.root.join(requested);
        let mut resolved = PathBuf::new();

        for component in joined.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::Normal(part) => {
                    resolved.push(part);
                    // Only existing prefixes can be symlinks. A dangling link
                    // has metadata but no canonical form and is refused.
                    if fs::symlink_metadata(&resolved).is_ok() {
                        resolved = resolved.canonicalize().map_err(|_| escape())?;
                    }
                }
            }
        }

        if !resolved.starts_with(&self.root) {
            return Err(escape());
        }
        Ok(resolved)
    }
}
