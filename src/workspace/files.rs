//! Bounded file tools: read, write, edit
//!
//! All three resolve through the sandbox first. Failures come back as
//! [`ToolError`] values, never panics, so the loop can hand them to the
//! model verbatim.

use tokio::fs;

use super::{truncate_chars, Workspace, MAX_OUTPUT_CHARS};
use crate::error::ToolError;

impl Workspace {
    /// Read a file, optionally keeping only the first `limit` lines
    ///
    /// When lines are dropped a `... (N more lines)` marker is appended.
    /// The result never exceeds [`MAX_OUTPUT_CHARS`].
    pub async fn read(&self, path: &str, limit: Option<usize>) -> Result<String, ToolError> {
        let full = self.sandbox.resolve(path)?;
        if !fs::metadata(&full).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(ToolError::NotFound(path.to_string()));
        }

        let bytes = fs::read(&full).await?;
        let text = String::from_utf8_lossy(&bytes);

        let body = match limit {
            Some(limit) => {
                let lines: Vec<&str> = text.lines().collect();
                if limit < lines.len() {
                    let mut kept = lines[..limit].join("\n");
                    kept.push_str(&format!("\n... ({} more lines)", lines.len() - limit));
                    kept
                } else {
                    text.into_owned()
                }
            }
            None => text.into_owned(),
        };

        Ok(truncate_chars(&body, MAX_OUTPUT_CHARS))
    }

    /// Create or overwrite a file, creating parent directories
    ///
    /// Content lands in a temporary sibling first and is renamed into place,
    /// so readers never observe a half-written file.
    pub async fn write(&self, path: &str, content: &str) -> Result<String, ToolError> {
        let full = self.sandbox.resolve(path)?;
        replace_file(&full, content).await?;
        Ok(format!("Wrote {} bytes to {}", content.len(), path))
    }

    /// Replace the first occurrence of `old_text` with `new_text`
    ///
    /// Later occurrences are left alone; replacing several identical blocks
    /// takes several calls. The match is done on raw bytes, so content
    /// outside it is written back exactly as read, valid UTF-8 or not.
    pub async fn edit(&self, path: &str, old_text: &str, new_text: &str) -> Result<String, ToolError> {
        if old_text.is_empty() {
            return Err(ToolError::invalid_arguments("edit_file", "old_text must not be empty"));
        }

        let full = self.sandbox.resolve(path)?;
        let content = match fs::read(&full).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let needle = old_text.as_bytes();
        let Some(start) = find_bytes(&content, needle) else {
            return Err(ToolError::TextNotFound(path.to_string()));
        };

        let mut updated = Vec::with_capacity(content.len() - needle.len() + new_text.len());
        updated.extend_from_slice(&content[..start]);
        updated.extend_from_slice(new_text.as_bytes());
        updated.extend_from_slice(&content[start + needle.len()..]);
        replace_file(&full, &updated).await?;
        Ok(format!("Edited {}", path))
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn replace_file(target: &std::path::Path, content: impl AsRef<[u8]>) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = target.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    fs::write(&tmp, content.as_ref()).await?;
    if let Err(e) = fs::rename(&tmp, target).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        (dir, ws)
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let (_dir, ws) = workspace();
        assert!(matches!(ws.read("nope.txt", None).await, Err(ToolError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_read_with_limit_marks_remaining_lines() {
        let (dir, ws) = workspace();
        std::fs::write(dir.path().join("f.txt"), "1\n2\n3\n4\n5\n").unwrap();

        let out = ws.read("f.txt", Some(2)).await.unwrap();
        assert_eq!(out, "1\n2\n... (3 more lines)");

        let out = ws.read("f.txt", Some(10)).await.unwrap();
        assert_eq!(out, "1\n2\n3\n4\n5\n");
    }

    #[tokio::test]
    async fn test_read_is_capped() {
        let (dir, ws) = workspace();
        std::fs::write(dir.path().join("big.txt"), "x".repeat(MAX_OUTPUT_CHARS + 10)).unwrap();
        let out = ws.read("big.txt", None).await.unwrap();
        assert_eq!(out.len(), MAX_OUTPUT_CHARS);
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_reports_bytes() {
        let (dir, ws) = workspace();
        let ack = ws.write("deep/nested/file.txt", "hello").await.unwrap();
        assert_eq!(ack, "Wrote 5 bytes to deep/nested/file.txt");
        assert_eq!(std::fs::read_to_string(dir.path().join("deep/nested/file.txt")).unwrap(), "hello");

        // No temporary files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("deep/nested"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_write_outside_root_rejected() {
        let (dir, ws) = workspace();
        let err = ws.write("../escape.txt", "x").await.unwrap_err();
        assert!(matches!(err, ToolError::PathEscape(_)));
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn test_edit_replaces_first_occurrence_only() {
        let (dir, ws) = workspace();
        let original = "head\nTARGET\nmiddle\nTARGET\ntail\n";
        std::fs::write(dir.path().join("code.txt"), original).unwrap();

        ws.edit("code.txt", "TARGET", "DONE").await.unwrap();
        let updated = std::fs::read_to_string(dir.path().join("code.txt")).unwrap();

        let first = original.find("TARGET").unwrap();
        let second_end = original.rfind("TARGET").unwrap() + "TARGET".len();
        assert_eq!(updated, "head\nDONE\nmiddle\nTARGET\ntail\n");
        assert_eq!(&updated[..first], &original[..first]);
        let shift = "TARGET".len() - "DONE".len();
        assert_eq!(&updated[second_end - shift..], &original[second_end..]);
    }

    #[tokio::test]
    async fn test_edit_text_not_found() {
        let (dir, ws) = workspace();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let err = ws.edit("a.txt", "absent", "x").await.unwrap_err();
        assert!(matches!(err, ToolError::TextNotFound(_)));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_edit_missing_file() {
        let (_dir, ws) = workspace();
        assert!(matches!(ws.edit("gone.txt", "a", "b").await, Err(ToolError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_edit_keeps_non_utf8_bytes() {
        let (dir, ws) = workspace();
        std::fs::write(dir.path().join("bin.dat"), [0x68, 0x69, 0x20, 0xff, 0xfe, 0x0a, 0x78]).unwrap();

        assert_eq!(ws.edit("bin.dat", "x", "y").await.unwrap(), "Edited bin.dat");
        assert_eq!(
            std::fs::read(dir.path().join("bin.dat")).unwrap(),
            vec![0x68, 0x69, 0x20, 0xff, 0xfe, 0x0a, 0x79]
        );
    }

    #[tokio::test]
    async fn test_edit_rejects_empty_old_text() {
        let (dir, ws) = workspace();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let err = ws.edit("a.txt", "", "x").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
