//! Shell command execution under a workspace root
//!
//! Commands run as `sh -c <command>` with the workspace root as working
//! directory, in their own process group so a timeout can take down
//! everything the command spawned, not just the shell.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{truncate_chars, MAX_OUTPUT_CHARS};
use crate::error::ToolError;
use crate::metrics::COMMAND_DURATION;
use crate::security::CommandGuard;

/// Default wall-clock budget for one command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Returned when a command produced nothing on stdout or stderr
pub const NO_OUTPUT: &str = "(no output)";

/// Bytes kept per stream; enough for [`MAX_OUTPUT_CHARS`] of any UTF-8
pub const STREAM_BYTE_LIMIT: usize = 4 * MAX_OUTPUT_CHARS;

#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout: Duration,
    guard: CommandGuard,
}

impl CommandExecutor {
    pub fn new(timeout: Duration, guard: CommandGuard) -> Self {
        Self { timeout, guard }
    }

    /// Run `command` in `root` and return its combined, trimmed output
    ///
    /// Deny-listed commands are rejected without spawning anything. On
    /// timeout the process group is killed and `ToolError::Timeout` is
    /// returned; the caller treats that like any other tool result.
    pub async fn run(&self, command: &str, root: &Path) -> Result<String, ToolError> {
        self.guard.check(command)?;

        let start = Instant::now();
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()?;
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = async {
            let (stdout, stderr, status) = tokio::join!(
                read_capped(stdout, STREAM_BYTE_LIMIT),
                read_capped(stderr, STREAM_BYTE_LIMIT),
                child.wait(),
            );
            Ok::<_, std::io::Error>((stdout?, stderr?, status?))
        };
        let result = tokio::time::timeout(self.timeout, finished).await;
        COMMAND_DURATION.observe(start.elapsed().as_secs_f64());

        let (stdout, stderr, status) = match result {
            Ok(output) => output?,
            Err(_) => {
                // Children share the group id, which equals the shell's pid
                if let Some(pid) = pid {
                    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                        debug!(pid, error = %e, "process group already gone");
                    }
                }
                warn!(command, timeout_secs = self.timeout.as_secs(), "Command timed out");
                return Err(ToolError::Timeout(self.timeout.as_secs()));
            }
        };

        let mut combined = String::from_utf8_lossy(&stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&stderr));
        let trimmed = combined.trim();

        debug!(
            command,
            exit_code = status.code(),
            bytes = trimmed.len(),
            "Command finished"
        );

        if trimmed.is_empty() {
            return Ok(NO_OUTPUT.to_string());
        }
        Ok(truncate_chars(trimmed, MAX_OUTPUT_CHARS))
    }
}

/// Read `reader` to EOF, keeping at most `limit` bytes
///
/// Anything past the limit is read and dropped so the writer never blocks
/// on a full pipe.
pub async fn read_capped<R>(reader: Option<R>, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let Some(mut reader) = reader else {
        return Ok(kept);
    };

    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok(kept)
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT, CommandGuard::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runs_in_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let out = CommandExecutor::default().run("ls", dir.path()).await.unwrap();
        assert!(out.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_combines_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let out = CommandExecutor::default()
            .run("echo out; echo err 1>&2", dir.path())
            .await
            .unwrap();
        assert!(out.contains("out"));
        assert!(out.contains("err"));
    }

    #[tokio::test]
    async fn test_empty_output_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let out = CommandExecutor::default().run("true", dir.path()).await.unwrap();
        assert_eq!(out, NO_OUTPUT);
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let out = CommandExecutor::default()
            .run("head -c 60000 /dev/zero | tr '\\0' 'a'", dir.path())
            .await
            .unwrap();
        assert_eq!(out.chars().count(), MAX_OUTPUT_CHARS);
    }

    #[tokio::test]
    async fn test_capped_reader_drains_everything_but_keeps_limit() {
        let source = tokio::io::repeat(b'a').take(64 * 1024 * 1024);
        let kept = read_capped(Some(source), STREAM_BYTE_LIMIT).await.unwrap();
        assert_eq!(kept.len(), STREAM_BYTE_LIMIT);
        assert!(kept.capacity() < 2 * STREAM_BYTE_LIMIT);
    }

    #[tokio::test]
    async fn test_flood_of_output_finishes_capped() {
        let dir = tempfile::tempdir().unwrap();
        let out = CommandExecutor::default()
            .run("yes aaaaaaaaaaaaaaaa | head -c 200000000", dir.path())
            .await
            .unwrap();
        assert_eq!(out.chars().count(), MAX_OUTPUT_CHARS);
    }

    #[tokio::test]
    async fn test_dangerous_command_not_spawned() {
        let dir = tempfile::tempdir().unwrap();
        let err = CommandExecutor::default()
            .run("touch created.txt; sudo rm -rf /", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::DangerousCommand(_)));
        assert!(!dir.path().join("created.txt").exists());
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let dir = tempfile::tempdir().unwrap();
        let executor = CommandExecutor::new(Duration::from_millis(300), CommandGuard::default());
        let start = Instant::now();
        let err = executor
            .run("sleep 5; touch late.txt", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(_)));
        assert!(start.elapsed() < Duration::from_secs(3));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!dir.path().join("late.txt").exists());
    }
}
