//! Shell command execution with a hard timeout.
//!
//! Commands run through `bash -c` in the configured workspace directory.
//! Every failure mode — spawn error, non-zero exit, timeout — is folded
//! into the returned [`CommandOutcome`]; nothing propagates as an error
//! to the orchestrator.

use std::path::Path;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Commands are abandoned as failed after this long.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured result of one command invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr (or the spawn/timeout description).
    pub stderr: String,
    /// Process exit code; `-1` when the process did not exit normally.
    pub exit_code: i32,
    /// Whether the timeout fired.
    pub timed_out: bool,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutcome {
    /// Whether the command completed with a zero exit code.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    fn failed(start: Instant, stderr: String, timed_out: bool) -> Self {
        Self {
            stdout: String::new(),
            stderr,
            exit_code: -1,
            timed_out,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Run `command` under `bash -c` in `working_dir`, waiting at most
/// `timeout` before killing it.
pub async fn run_command(command: &str, working_dir: &Path, timeout: Duration) -> CommandOutcome {
    let start = Instant::now();

    let mut cmd = tokio::process::Command::new("bash");
    let _ = cmd
        .arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    debug!(command, working_dir = %working_dir.display(), "spawning command");

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(command, error = %e, "failed to spawn command");
            return CommandOutcome::failed(start, format!("failed to spawn: {e}"), false);
        }
    };

    // Take the pipes before the select so the child can be killed on
    // timeout without wait_with_output() consuming it.
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let stdout_handle = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stdout_pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_handle = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stderr_pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    tokio::select! {
        status = child.wait() => {
            let exit_code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    warn!(command, error = %e, "wait on command failed");
                    -1
                }
            };
            let stdout_bytes = stdout_handle.await.unwrap_or_default();
            let stderr_bytes = stderr_handle.await.unwrap_or_default();
            let duration_ms = start.elapsed().as_millis() as u64;
            debug!(command, exit_code, duration_ms, "command completed");
            CommandOutcome {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code,
                timed_out: false,
                duration_ms,
            }
        }
        () = tokio::time::sleep(timeout) => {
            let _ = child.kill().await;
            stdout_handle.abort();
            stderr_handle.abort();
            warn!(command, timeout_secs = timeout.as_secs(), "command timed out");
            CommandOutcome::failed(start, "command timed out".into(), true)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn wd() -> &'static Path {
        Path::new("/tmp")
    }

    #[tokio::test]
    async fn echo_captures_stdout() {
        let outcome = run_command("echo hello", wd(), COMMAND_TIMEOUT).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn exit_code_is_reported() {
        let outcome = run_command("exit 42", wd(), COMMAND_TIMEOUT).await;
        assert_eq!(outcome.exit_code, 42);
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn stderr_is_captured() {
        let outcome = run_command("echo oops >&2", wd(), COMMAND_TIMEOUT).await;
        assert_eq!(outcome.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn timeout_kills_the_process() {
        let outcome = run_command("sleep 10", wd(), Duration::from_millis(50)).await;
        assert!(outcome.timed_out);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.exit_code, -1);
    }

    #[tokio::test]
    async fn working_directory_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_command("pwd", dir.path(), COMMAND_TIMEOUT).await;
        assert!(outcome.stdout.trim().ends_with(
            dir.path().file_name().unwrap().to_str().unwrap()
        ));
    }
}
