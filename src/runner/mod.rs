//! External build command execution.
//!
//! The command is optional: the no-command case resolves immediately so
//! sites that are rebuilt out-of-band (CI pushing artifacts) skip straight
//! to the replay. When a command is configured it runs through the platform
//! shell and every line of its stdout and stderr is forwarded to the
//! injected [`LogSink`] as it appears, so stream viewers watch build
//! progress in near-real time.
//!
//! No timeout is imposed: a hung build command blocks the pipeline. Known
//! limitation, kept visible instead of silently mitigated.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::state::StateStore;

/// Structured destination for build output lines.
pub trait LogSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// The state store forwards build output to stream subscribers.
impl LogSink for StateStore {
    fn emit(&self, line: &str) {
        self.push_log(line);
    }
}

/// Build command failures surfaced to the pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to spawn build command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to wait for build command: {0}")]
    Wait(#[source] std::io::Error),

    #[error("build command exited with status {code}")]
    Failed { code: i32 },
}

/// Run the configured build command to completion.
///
/// Resolves on clean exit; any other outcome is a [`BuildError`]. Output is
/// forwarded line by line to `sink`, never collected into the result.
pub async fn run_build_command(
    command: &str,
    cwd: &Path,
    sink: Arc<dyn LogSink>,
) -> Result<(), BuildError> {
    if command.trim().is_empty() {
        return Ok(());
    }

    let mut cmd = shell_command(command);
    cmd.current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(BuildError::Spawn)?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_task = forward_lines(stdout, Arc::clone(&sink));
    let err_task = forward_lines(stderr, Arc::clone(&sink));

    let status = child.wait().await.map_err(BuildError::Wait)?;

    // Pipes close when the child exits; drain what is left.
    let _ = out_task.await;
    let _ = err_task.await;

    if status.success() {
        Ok(())
    } else {
        Err(BuildError::Failed {
            code: status.code().unwrap_or(-1),
        })
    }
}

/// Wrap the command string in the platform shell.
fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Forward each non-empty trimmed line of `stream` to the sink.
fn forward_lines(
    stream: Option<impl AsyncRead + Unpin + Send + 'static>,
    sink: Arc<dyn LogSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(stream) = stream else { return };
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if !line.is_empty() {
                sink.emit(line);
            }
        }
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        lines: Mutex<Vec<String>>,
    }

    impl LogSink for CollectingSink {
        fn emit(&self, line: &str) {
            self.lines.lock().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn test_empty_command_is_noop() {
        let sink = Arc::new(CollectingSink::default());
        run_build_command("", Path::new("."), sink.clone())
            .await
            .unwrap();
        run_build_command("   ", Path::new("."), sink.clone())
            .await
            .unwrap();
        assert!(sink.lines.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stdout_lines_forwarded() {
        let sink = Arc::new(CollectingSink::default());
        run_build_command("echo one && echo two", Path::new("."), sink.clone())
            .await
            .unwrap();
        assert_eq!(sink.lines.lock().as_slice(), &["one", "two"]);
    }

    #[tokio::test]
    async fn test_stderr_lines_forwarded() {
        let sink = Arc::new(CollectingSink::default());
        run_build_command("echo oops 1>&2", Path::new("."), sink.clone())
            .await
            .unwrap();
        assert_eq!(sink.lines.lock().as_slice(), &["oops"]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let sink = Arc::new(CollectingSink::default());
        let err = run_build_command("exit 3", Path::new("."), sink)
            .await
            .unwrap_err();
        match err {
            BuildError::Failed { code } => assert_eq!(code, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

        let sink = Arc::new(CollectingSink::default());
        run_build_command("ls marker.txt", dir.path(), sink.clone())
            .await
            .unwrap();
        assert_eq!(sink.lines.lock().as_slice(), &["marker.txt"]);
    }
}
