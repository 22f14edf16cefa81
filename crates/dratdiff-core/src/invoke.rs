//! External tool execution and timing.

use crate::tool::{Tool, ToolCommand};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Exit code recorded when a tool could not be run to completion
/// (spawn failure, timeout). A tool killed by signal N reports `-N`.
pub const ABNORMAL_EXIT: i32 = -1;

/// Outcome of one external invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invocation {
    /// Role of the tool.
    pub tool: Tool,

    /// Short display name of the tool.
    pub label: String,

    /// Exit code (0 = success).
    pub exit_code: i32,

    /// Wall-clock duration in seconds, monotonic clock.
    pub duration_secs: f64,

    /// Whether the tool was killed by the timeout.
    #[serde(default)]
    pub timed_out: bool,

    /// Why the tool did not exit normally: spawn or wait error, timeout, signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Captured stdout.
    #[serde(skip)]
    pub stdout: String,

    /// Captured stderr.
    #[serde(skip)]
    pub stderr: String,
}

impl Invocation {
    /// Whether the tool exited with status 0.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Invocation that never yielded an exit status.
    pub fn abnormal(
        command: &ToolCommand,
        elapsed: Duration,
        error: String,
        timed_out: bool,
    ) -> Self {
        Self {
            tool: command.tool,
            label: command.label.clone(),
            exit_code: ABNORMAL_EXIT,
            duration_secs: elapsed.as_secs_f64(),
            timed_out,
            error: Some(error),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Runs external tools. Implementations never fail: a tool that cannot be
/// run to completion is reported with [`ABNORMAL_EXIT`], a signal death with
/// the negated signal number.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Run the command to completion and report its outcome.
    async fn invoke(&self, command: &ToolCommand) -> Invocation;
}

/// Invoker spawning real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessInvoker;

#[async_trait]
impl Invoker for ProcessInvoker {
    async fn invoke(&self, command: &ToolCommand) -> Invocation {
        debug!(tool = command.tool.name(), argv = ?command.argv(), "Invoking tool");
        let start = Instant::now();

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if command.capture_output {
            process.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            process.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let child = match process.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Invocation::abnormal(
                    command,
                    start.elapsed(),
                    format!("failed to spawn {}: {}", command.program.display(), e),
                    false,
                )
            }
        };

        // Dropping the wait future on timeout kills the child.
        let output = match command.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    return Invocation::abnormal(
                        command,
                        start.elapsed(),
                        format!("timed out after {} seconds", limit.as_secs()),
                        true,
                    )
                }
            },
            None => child.wait_with_output().await,
        };

        let elapsed = start.elapsed();
        match output {
            Ok(output) => {
                let (exit_code, error) = exit_status_code(&output.status);
                Invocation {
                    tool: command.tool,
                    label: command.label.clone(),
                    exit_code,
                    duration_secs: elapsed.as_secs_f64(),
                    timed_out: false,
                    error,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                }
            }
            Err(e) => Invocation::abnormal(
                command,
                elapsed,
                format!("failed to wait for {}: {}", command.program.display(), e),
                false,
            ),
        }
    }
}

/// Raw exit code of a finished process. A signal death maps to `-signum`,
/// the convention of `subprocess` return codes.
fn exit_status_code(status: &ExitStatus) -> (i32, Option<String>) {
    if let Some(code) = status.code() {
        return (code, None);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return (-signal, Some(format!("killed by signal {}", signal)));
        }
    }
    (ABNORMAL_EXIT, Some(format!("terminated abnormally: {}", status)))
}
