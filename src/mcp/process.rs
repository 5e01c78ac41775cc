//! Server process lifecycle management.
//!
//! Spawns the MCP server as a child process with piped stdio, drains its
//! stderr into the log, and tears it down gracefully (stdin close → wait →
//! force kill). The supervisor owns the child; stream halves are handed to
//! the session layer at spawn time.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::errors::McpError;

// ─── Launch Parameters ───────────────────────────────────────────────────────

/// Opaque launch parameters for the server process.
///
/// The supervisor does not interpret any of these — which variables a given
/// server reads is a configuration concern.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }
}

// ─── ProcessSupervisor ───────────────────────────────────────────────────────

/// Captured stdio pipes of a freshly spawned server.
#[derive(Debug)]
pub struct ProcessStreams {
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Owns the child process for the life of the session.
#[derive(Debug)]
pub struct ProcessSupervisor {
    child: Child,
    command: String,
}

impl ProcessSupervisor {
    /// Spawn the server process with piped stdio.
    ///
    /// The child is killed if the supervisor is dropped without an explicit
    /// [`shutdown`](Self::shutdown), so a fault during startup cannot leak
    /// an orphaned server.
    pub fn spawn(spec: &LaunchSpec) -> Result<(Self, ProcessStreams), McpError> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args);

        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            reason: format!("{}: {e}", spec.command),
        })?;

        let stdin = child.stdin.take().ok_or(McpError::SpawnFailed {
            reason: "failed to capture stdin".into(),
        })?;
        let stdout = child.stdout.take().ok_or(McpError::SpawnFailed {
            reason: "failed to capture stdout".into(),
        })?;
        let stderr = child.stderr.take().ok_or(McpError::SpawnFailed {
            reason: "failed to capture stderr".into(),
        })?;

        tracing::info!(
            command = %spec.command,
            pid = child.id(),
            "spawned MCP server process"
        );

        Ok((
            Self {
                child,
                command: spec.command.clone(),
            },
            ProcessStreams {
                stdin,
                stdout,
                stderr,
            },
        ))
    }

    /// Check whether the process has exited, without blocking.
    pub fn try_exit_status(&mut self) -> Option<ExitStatus> {
        match self.child.try_wait() {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(command = %self.command, error = %e, "try_wait failed");
                None
            }
        }
    }

    /// Whether the process is still running.
    pub fn is_alive(&mut self) -> bool {
        self.try_exit_status().is_none()
    }

    /// Shut the process down: wait up to `grace` for it to exit on its own
    /// (the session closes stdin first, which is the stdio-server exit
    /// signal), then force-kill.
    ///
    /// Idempotent — returns immediately if the process has already exited.
    pub async fn shutdown(&mut self, grace: Duration) -> Option<ExitStatus> {
        if let Ok(Some(status)) = self.child.try_wait() {
            log_exit(&self.command, &status, "already exited");
            return Some(status);
        }

        match timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                log_exit(&self.command, &status, "graceful exit");
                Some(status)
            }
            Ok(Err(e)) => {
                tracing::warn!(command = %self.command, error = %e, "wait failed; killing");
                let _ = self.child.kill().await;
                None
            }
            Err(_) => {
                tracing::warn!(
                    command = %self.command,
                    grace_ms = grace.as_millis() as u64,
                    "server did not exit within grace period; killing"
                );
                let _ = self.child.kill().await;
                self.child.wait().await.ok().inspect(|status| {
                    log_exit(&self.command, status, "killed");
                })
            }
        }
    }
}

/// Report process exit with code and, on unix, the terminating signal.
fn log_exit(command: &str, status: &ExitStatus, context: &str) {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal: Option<i32> = None;

    tracing::info!(
        command = %command,
        code = status.code(),
        signal,
        context,
        "MCP server process exited"
    );
}

// ─── Stderr Drain ────────────────────────────────────────────────────────────

/// Drain the server's stderr line by line into the log.
///
/// MCP servers routinely write startup banners and diagnostics to stderr;
/// surfacing them is the main debugging aid when a handshake goes wrong.
pub fn spawn_stderr_logger(stderr: ChildStderr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        tracing::warn!(target: "querydesk::server_stderr", "{line}");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "stderr read ended");
                    break;
                }
            }
        }
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
