//! High-level connection facade — one server process, one session.
//!
//! `McpConnection::establish` wires the pieces together: spawn the process,
//! start the stderr drain and stdout pump, run the handshake, populate the
//! registry. Callers above this layer never touch the process or the wire
//! format directly.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::task::JoinHandle;

use super::errors::McpError;
use super::handshake;
use super::process::{spawn_stderr_logger, LaunchSpec, ProcessStreams, ProcessSupervisor};
use super::registry::ToolRegistry;
use super::session::{spawn_reader_pump, Session};
use super::types::ServerInfo;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default timeout for a single tool call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for the initialize/discovery handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period for the server to exit after stdin closes, before kill.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ─── McpConnection ───────────────────────────────────────────────────────────

/// A live, initialized connection to an MCP server process.
pub struct McpConnection {
    supervisor: ProcessSupervisor,
    session: Session,
    registry: Arc<ToolRegistry>,
    server_info: Option<ServerInfo>,
    degraded: bool,
    stderr_task: JoinHandle<()>,
    call_timeout: Duration,
}

impl std::fmt::Debug for McpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpConnection")
            .field("server_info", &self.server_info)
            .field("degraded", &self.degraded)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl McpConnection {
    /// Spawn the server and bring the session up through the handshake.
    ///
    /// On handshake failure the half-started process is torn down before
    /// the error is returned — no orphan is left behind.
    pub async fn establish(spec: &LaunchSpec) -> Result<Self, McpError> {
        let (mut supervisor, streams) = ProcessSupervisor::spawn(spec)?;
        let ProcessStreams {
            stdin,
            stdout,
            stderr,
        } = streams;

        let stderr_task = spawn_stderr_logger(stderr);
        let (events, pump) = spawn_reader_pump(stdout);
        let session = Session::new(Box::new(stdin), events);
        session.attach_pump(pump);

        let outcome = match handshake::run(&session, HANDSHAKE_TIMEOUT).await {
            Ok(outcome) => outcome,
            Err(e) => {
                session.close("handshake failed").await;
                supervisor.shutdown(SHUTDOWN_GRACE).await;
                stderr_task.abort();
                return Err(e);
            }
        };

        let registry = Arc::new(ToolRegistry::new());
        registry.replace(outcome.tools);

        Ok(Self {
            supervisor,
            session,
            registry,
            server_info: outcome.server_info,
            degraded: outcome.degraded,
            stderr_task,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        })
    }

    /// The underlying session, for `call`/`notify`/`on_notification`.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Shared handle to the discovered tool catalog.
    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    /// Server identity from the initialize response, if reported.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Whether discovery failed to produce a catalog.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Override the per-call timeout.
    pub fn set_call_timeout(&mut self, timeout: Duration) {
        self.call_timeout = timeout;
    }

    /// Whether the server process is still running.
    pub fn is_alive(&mut self) -> bool {
        self.supervisor.is_alive()
    }

    /// Invoke a remote tool by exact name with opaque arguments.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let params = json!({ "name": name, "arguments": arguments });
        self.session
            .call("tools/call", Some(params), self.call_timeout)
            .await
    }

    /// Shut the connection down: fail pending requests, close the server's
    /// stdin, wait out the grace period, force-kill if needed.
    pub async fn shutdown(mut self) -> Option<ExitStatus> {
        self.session.close("shutdown").await;
        let status = self.supervisor.shutdown(SHUTDOWN_GRACE).await;

        // Stderr drains to EOF once the process is gone; don't wait forever.
        let _ = tokio::time::timeout(Duration::from_secs(1), self.stderr_task).await;
        status
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
