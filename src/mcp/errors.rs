//! MCP session error types.

use thiserror::Error;

/// Errors that can occur while talking to an MCP server process.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server process failed to start.
    #[error("failed to spawn server: {reason}")]
    SpawnFailed { reason: String },

    /// Writing to the server's stdin failed (pipe closed, process gone).
    #[error("write to server failed: {reason}")]
    WriteFailed { reason: String },

    /// The initialize handshake did not complete.
    #[error("handshake failed: {reason}")]
    HandshakeFailed { reason: String },

    /// A request received no response within its timeout.
    #[error("request '{method}' (id {id}) timed out after {timeout_ms}ms")]
    Timeout {
        method: String,
        id: u64,
        timeout_ms: u64,
    },

    /// The server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Operation attempted on a session whose process has exited or
    /// been shut down.
    #[error("session closed: {reason}")]
    SessionClosed { reason: String },

    /// A response carried neither `result` nor `error`, or a payload
    /// could not be decoded into the expected shape.
    #[error("protocol error: {reason}")]
    Protocol { reason: String },

    /// No registered tool matched any of the candidate names.
    #[error("no tool found among candidates: {candidates:?}")]
    NoSuchTool { candidates: Vec<String> },
}

impl McpError {
    /// Whether the underlying session is unusable and the caller must not
    /// retry on it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            McpError::SpawnFailed { .. }
                | McpError::WriteFailed { .. }
                | McpError::SessionClosed { .. }
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = McpError::Timeout {
            method: "tools/call".into(),
            id: 7,
            timeout_ms: 15_000,
        };
        assert_eq!(
            err.to_string(),
            "request 'tools/call' (id 7) timed out after 15000ms"
        );

        let err = McpError::Remote {
            code: -32601,
            message: "Method not found".into(),
            data: None,
        };
        assert_eq!(err.to_string(), "server error [-32601]: Method not found");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(McpError::SessionClosed {
            reason: "process exited".into()
        }
        .is_fatal());
        assert!(!McpError::Timeout {
            method: "tools/list".into(),
            id: 1,
            timeout_ms: 1000
        }
        .is_fatal());
    }
}
