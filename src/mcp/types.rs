//! Wire types for the MCP JSON-RPC stdio protocol.
//!
//! Outbound messages are built as typed structs; inbound messages are decoded
//! into a tagged [`Inbound`] variant. Method-specific payloads stay opaque
//! (`serde_json::Value`) — tool argument and result schemas are defined by
//! the server, not fixed at compile time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version tag carried on every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision sent in the initialize request.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

// ─── Outbound Messages ───────────────────────────────────────────────────────

/// JSON-RPC request (carries an `id`, expects a response).
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: u64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC notification (no `id`, no reply expected).
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.to_string(),
            params,
        }
    }
}

// ─── Inbound Messages ────────────────────────────────────────────────────────

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A decoded inbound message, classified by shape.
///
/// Exactly one of the three shapes applies: `id` + `result`/`error` is a
/// response, `method` without `id` is a notification, `method` with `id` is
/// a request from the server (which this client does not answer).
#[derive(Debug, Clone)]
pub enum Inbound {
    Response {
        id: u64,
        result: Option<Value>,
        error: Option<RpcError>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    ServerRequest {
        id: Value,
        method: String,
        params: Option<Value>,
    },
}

impl Inbound {
    /// Classify a parsed JSON document into one of the three message shapes.
    ///
    /// Returns `Err` with a reason when the document matches none of them
    /// (no `id`, no `method`) or a response `id` is not an integer this
    /// client could have issued.
    pub fn classify(value: Value) -> Result<Inbound, String> {
        let obj = match value {
            Value::Object(map) => map,
            other => return Err(format!("expected JSON object, got {other}")),
        };

        let id = obj.get("id").cloned();
        let method = obj.get("method").and_then(|m| m.as_str()).map(String::from);
        let params = obj.get("params").cloned();

        match (id, method) {
            // Request from the server: both id and method present.
            (Some(id), Some(method)) => Ok(Inbound::ServerRequest { id, method, params }),

            // Notification: method without id.
            (None, Some(method)) => Ok(Inbound::Notification { method, params }),

            // Response: id without method; must carry result or error.
            (Some(id), None) => {
                let id = id
                    .as_u64()
                    .ok_or_else(|| format!("response id is not a u64: {id}"))?;
                let result = obj.get("result").cloned();
                let error = match obj.get("error") {
                    Some(Value::Null) | None => None,
                    Some(e) => Some(
                        serde_json::from_value::<RpcError>(e.clone())
                            .map_err(|err| format!("malformed error object: {err}"))?,
                    ),
                };
                if result.is_none() && error.is_none() {
                    return Err(format!("response {id} carries neither result nor error"));
                }
                Ok(Inbound::Response { id, result, error })
            }

            (None, None) => Err("message has neither id nor method".to_string()),
        }
    }
}

// ─── MCP Payload Types ───────────────────────────────────────────────────────

/// Tool definition as returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Argument shape, kept opaque — the schema is server-defined.
    #[serde(default, alias = "inputSchema")]
    pub input_schema: Value,
}

/// Payload of the `tools/list` result.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

/// Server info returned in the initialize response.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Payload of the `initialize` result.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    #[serde(default, alias = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default, alias = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

// ─── Standard JSON-RPC Error Codes ───────────────────────────────────────────

/// Well-known JSON-RPC error codes.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i64 = -32603;
}

// ─── Tests ───────────────────────────────────────────────────────────────────
