//! Protocol bootstrap: `initialize` → `notifications/initialized` → tool
//! discovery.
//!
//! Runs exactly once per session. A failed `initialize` is fatal — nothing
//! works on an uninitialized server. A failed discovery is not: some servers
//! expose no catalog, and a few older ones answer nonstandard method names,
//! so discovery degrades through a fixed probe list before giving up.

use std::time::Duration;

use serde_json::{json, Value};

use super::errors::McpError;
use super::session::Session;
use super::types::{InitializeResult, ServerInfo, ToolDefinition, ToolsListResult, MCP_PROTOCOL_VERSION};

/// Discovery methods probed, in order, when `tools/list` yields no catalog.
const DISCOVERY_FALLBACKS: &[&str] = &["list_tools", "get_tools", "capabilities"];

/// What the bootstrap produced.
#[derive(Debug)]
pub struct HandshakeOutcome {
    pub server_info: Option<ServerInfo>,
    pub tools: Vec<ToolDefinition>,
    /// Set when no discovery method returned a tool list; the registry
    /// stays empty and tool resolution will fail until restart.
    pub degraded: bool,
}

/// Run the three-step bootstrap over an open session.
pub async fn run(session: &Session, timeout: Duration) -> Result<HandshakeOutcome, McpError> {
    // Step 1: initialize — fatal on any failure.
    let params = json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "roots": { "listChanged": true },
            "sampling": {}
        },
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }
    });
    let result = session
        .call("initialize", Some(params), timeout)
        .await
        .map_err(|e| McpError::HandshakeFailed {
            reason: format!("initialize: {e}"),
        })?;
    let init: InitializeResult =
        serde_json::from_value(result).map_err(|e| McpError::HandshakeFailed {
            reason: format!("unparseable initialize result: {e}"),
        })?;
    tracing::info!(
        server = init.server_info.as_ref().and_then(|s| s.name.as_deref()),
        protocol = init.protocol_version.as_deref(),
        "MCP protocol initialized"
    );

    // Step 2: initialized notification — no acknowledgment expected.
    session.notify("notifications/initialized", Some(json!({}))).await?;

    // Step 3: tool discovery, with compatibility fallbacks.
    let (tools, degraded) = discover_tools(session, timeout).await?;
    if degraded {
        tracing::warn!("no tool catalog discovered; continuing with an empty registry");
    } else {
        tracing::info!(count = tools.len(), "discovered tools");
        for tool in &tools {
            tracing::debug!(name = %tool.name, description = %tool.description, "tool");
        }
    }

    Ok(HandshakeOutcome {
        server_info: init.server_info,
        tools,
        degraded,
    })
}

/// Ask for the tool catalog; on a miss, walk the fallback probe list and
/// accept the first method that yields tools.
async fn discover_tools(
    session: &Session,
    timeout: Duration,
) -> Result<(Vec<ToolDefinition>, bool), McpError> {
    if let Some(tools) = probe(session, "tools/list", timeout).await? {
        return Ok((tools, false));
    }

    tracing::warn!("tools/list returned no catalog; trying alternative discovery methods");
    for method in DISCOVERY_FALLBACKS {
        if let Some(tools) = probe(session, method, timeout).await? {
            tracing::info!(method, count = tools.len(), "alternative discovery succeeded");
            return Ok((tools, false));
        }
    }

    Ok((Vec::new(), true))
}

/// Try one discovery method. `Ok(None)` means "this method produced no
/// usable catalog" (remote error, timeout, or an unparseable result) —
/// recoverable by probing the next candidate. Fatal session errors
/// propagate.
async fn probe(
    session: &Session,
    method: &str,
    timeout: Duration,
) -> Result<Option<Vec<ToolDefinition>>, McpError> {
    match session.call(method, Some(json!({})), timeout).await {
        Ok(result) => Ok(parse_tool_list(&result)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::debug!(method, error = %e, "discovery method failed");
            Ok(None)
        }
    }
}

fn parse_tool_list(result: &Value) -> Option<Vec<ToolDefinition>> {
    match serde_json::from_value::<ToolsListResult>(result.clone()) {
        Ok(list) if !list.tools.is_empty() => Some(list.tools),
        _ => None,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::session::spawn_reader_pump;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    const T: Duration = Duration::from_secs(5);

    fn test_session() -> (Session, tokio::io::DuplexStream) {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(near);
        let (events, pump) = spawn_reader_pump(read_half);
        let session = Session::new(Box::new(write_half), events);
        session.attach_pump(pump);
        (session, far)
    }

    /// Scripted server: answers each inbound request via `respond`;
    /// notifications are recorded but not answered.
    fn scripted_server(
        far: tokio::io::DuplexStream,
        respond: impl Fn(&str, &Value) -> Option<Value> + Send + 'static,
    ) -> tokio::task::JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let (far_read, mut far_write) = tokio::io::split(far);
            let mut lines = BufReader::new(far_read).lines();
            let mut notifications = Vec::new();

            while let Ok(Some(line)) = lines.next_line().await {
                let msg: Value = serde_json::from_str(&line).unwrap();
                let method = msg["method"].as_str().unwrap_or("").to_string();
                match msg.get("id") {
                    Some(id) => {
                        if let Some(body) = respond(&method, &msg) {
                            let mut reply = body;
                            reply["jsonrpc"] = json!("2.0");
                            reply["id"] = id.clone();
                            let line = format!("{reply}\n");
                            far_write.write_all(line.as_bytes()).await.unwrap();
                        }
                    }
                    None => notifications.push(method),
                }
            }
            notifications
        })
    }

    fn tools_result(names: &[&str]) -> Value {
        let tools: Vec<Value> = names
            .iter()
            .map(|n| json!({"name": n, "description": format!("{n} tool")}))
            .collect();
        json!({"result": {"tools": tools}})
    }

    #[tokio::test]
    async fn test_happy_path_populates_tools() {
        let (session, far) = test_session();
        let server = scripted_server(far, |method, _| match method {
            "initialize" => Some(json!({"result": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "serverInfo": {"name": "stub-sql", "version": "1.0"}
            }})),
            "tools/list" => Some(tools_result(&["list_tables", "read_data"])),
            _ => Some(json!({"error": {"code": -32601, "message": "Method not found"}})),
        });

        let outcome = run(&session, T).await.unwrap();
        assert!(!outcome.degraded);
        assert_eq!(outcome.tools.len(), 2);
        assert_eq!(outcome.tools[0].name, "list_tables");
        assert_eq!(outcome.server_info.unwrap().name.unwrap(), "stub-sql");

        session.close("test done").await;
        let notifications = server.await.unwrap();
        assert_eq!(notifications, vec!["notifications/initialized"]);
    }

    #[tokio::test]
    async fn test_initialize_error_is_fatal() {
        let (session, far) = test_session();
        let _server = scripted_server(far, |method, _| match method {
            "initialize" => Some(json!({"error": {"code": -32000, "message": "no database"}})),
            _ => None,
        });

        let err = run(&session, T).await.unwrap_err();
        assert!(matches!(err, McpError::HandshakeFailed { .. }));
        assert!(err.to_string().contains("no database"));
    }

    #[tokio::test]
    async fn test_discovery_falls_back_to_alternative_method() {
        let (session, far) = test_session();
        let server = scripted_server(far, |method, _| match method {
            "initialize" => Some(json!({"result": {}})),
            // tools/list exists but returns an empty shell; list_tools errors;
            // get_tools finally produces the catalog.
            "tools/list" => Some(json!({"result": {}})),
            "list_tools" => Some(json!({"error": {"code": -32601, "message": "Method not found"}})),
            "get_tools" => Some(tools_result(&["query_table"])),
            _ => Some(json!({"error": {"code": -32601, "message": "Method not found"}})),
        });

        let outcome = run(&session, T).await.unwrap();
        assert!(!outcome.degraded);
        assert_eq!(outcome.tools.len(), 1);
        assert_eq!(outcome.tools[0].name, "query_table");

        session.close("test done").await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_no_catalog_anywhere_degrades_without_failing() {
        let (session, far) = test_session();
        let server = scripted_server(far, |method, _| match method {
            "initialize" => Some(json!({"result": {}})),
            _ => Some(json!({"error": {"code": -32601, "message": "Method not found"}})),
        });

        let outcome = run(&session, T).await.unwrap();
        assert!(outcome.degraded);
        assert!(outcome.tools.is_empty());

        session.close("test done").await;
        server.await.unwrap();
    }
}
