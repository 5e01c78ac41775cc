//! Executes a classified intent against the server's tool surface.
//!
//! Tool naming varies between server implementations, so every operation
//! resolves through an ordered candidate list before calling. Argument
//! payloads follow the MSSQL MCP server conventions: a `query` string plus
//! optional `where_clause`/`limit` fields.

use serde_json::{json, Map, Value};

use crate::mcp::{McpConnection, McpError};

use super::intent::{Analysis, Conditions, Intent};

// ─── Tool Name Candidates ────────────────────────────────────────────────────

/// Candidate names for the table-listing tool, in preference order.
pub const LIST_TABLES_CANDIDATES: &[&str] =
    &["list_tables", "list_table", "show_tables", "get_tables"];

/// Candidate names for the schema-description tool.
pub const DESCRIBE_CANDIDATES: &[&str] =
    &["describe_table", "table_schema", "show_columns", "get_schema"];

/// Candidate names for the row-reading tool.
pub const READ_CANDIDATES: &[&str] = &["read_data", "query_table", "select_data", "query"];

// ─── Execution ───────────────────────────────────────────────────────────────

/// Run one classified intent and return the raw tool result.
///
/// Write intents (INSERT/UPDATE/DELETE) are not executed; like queries with
/// no recognizable table, they fall back to listing the catalog so the user
/// can see what exists.
pub async fn execute(conn: &McpConnection, analysis: &Analysis) -> Result<Value, McpError> {
    match analysis.intent {
        Intent::Select => match analysis.tables.first() {
            Some(table) => read_table_data(conn, table, &analysis.conditions).await,
            None => list_all_tables(conn).await,
        },
        Intent::Count => match analysis.tables.first() {
            Some(table) => count_table_records(conn, table, &analysis.conditions).await,
            None => list_all_tables(conn).await,
        },
        Intent::Describe => match analysis.tables.first() {
            Some(table) => describe_table(conn, table).await,
            None => list_all_tables(conn).await,
        },
        Intent::Insert | Intent::Update | Intent::Delete => list_all_tables(conn).await,
    }
}

/// List every table in the database.
pub async fn list_all_tables(conn: &McpConnection) -> Result<Value, McpError> {
    let tool = resolve(conn, LIST_TABLES_CANDIDATES)?;
    conn.call_tool(&tool, json!({})).await
}

/// Describe one table's schema.
pub async fn describe_table(conn: &McpConnection, table: &str) -> Result<Value, McpError> {
    let tool = resolve(conn, DESCRIBE_CANDIDATES)?;
    conn.call_tool(&tool, json!({ "table_name": table })).await
}

/// Read rows from a table, applying extracted conditions.
pub async fn read_table_data(
    conn: &McpConnection,
    table: &str,
    conditions: &Conditions,
) -> Result<Value, McpError> {
    let tool = resolve(conn, READ_CANDIDATES)?;

    let mut query = format!("SELECT * FROM {table}");
    let mut args = Map::new();

    if let Some(limit) = conditions.limit {
        query.push_str(&format!(" LIMIT {limit}"));
        args.insert("limit".into(), json!(limit));
    }
    if let Some(clause) = where_clause(conditions) {
        args.insert("where_clause".into(), Value::String(clause));
    }
    args.insert("query".into(), Value::String(query));

    conn.call_tool(&tool, Value::Object(args)).await
}

/// Count rows in a table, applying extracted conditions.
pub async fn count_table_records(
    conn: &McpConnection,
    table: &str,
    conditions: &Conditions,
) -> Result<Value, McpError> {
    let tool = resolve(conn, READ_CANDIDATES)?;

    let query = format!("SELECT COUNT(*) as total_count FROM {table}");
    let mut args = Map::new();
    if let Some(clause) = where_clause(conditions) {
        args.insert("where_clause".into(), Value::String(clause));
    }
    args.insert("query".into(), Value::String(query));

    conn.call_tool(&tool, Value::Object(args)).await
}

/// Build the `where_clause` argument from extracted conditions.
///
/// TODO: switch to parameterized filters once the MSSQL servers accept
/// them — the LIKE patterns below interpolate user-derived text into SQL.
fn where_clause(conditions: &Conditions) -> Option<String> {
    let mut clause: Option<String> = None;

    if let Some(location) = &conditions.location {
        clause = Some(format!(
            "city LIKE '%{location}%' OR state LIKE '%{location}%'"
        ));
    }

    if let Some(status) = &conditions.status {
        let status_clause = format!("status = '{status}'");
        clause = Some(match clause {
            Some(existing) => format!("({existing}) AND {status_clause}"),
            None => status_clause,
        });
    }

    clause
}

fn resolve(conn: &McpConnection, candidates: &[&str]) -> Result<String, McpError> {
    conn.registry()
        .resolve(candidates)
        .ok_or_else(|| McpError::NoSuchTool {
            candidates: candidates.iter().map(|c| (*c).to_string()).collect(),
        })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
