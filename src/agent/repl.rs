//! Interactive read-line loop.
//!
//! Free text becomes a classified query; `tools`, `debug`, and `exit` are
//! built-in commands. User-facing output goes to stdout; diagnostics go to
//! the log file so the prompt stays clean.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::mcp::McpConnection;

use super::{display, executor, intent};

const PROMPT: &str = "querydesk> ";

/// Run the interactive session; consumes the connection and shuts it down
/// on exit.
pub async fn run(mut conn: McpConnection) -> Result<()> {
    print_banner(&conn);
    let mut editor = DefaultEditor::new()?;

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(input);

                match input {
                    "exit" | "quit" => break,
                    "tools" => print_tools(&conn),
                    "debug" => print_debug(&mut conn),
                    _ => {
                        if !handle_query(&conn, input).await {
                            break;
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("shutting down...");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "readline failed");
                break;
            }
        }
    }

    conn.shutdown().await;
    Ok(())
}

/// Process one free-text query. Returns `false` when the session is dead
/// and the loop should end.
async fn handle_query(conn: &McpConnection, input: &str) -> bool {
    let analysis = intent::analyze(input);
    println!("intent: {}", analysis.intent.as_str());
    if analysis.tables.is_empty() {
        println!("target tables: auto-detect");
    } else {
        println!("target tables: {}", analysis.tables.join(", "));
    }

    match executor::execute(conn, &analysis).await {
        Ok(result) => {
            println!("{}", "-".repeat(50));
            println!("{}", display::render_result(&result));
            println!("{}", "-".repeat(50));
            true
        }
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_fatal() {
                eprintln!("server connection lost; exiting");
                return false;
            }
            true
        }
    }
}

fn print_banner(conn: &McpConnection) {
    println!("querydesk ready.");
    if let Some(info) = conn.server_info() {
        if let Some(name) = &info.name {
            println!("connected to: {name}");
        }
    }
    if conn.is_degraded() {
        println!("warning: the server exposed no tool catalog; queries will fail");
    } else {
        println!("{} tools available", conn.registry().len());
    }
    println!();
    println!("try things like:");
    println!("  - show me all tables");
    println!("  - list orders from California");
    println!("  - how many tickets are open?");
    println!("  - describe the customers table");
    println!("type 'tools' to see available tools, 'exit' to quit");
    println!();
}

fn print_tools(conn: &McpConnection) {
    let tools = conn.registry().list();
    if tools.is_empty() {
        println!("no tools discovered; this usually means a connection issue");
        return;
    }
    println!("available tools:");
    for tool in tools {
        println!("  - {}: {}", tool.name, tool.description);
    }
}

fn print_debug(conn: &mut McpConnection) {
    println!("server process alive: {}", conn.is_alive());
    println!("session closed: {}", conn.session().is_closed());
    println!("tools registered: {}", conn.registry().len());
    println!("discovery degraded: {}", conn.is_degraded());
}
