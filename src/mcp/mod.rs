//! MCP stdio client — session management for a child tool-server process.
//!
//! This module family handles:
//! - Spawning and supervising the server child process
//! - Newline-delimited JSON-RPC framing over stdio
//! - Request/response correlation with per-call timeouts
//! - The initialize/initialized/tools-list handshake
//! - The discovered tool catalog
//!
//! The agent layer consumes only [`McpConnection`] and [`ToolRegistry`];
//! everything about processes and wire bytes stays in here.

pub mod client;
pub mod errors;
pub mod framing;
pub mod handshake;
pub mod process;
pub mod registry;
pub mod session;
pub mod types;

// Re-exports for convenience
pub use client::{McpConnection, DEFAULT_CALL_TIMEOUT};
pub use errors::McpError;
pub use process::LaunchSpec;
pub use registry::ToolRegistry;
pub use session::Session;
pub use types::ToolDefinition;
