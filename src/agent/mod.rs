//! Natural-language agent layer over the MCP session.
//!
//! Everything in here is a consumer of the core's interface — intent
//! classification, intent execution, result rendering, and the REPL. None
//! of it touches the process or the wire format directly.

pub mod display;
pub mod executor;
pub mod intent;
pub mod repl;
