//! Tool registry — the decoded catalog of remote-callable operations.
//!
//! Populated once by the handshake and replaced atomically; never merged.
//! Server implementations do not agree on tool naming (`read_data` vs
//! `query_table` vs `query`), so lookup goes through ordered candidate
//! lists rather than a single well-known name.

use std::sync::RwLock;

use super::types::ToolDefinition;

/// Thread-safe snapshot of the server's tool catalog.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<ToolDefinition>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically swap the held tool set.
    pub fn replace(&self, tools: Vec<ToolDefinition>) {
        let mut guard = self.tools.write().unwrap();
        *guard = tools;
    }

    /// Return the first candidate name present in the registry, in
    /// candidate order — exact match only.
    pub fn resolve(&self, candidates: &[&str]) -> Option<String> {
        let tools = self.tools.read().unwrap();
        for candidate in candidates {
            if tools.iter().any(|t| t.name == *candidate) {
                return Some((*candidate).to_string());
            }
        }
        None
    }

    /// Read-only snapshot of the catalog.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.read().unwrap().clone()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.read().unwrap().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.read().unwrap().is_empty()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: format!("{name} tool"),
            input_schema: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_resolve_honors_candidate_order() {
        let registry = ToolRegistry::new();
        registry.replace(vec![tool("query_table"), tool("describe_table")]);

        // First candidate missing, second present.
        assert_eq!(
            registry.resolve(&["read_data", "query_table"]),
            Some("query_table".to_string())
        );

        // Candidate order wins over registry order.
        registry.replace(vec![tool("query_table"), tool("read_data")]);
        assert_eq!(
            registry.resolve(&["read_data", "query_table"]),
            Some("read_data".to_string())
        );
    }

    #[test]
    fn test_resolve_misses_return_none() {
        let registry = ToolRegistry::new();
        registry.replace(vec![tool("query_table"), tool("describe_table")]);
        assert_eq!(registry.resolve(&["insert_data", "write_data"]), None);
        assert_eq!(registry.resolve(&[]), None);
    }

    #[test]
    fn test_resolve_is_exact_match_only() {
        let registry = ToolRegistry::new();
        registry.replace(vec![tool("query_table_v2")]);
        assert_eq!(registry.resolve(&["query_table"]), None);
    }

    #[test]
    fn test_replace_swaps_never_merges() {
        let registry = ToolRegistry::new();
        registry.replace(vec![tool("a"), tool("b")]);
        assert_eq!(registry.len(), 2);

        registry.replace(vec![tool("c")]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve(&["a"]), None);
        assert_eq!(registry.resolve(&["c"]), Some("c".to_string()));
    }

    #[test]
    fn test_list_returns_snapshot() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());

        registry.replace(vec![tool("list_tables")]);
        let snapshot = registry.list();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "list_tables");

        // Mutating after the snapshot does not affect it.
        registry.replace(Vec::new());
        assert_eq!(snapshot.len(), 1);
    }
}
