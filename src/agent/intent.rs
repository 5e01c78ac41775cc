//! Keyword intent classifier for free-text queries.
//!
//! A deliberately simple, replaceable layer: substring keyword matching
//! decides the intent, a fixed keyword map picks target tables, and a few
//! positional extractors pull out location/limit/status conditions. It never
//! touches the wire — everything downstream goes through the tool registry
//! and session.

// ─── Types ───────────────────────────────────────────────────────────────────

/// What the user appears to want.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Select,
    Count,
    Insert,
    Update,
    Delete,
    Describe,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Select => "SELECT",
            Intent::Count => "COUNT",
            Intent::Insert => "INSERT",
            Intent::Update => "UPDATE",
            Intent::Delete => "DELETE",
            Intent::Describe => "DESCRIBE",
        }
    }
}

/// Filter conditions extracted from the input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    pub location: Option<String>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

/// The classified form of one user input.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub intent: Intent,
    pub tables: Vec<String>,
    pub conditions: Conditions,
    pub original: String,
}

// ─── Keyword Tables ──────────────────────────────────────────────────────────

const SELECT_WORDS: &[&str] = &["show", "list", "get", "find", "select", "display"];
const COUNT_WORDS: &[&str] = &["count", "how many", "total"];
const INSERT_WORDS: &[&str] = &["create", "add", "insert"];
const UPDATE_WORDS: &[&str] = &["update", "change", "modify"];
const DELETE_WORDS: &[&str] = &["delete", "remove", "drop"];
const DESCRIBE_WORDS: &[&str] = &["describe", "structure", "schema", "columns"];

/// Table name → trigger keywords, checked in order.
const TABLE_KEYWORDS: &[(&str, &[&str])] = &[
    ("customers", &["customer", "client", "user"]),
    ("orders", &["order", "purchase", "sale"]),
    ("products", &["product", "item"]),
    ("employees", &["employee", "staff", "worker"]),
    ("payments", &["payment", "invoice", "billing"]),
    ("support_tickets", &["ticket", "issue", "support"]),
];

// ─── Classifier ──────────────────────────────────────────────────────────────

/// Classify one line of user input.
pub fn analyze(input: &str) -> Analysis {
    let lower = input.to_lowercase();

    let intent = if contains_any(&lower, SELECT_WORDS) {
        Intent::Select
    } else if contains_any(&lower, COUNT_WORDS) {
        Intent::Count
    } else if contains_any(&lower, INSERT_WORDS) {
        Intent::Insert
    } else if contains_any(&lower, UPDATE_WORDS) {
        Intent::Update
    } else if contains_any(&lower, DELETE_WORDS) {
        Intent::Delete
    } else if contains_any(&lower, DESCRIBE_WORDS) {
        Intent::Describe
    } else {
        Intent::Select
    };

    let tables: Vec<String> = TABLE_KEYWORDS
        .iter()
        .filter(|(_, keywords)| contains_any(&lower, keywords))
        .map(|(table, _)| (*table).to_string())
        .collect();

    let conditions = Conditions {
        location: token_after_any(&lower, &["from", "in"]),
        limit: token_after_any(&lower, &["top", "first", "limit"])
            .and_then(|t| t.parse::<u32>().ok()),
        status: token_after_any(&lower, &["status", "state"]),
    };

    Analysis {
        intent,
        tables,
        conditions,
        original: input.to_string(),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// First whitespace-separated token following the first occurrence of any
/// marker word.
fn token_after_any(input: &str, markers: &[&str]) -> Option<String> {
    for marker in markers {
        if let Some((_, rest)) = input.split_once(marker) {
            if let Some(token) = rest.split_whitespace().next() {
                return Some(trim_punctuation(token).to_string());
            }
        }
    }
    None
}

fn trim_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
