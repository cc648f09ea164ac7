//! Request certification: what may run against a live connector.
//!
//! The keyword and pattern blacklists are a compatibility layer, not a
//! security boundary. Connectors should still receive parameterized queries.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::expr::{self, Expr, SAFE_BUILTINS};

/// Keywords that mutate data or privileges; denied in read-only mode.
pub const MUTATING_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE", "GRANT", "REVOKE",
    "EXEC", "EXECUTE",
];

/// Substrings associated with injection probes, checked case-insensitively
/// in this order.
pub const SUSPICIOUS_PATTERNS: &[&str] = &["--", ";--", "/*", "*/", "@@", "CHAR(", "NCHAR("];

static MUTATING_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = MUTATING_KEYWORDS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("keyword pattern is valid")
});

/// Outcome of certifying a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum PolicyVerdict {
    Allowed,
    Denied { reason: String },
}

impl PolicyVerdict {
    pub fn denied(reason: impl Into<String>) -> Self {
        PolicyVerdict::Denied {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyVerdict::Allowed)
    }

    /// The denial reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            PolicyVerdict::Allowed => None,
            PolicyVerdict::Denied { reason } => Some(reason),
        }
    }
}

/// Certify a query string.
pub fn validate_query(query: &str, read_only: bool) -> PolicyVerdict {
    if query.trim().is_empty() {
        return PolicyVerdict::denied("Empty query");
    }

    if read_only {
        // leftmost match, so a leading keyword is always the one reported
        if let Some(m) = MUTATING_KEYWORD_RE.find(query) {
            return PolicyVerdict::denied(format!(
                "Dangerous keyword '{}' not allowed in read-only mode",
                m.as_str().to_ascii_uppercase()
            ));
        }
    }

    let upper = query.to_uppercase();
    for pattern in SUSPICIOUS_PATTERNS {
        if upper.contains(pattern) {
            return PolicyVerdict::denied(format!("Suspicious pattern '{pattern}' detected"));
        }
    }

    PolicyVerdict::Allowed
}

/// Certify an expression, returning the parsed tree when allowed.
pub fn check_expression(expression: &str) -> Result<Expr, PolicyVerdict> {
    if expression.trim().is_empty() {
        return Err(PolicyVerdict::denied("Empty expression"));
    }

    let tree = expr::parse(expression)
        .map_err(|e| PolicyVerdict::denied(format!("Syntax error: {e}")))?;

    for node in tree.nodes() {
        match node {
            Expr::Import { .. } => {
                return Err(PolicyVerdict::denied("Import statements not allowed"));
            }
            Expr::Call { func, .. } => match func.as_ref() {
                Expr::Name(name) if SAFE_BUILTINS.contains(&name.as_str()) => {}
                Expr::Name(name) => {
                    return Err(PolicyVerdict::denied(format!(
                        "Function '{name}' not allowed"
                    )));
                }
                _ => return Err(PolicyVerdict::denied("Complex function calls not allowed")),
            },
            _ => {}
        }
    }

    Ok(tree)
}

/// Certify an expression.
pub fn validate_expression(expression: &str) -> PolicyVerdict {
    match check_expression(expression) {
        Ok(_) => PolicyVerdict::Allowed,
        Err(verdict) => verdict,
    }
}
