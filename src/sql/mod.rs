//! Statement splitting and classification.
//!
//! Splits a raw multi-statement batch on `;` and classifies each statement
//! by its leading keyword to decide whether it produces a result set.
//! This is deliberately shallow prefix matching, not a SQL grammar.

use std::fmt;

/// How a single statement behaves when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Produces a result set (`select`, `show`, `desc`/`describe`).
    Query,
    /// Switches the active schema/catalog for the rest of the session
    /// (`use`). No result set, but later statements in the same batch see
    /// its effect.
    ContextChange,
    /// Everything else: insert/update/delete/DDL. No result set.
    Mutation,
}

impl StatementKind {
    /// Classifies one statement by its leading keyword.
    ///
    /// Case-insensitive and tolerant of leading whitespace. Anything that
    /// is not recognizably a query or a context change is treated as a
    /// mutation and executed through the update path.
    pub fn classify(statement: &str) -> Self {
        let trimmed = statement.trim_start();

        if starts_with_keyword(trimmed, "desc")
            || starts_with_keyword(trimmed, "show")
            || starts_with_keyword(trimmed, "select")
        {
            Self::Query
        } else if starts_with_keyword(trimmed, "use") {
            Self::ContextChange
        } else {
            Self::Mutation
        }
    }

    /// Returns true if executing this statement yields rows.
    pub fn has_result_set(&self) -> bool {
        matches!(self, Self::Query)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::ContextChange => write!(f, "context change"),
            Self::Mutation => write!(f, "mutation"),
        }
    }
}

fn starts_with_keyword(statement: &str, keyword: &str) -> bool {
    statement.len() >= keyword.len() && statement[..keyword.len()].eq_ignore_ascii_case(keyword)
}

/// Splits a raw batch on `;` into trimmed, non-empty statement texts.
///
/// Known limitation: a `;` inside a quoted literal splits the statement
/// incorrectly. Callers submitting such batches get two broken statements,
/// not an error from the splitter.
pub fn split_statements(batch: &str) -> Vec<&str> {
    batch
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
