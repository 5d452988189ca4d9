//! Statements issued through an execution sink.
//!
//! Caller SQL is carried as text; the version pointer statements are kept
//! structured so each dialect renders them itself.

use crate::revision::RevisionId;

/// A single executable statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Caller-supplied SQL, passed through verbatim.
    Sql(String),
    /// Create the version pointer table.
    CreateVersionTable { table: String, if_not_exists: bool },
    /// Drop the version pointer table.
    DropVersionTable { table: String },
    /// Read the pointer row.
    SelectVersion { table: String },
    /// Insert the pointer row.
    InsertVersion { table: String, revision: RevisionId },
    /// Overwrite the existing pointer row.
    UpdateVersion { table: String, revision: RevisionId },
    /// Remove the pointer row.
    DeleteVersion { table: String },
}

impl Statement {
    pub fn sql(text: impl Into<String>) -> Self {
        Self::Sql(text.into())
    }
}

impl From<&str> for Statement {
    fn from(text: &str) -> Self {
        Self::Sql(text.to_string())
    }
}

impl From<String> for Statement {
    fn from(text: String) -> Self {
        Self::Sql(text)
    }
}

/// Quote a value as a SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
