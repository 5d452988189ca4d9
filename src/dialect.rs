//! Dialect capabilities and the name-based dialect registry.
//!
//! A dialect knows two things the execution core needs:
//! - whether the target runs DDL inside transactions
//! - how to render a [`Statement`] as text
//!
//! Dialects are resolved from a live connection, a target URL, or an
//! explicit name through [`DialectRegistry`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::error::{MigrateError, Result};
use crate::statement::{quote_literal, Statement};

/// Capability interface for a target store kind.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Canonical registry name.
    fn name(&self) -> &'static str;

    /// Whether DDL statements participate in transactions on this target.
    fn supports_transactional_ddl(&self) -> bool;

    /// Marker emitted before a transactional script.
    fn begin_marker(&self) -> &'static str {
        "BEGIN;"
    }

    /// Marker emitted after a transactional script.
    fn commit_marker(&self) -> &'static str {
        "COMMIT;"
    }

    /// Render a statement as SQL text, without the trailing terminator.
    fn render(&self, stmt: &Statement) -> Result<String> {
        render_ansi(stmt)
    }
}

fn render_ansi(stmt: &Statement) -> Result<String> {
    let text = match stmt {
        Statement::Sql(sql) => {
            let sql = sql.trim().trim_end_matches(';').trim_end();
            if sql.is_empty() {
                return Err(MigrateError::Render("empty SQL statement".into()));
            }
            sql.to_string()
        }
        Statement::CreateVersionTable { table, if_not_exists } => format!(
            "CREATE TABLE {}{table} (\n    version_num VARCHAR(32) NOT NULL\n)",
            if *if_not_exists { "IF NOT EXISTS " } else { "" }
        ),
        Statement::DropVersionTable { table } => format!("DROP TABLE {table}"),
        Statement::SelectVersion { table } => format!("SELECT version_num FROM {table}"),
        Statement::InsertVersion { table, revision } => format!(
            "INSERT INTO {table} (version_num) VALUES ({})",
            quote_literal(revision.as_str())
        ),
        Statement::UpdateVersion { table, revision } => format!(
            "UPDATE {table} SET version_num={}",
            quote_literal(revision.as_str())
        ),
        Statement::DeleteVersion { table } => format!("DELETE FROM {table}"),
    };
    Ok(text)
}

/// SQLite: DDL is transactional.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }
}

/// PostgreSQL: DDL is transactional.
#[derive(Debug, Default, Clone, Copy)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }
}

/// MySQL: every DDL statement commits implicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn supports_transactional_ddl(&self) -> bool {
        false
    }

    fn begin_marker(&self) -> &'static str {
        "START TRANSACTION;"
    }
}

/// Factory producing a dialect instance.
pub type DialectFactory = fn() -> Arc<dyn Dialect>;

/// Explicit mapping from target-kind names to dialect factories.
#[derive(Clone)]
pub struct DialectRegistry {
    factories: BTreeMap<String, DialectFactory>,
}

impl DialectRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register a factory under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, factory: DialectFactory) -> &mut Self {
        self.factories.insert(name.into().to_ascii_lowercase(), factory);
        self
    }

    /// Names of all registered dialects, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Resolve a dialect by target-kind name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Dialect>> {
        self.factories
            .get(&name.to_ascii_lowercase())
            .map(|factory| factory())
            .ok_or_else(|| {
                MigrateError::config(format!(
                    "unknown dialect '{}' (known: {})",
                    name,
                    self.names().join(", ")
                ))
            })
    }

    /// Resolve a dialect from a target URL such as `postgresql+psycopg://host/db`.
    pub fn resolve_url(&self, url: &str) -> Result<Arc<dyn Dialect>> {
        let parsed = Url::parse(url)
            .map_err(|e| MigrateError::config(format!("invalid database URL '{url}': {e}")))?;
        let scheme = parsed.scheme();
        let base = scheme.split('+').next().unwrap_or(scheme);
        self.resolve(base)
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("sqlite", || Arc::new(Sqlite))
            .register("postgresql", || Arc::new(Postgres))
            .register("postgres", || Arc::new(Postgres))
            .register("mysql", || Arc::new(MySql));
        registry
    }
}

impl fmt::Debug for DialectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectRegistry")
            .field("names", &self.names())
            .finish()
    }
}
