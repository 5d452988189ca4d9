//! Execution sinks: where statements go.
//!
//! - `Live`: statements run against a connected store
//! - `Rendering`: statements are serialized to a text stream, nothing runs
//!
//! The variant is chosen once, when the context is configured.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use rusqlite::OptionalExtension;

use crate::dialect::Dialect;
use crate::error::{DriverError, MigrateError, Result};
use crate::statement::Statement;

/// Statement-execution primitive of a connected store.
pub trait LiveConnection: Send {
    /// Dialect name used to resolve capabilities for this connection.
    fn dialect_name(&self) -> &str;

    /// Execute one or more statements, discarding any rows.
    fn execute(&mut self, sql: &str) -> Result<(), DriverError>;

    /// Run a query and return the first column of the first row, if any.
    fn query_scalar(&mut self, sql: &str) -> Result<Option<String>, DriverError>;
}

impl LiveConnection for rusqlite::Connection {
    fn dialect_name(&self) -> &str {
        "sqlite"
    }

    fn execute(&mut self, sql: &str) -> Result<(), DriverError> {
        self.execute_batch(sql)?;
        Ok(())
    }

    fn query_scalar(&mut self, sql: &str) -> Result<Option<String>, DriverError> {
        let value = self
            .query_row(sql, [], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }
}

/// Sink that executes against a live connection.
pub struct LiveSink {
    conn: Box<dyn LiveConnection>,
    dialect: Arc<dyn Dialect>,
}

/// Sink that writes rendered statements to an output stream.
pub struct RenderSink {
    out: Box<dyn Write + Send>,
    dialect: Arc<dyn Dialect>,
}

/// Output target for everything a migration run emits.
pub enum ExecutionSink {
    Live(LiveSink),
    Rendering(RenderSink),
}

impl ExecutionSink {
    /// Create a sink that executes statements on `conn`.
    pub fn live(conn: Box<dyn LiveConnection>, dialect: Arc<dyn Dialect>) -> Self {
        Self::Live(LiveSink { conn, dialect })
    }

    /// Create a sink that renders statements to `out`.
    pub fn rendering(out: Box<dyn Write + Send>, dialect: Arc<dyn Dialect>) -> Self {
        Self::Rendering(RenderSink { out, dialect })
    }

    /// Create a sink that renders statements to standard output.
    pub fn stdout(dialect: Arc<dyn Dialect>) -> Self {
        Self::rendering(Box::new(std::io::stdout()), dialect)
    }

    pub fn is_rendering(&self) -> bool {
        matches!(self, Self::Rendering(_))
    }

    pub fn dialect(&self) -> &dyn Dialect {
        match self {
            Self::Live(sink) => sink.dialect.as_ref(),
            Self::Rendering(sink) => sink.dialect.as_ref(),
        }
    }

    /// Execute (Live) or render (Rendering) a statement.
    pub fn execute(&mut self, stmt: impl Into<Statement>) -> Result<()> {
        let stmt = stmt.into();
        match self {
            Self::Live(sink) => {
                let sql = sink.dialect.render(&stmt)?;
                tracing::trace!(sql = %sql, "Executing statement");
                sink.conn.execute(&sql).map_err(MigrateError::Driver)
            }
            Self::Rendering(sink) => {
                let sql = sink.dialect.render(&stmt)?;
                // A trailing line comment would swallow the terminator.
                let in_comment = sql.lines().last().is_some_and(|line| line.contains("--"));
                if in_comment {
                    write!(sink.out, "{sql}\n;\n\n")?;
                } else {
                    write!(sink.out, "{sql};\n\n")?;
                }
                Ok(())
            }
        }
    }

    /// Emit a non-executable annotation. No-op for live sinks.
    pub fn static_output(&mut self, text: &str) -> Result<()> {
        if let Self::Rendering(sink) = self {
            write!(sink.out, "{text}\n\n")?;
        }
        Ok(())
    }

    /// Run a scalar query. Only a live sink can answer queries.
    pub fn query_scalar(&mut self, stmt: &Statement) -> Result<Option<String>> {
        match self {
            Self::Live(sink) => {
                let sql = sink.dialect.render(stmt)?;
                sink.conn.query_scalar(&sql).map_err(MigrateError::Driver)
            }
            Self::Rendering(_) => Err(MigrateError::config(
                "cannot query the target while rendering SQL",
            )),
        }
    }

    /// Direct access to the live connection, if there is one.
    pub fn bind(&mut self) -> Option<&mut dyn LiveConnection> {
        match self {
            Self::Live(sink) => Some(sink.conn.as_mut()),
            Self::Rendering(_) => None,
        }
    }

    /// Flush buffered rendered output.
    pub fn flush(&mut self) -> Result<()> {
        if let Self::Rendering(sink) = self {
            sink.out.flush()?;
        }
        Ok(())
    }
}

impl fmt::Debug for ExecutionSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_rendering() { "Rendering" } else { "Live" };
        f.debug_struct("ExecutionSink")
            .field("kind", &kind)
            .field("dialect", &self.dialect().name())
            .finish()
    }
}
