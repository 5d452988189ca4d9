//! The persisted version pointer.
//!
//! One table, one `version_num` column, zero or one rows. No row means no
//! revision is applied.

use crate::error::{MigrateError, Result};
use crate::revision::{DisplayRev, RevisionId};
use crate::sink::ExecutionSink;
use crate::statement::Statement;

/// Default name of the pointer table.
pub const DEFAULT_VERSION_TABLE: &str = "tidemark_version";

/// Reads and writes the version pointer through an [`ExecutionSink`].
#[derive(Debug, Clone)]
pub struct VersionStore {
    table: String,
    start_override: Option<RevisionId>,
}

impl VersionStore {
    /// Create a store for `table`.
    ///
    /// `start_override` supplies the current revision in rendering mode,
    /// where the target cannot be queried.
    pub fn new(table: impl Into<String>, start_override: Option<RevisionId>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self {
            table,
            start_override,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn start_override(&self) -> Option<&RevisionId> {
        self.start_override.as_ref()
    }

    /// Current revision of the target.
    pub fn read(&self, sink: &mut ExecutionSink) -> Result<Option<RevisionId>> {
        if sink.is_rendering() {
            return Ok(self.start_override.clone());
        }
        if self.start_override.is_some() {
            return Err(MigrateError::config(
                "can't specify a starting revision when using a database connection",
            ));
        }

        sink.execute(Statement::CreateVersionTable {
            table: self.table.clone(),
            if_not_exists: true,
        })?;
        let value = sink.query_scalar(&Statement::SelectVersion {
            table: self.table.clone(),
        })?;
        value.map(RevisionId::new).transpose()
    }

    /// Move the pointer from `old` to `new`.
    pub fn write(
        &self,
        sink: &mut ExecutionSink,
        old: Option<&RevisionId>,
        new: Option<&RevisionId>,
    ) -> Result<()> {
        if old == new {
            return Ok(());
        }
        tracing::debug!(from = %DisplayRev(old), to = %DisplayRev(new), "Updating version pointer");

        let table = self.table.clone();
        let stmt = match (old, new) {
            (_, None) => Statement::DeleteVersion { table },
            (None, Some(rev)) => Statement::InsertVersion {
                table,
                revision: rev.clone(),
            },
            (Some(_), Some(rev)) => Statement::UpdateVersion {
                table,
                revision: rev.clone(),
            },
        };
        sink.execute(stmt)
    }

    /// Create the pointer table unconditionally.
    pub fn create(&self, sink: &mut ExecutionSink) -> Result<()> {
        sink.execute(Statement::CreateVersionTable {
            table: self.table.clone(),
            if_not_exists: false,
        })
    }

    /// Drop the pointer table.
    pub fn drop_table(&self, sink: &mut ExecutionSink) -> Result<()> {
        sink.execute(Statement::DropVersionTable {
            table: self.table.clone(),
        })
    }
}

fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MigrateError::config(format!(
            "invalid version table name '{name}'"
        )))
    }
}
