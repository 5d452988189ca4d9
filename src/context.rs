//! The migration execution context.
//!
//! Owns the execution sink and the version pointer, asks the sequencer for
//! steps, applies them, and decides when the pointer moves:
//!
//! - non-transactional DDL: after every step, so a failure leaves the pointer
//!   at the last step that completed
//! - transactional DDL: once at the end of the run, from the starting
//!   revision straight to the final one
//!
//! In rendering mode the same loop produces a replayable script instead.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::dialect::Dialect;
use crate::error::{MigrateError, Result};
use crate::revision::{DisplayRev, RevisionId};
use crate::sequencer::{MigrationSequencer, RunArgs};
use crate::sink::{ExecutionSink, LiveConnection};
use crate::statement::Statement;
use crate::version::VersionStore;

/// Whether pointer writes are batched into one transaction or made per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    Transactional,
    NonTransactional,
    /// Use the dialect's transactional DDL capability.
    #[default]
    Auto,
}

impl Durability {
    /// Resolve to "transactional or not" for a dialect.
    pub fn resolve(self, dialect: &dyn Dialect) -> bool {
        match self {
            Self::Transactional => true,
            Self::NonTransactional => false,
            Self::Auto => dialect.supports_transactional_ddl(),
        }
    }
}

impl From<Option<bool>> for Durability {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Transactional,
            Some(false) => Self::NonTransactional,
            None => Self::Auto,
        }
    }
}

impl FromStr for Durability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transactional" | "on" | "true" => Ok(Self::Transactional),
            "non-transactional" | "off" | "false" => Ok(Self::NonTransactional),
            "auto" => Ok(Self::Auto),
            _ => Err(format!("unknown durability mode: {}", s)),
        }
    }
}

impl fmt::Display for Durability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transactional => "transactional",
            Self::NonTransactional => "non-transactional",
            Self::Auto => "auto",
        })
    }
}

/// Outcome of one `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of steps applied.
    pub steps: usize,
    /// Revision the run started from.
    pub start: Option<RevisionId>,
    /// Revision the run ended at.
    pub end: Option<RevisionId>,
}

/// Maintains state throughout a migration run.
pub struct ExecutionContext {
    sink: ExecutionSink,
    version: VersionStore,
    sequencer: Arc<dyn MigrationSequencer>,
    transactional_ddl: bool,
}

impl ExecutionContext {
    /// Build a context.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a starting revision override is
    /// combined with a live sink.
    pub fn new(
        sink: ExecutionSink,
        version: VersionStore,
        sequencer: Arc<dyn MigrationSequencer>,
        durability: Durability,
    ) -> Result<Self> {
        if !sink.is_rendering() && version.start_override().is_some() {
            return Err(MigrateError::config(
                "can't specify a starting revision when using a database connection",
            ));
        }
        let transactional_ddl = durability.resolve(sink.dialect());
        Ok(Self {
            sink,
            version,
            sequencer,
            transactional_ddl,
        })
    }

    /// Apply every step the sequencer yields from the current revision.
    pub fn run(&mut self, args: &RunArgs) -> Result<RunSummary> {
        let rendering = self.sink.is_rendering();
        let transactional = self.transactional_ddl;
        let (begin, commit) = {
            let dialect = self.sink.dialect();
            tracing::info!(dialect = dialect.name(), "Context impl {}", dialect.name());
            (dialect.begin_marker(), dialect.commit_marker())
        };
        if rendering {
            tracing::info!("Generating static SQL");
        }
        tracing::info!(
            "Will assume {} DDL",
            if transactional { "transactional" } else { "non-transactional" }
        );

        if rendering && transactional {
            self.sink.static_output(begin)?;
        }

        let anchor = self.version.read(&mut self.sink)?;
        let sequencer = Arc::clone(&self.sequencer);
        let steps = sequencer.next_steps(anchor.as_ref())?;

        let mut baseline: Option<Option<RevisionId>> = None;
        let mut last: Option<Option<RevisionId>> = None;
        let mut applied = 0;

        for step in steps {
            let step = step?;
            if baseline.is_none() {
                if rendering && step.from.is_none() {
                    self.version.create(&mut self.sink)?;
                }
                baseline = Some(step.from.clone());
            }

            let from = DisplayRev(step.from.as_ref());
            let to = DisplayRev(step.to.as_ref());
            tracing::info!("Running {} {} -> {}", step.name, from, to);
            if rendering {
                self.sink
                    .static_output(&format!("-- Running {} {} -> {}", step.name, from, to))?;
            }

            (step.apply)(&mut self.sink, args)?;

            if !transactional {
                self.version
                    .write(&mut self.sink, step.from.as_ref(), step.to.as_ref())?;
            }
            applied += 1;
            last = Some(step.to);
        }

        let end = match last {
            Some(end) => {
                if transactional {
                    let start = baseline.flatten();
                    self.version.write(&mut self.sink, start.as_ref(), end.as_ref())?;
                }
                if rendering && end.is_none() {
                    self.version.drop_table(&mut self.sink)?;
                }
                end
            }
            None => anchor.clone(),
        };

        if rendering && transactional {
            self.sink.static_output(commit)?;
        }
        self.sink.flush()?;

        tracing::info!(steps = applied, revision = %DisplayRev(end.as_ref()), "Migration run complete");
        Ok(RunSummary {
            steps: applied,
            start: anchor,
            end,
        })
    }

    /// Execute (or render) a statement outside of the run loop.
    pub fn execute(&mut self, stmt: impl Into<Statement>) -> Result<()> {
        self.sink.execute(stmt)
    }

    /// Emit a comment-style annotation into the rendered script.
    pub fn static_output(&mut self, text: &str) -> Result<()> {
        self.sink.static_output(text)
    }

    /// Revision currently recorded by the target.
    ///
    /// In rendering mode this is the configured starting revision.
    pub fn current_revision(&mut self) -> Result<Option<RevisionId>> {
        self.version.read(&mut self.sink)
    }

    /// The starting revision override, if one was configured.
    pub fn starting_revision(&self) -> Option<&RevisionId> {
        self.version.start_override()
    }

    pub fn transactional_ddl(&self) -> bool {
        self.transactional_ddl
    }

    pub fn is_rendering(&self) -> bool {
        self.sink.is_rendering()
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.sink.dialect()
    }

    pub fn version_table(&self) -> &str {
        self.version.table()
    }

    /// The live connection, or `None` when rendering.
    pub fn bind(&mut self) -> Option<&mut dyn LiveConnection> {
        self.sink.bind()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("sink", &self.sink)
            .field("version_table", &self.version.table())
            .field("transactional_ddl", &self.transactional_ddl)
            .finish()
    }
}
