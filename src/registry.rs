//! Ambient configuration registry.
//!
//! Holds the most recently configured [`ExecutionContext`] together with the
//! environment options it was built from. The registry is thread-local: each
//! thread configures and runs its own context, so repeated configuration
//! cycles on different threads cannot race.
//!
//! Typical flow:
//!
//! ```no_run
//! use std::sync::Arc;
//! use tidemark::registry::{self, ConfigureArgs, EnvironmentOptions, Mode};
//! use tidemark::sequencer::{LinearSequencer, RunArgs};
//!
//! # fn main() -> tidemark::Result<()> {
//! registry::prepare(EnvironmentOptions {
//!     mode: Mode::Rendering,
//!     sequencer: Some(Arc::new(LinearSequencer::new(vec![])?)),
//!     ..Default::default()
//! })?;
//! registry::configure(ConfigureArgs::default().with_dialect_name("postgresql"))?;
//! registry::run(&RunArgs::new())?;
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::context::{Durability, ExecutionContext, RunSummary};
use crate::dialect::DialectRegistry;
use crate::error::{MigrateError, Result};
use crate::revision::RevisionId;
use crate::sequencer::{MigrationSequencer, RunArgs};
use crate::sink::{ExecutionSink, LiveConnection};
use crate::statement::Statement;
use crate::version::{VersionStore, DEFAULT_VERSION_TABLE};

/// Whether statements run against a live store or are rendered as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Live,
    Rendering,
}

/// Options known before any context is configured, usually set by the
/// command that launched the migration environment.
#[derive(Default)]
pub struct EnvironmentOptions {
    pub mode: Mode,
    /// Supplies the steps for each run.
    pub sequencer: Option<Arc<dyn MigrationSequencer>>,
    /// Destination revision argument (`head`, `base`, or an id).
    pub destination: Option<String>,
    /// Starting revision argument, meaningful in rendering mode only.
    pub starting_rev: Option<String>,
    /// Free-form tag for environment scripts.
    pub tag: Option<String>,
    pub durability: Durability,
    pub dialects: DialectRegistry,
}

impl fmt::Debug for EnvironmentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentOptions")
            .field("mode", &self.mode)
            .field("has_sequencer", &self.sequencer.is_some())
            .field("destination", &self.destination)
            .field("starting_rev", &self.starting_rev)
            .field("tag", &self.tag)
            .field("durability", &self.durability)
            .finish()
    }
}

/// Inputs to [`configure`]. Exactly one of connection, URL or dialect name is
/// needed to determine the dialect; live mode additionally needs a connection.
#[derive(Default)]
pub struct ConfigureArgs {
    pub connection: Option<Box<dyn LiveConnection>>,
    pub url: Option<String>,
    pub dialect_name: Option<String>,
    /// Force transactional DDL on or off instead of the dialect default.
    pub durability: Option<Durability>,
    /// Destination of rendered SQL. Defaults to standard output.
    pub output: Option<Box<dyn Write + Send>>,
    pub starting_rev: Option<String>,
    pub tag: Option<String>,
    pub version_table: Option<String>,
}

impl ConfigureArgs {
    pub fn with_connection(mut self, conn: impl LiveConnection + 'static) -> Self {
        self.connection = Some(Box::new(conn));
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_dialect_name(mut self, name: impl Into<String>) -> Self {
        self.dialect_name = Some(name.into());
        self
    }

    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = Some(durability);
        self
    }

    pub fn with_output(mut self, output: impl Write + Send + 'static) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    pub fn with_starting_rev(mut self, rev: impl Into<String>) -> Self {
        self.starting_rev = Some(rev.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_version_table(mut self, table: impl Into<String>) -> Self {
        self.version_table = Some(table.into());
        self
    }
}

#[derive(Default)]
struct Registry {
    env: EnvironmentOptions,
    version_table: Option<String>,
    context: Option<ExecutionContext>,
    /// Set while the context is checked out by `run`.
    running: bool,
}

impl Registry {
    fn sequencer(&self) -> Result<Arc<dyn MigrationSequencer>> {
        self.env
            .sequencer
            .clone()
            .ok_or_else(|| MigrateError::config("no migration sequencer has been prepared"))
    }

    fn context_mut(&mut self) -> Result<&mut ExecutionContext> {
        match self.context.as_mut() {
            Some(ctx) => Ok(ctx),
            None if self.running => Err(MigrateError::ContextInUse),
            None => Err(MigrateError::NotConfigured),
        }
    }
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

fn with_registry<R>(f: impl FnOnce(&mut Registry) -> Result<R>) -> Result<R> {
    REGISTRY.with(|cell| {
        let mut registry = cell
            .try_borrow_mut()
            .map_err(|_| MigrateError::ContextInUse)?;
        f(&mut registry)
    })
}

/// Record the environment options for subsequent [`configure`] calls.
///
/// # Errors
///
/// Returns [`MigrateError::ContextInUse`] when called from inside a running
/// migration.
pub fn prepare(options: EnvironmentOptions) -> Result<()> {
    with_registry(|registry| {
        if registry.running {
            return Err(MigrateError::ContextInUse);
        }
        registry.env = options;
        Ok(())
    })
}

/// Build a new context and install it as the active one.
///
/// # Errors
///
/// Returns a configuration error if no dialect can be determined, if live
/// mode is requested without a connection, or if a starting revision is
/// combined with a live target.
pub fn configure(args: ConfigureArgs) -> Result<()> {
    with_registry(|registry| {
        let ConfigureArgs {
            connection,
            url,
            dialect_name,
            durability,
            output,
            starting_rev,
            tag,
            version_table,
        } = args;

        let dialects = &registry.env.dialects;
        let dialect = if let Some(conn) = &connection {
            dialects.resolve(conn.dialect_name())?
        } else if let Some(url) = &url {
            dialects.resolve_url(url)?
        } else if let Some(name) = &dialect_name {
            dialects.resolve(name)?
        } else {
            return Err(MigrateError::config(
                "a connection, url, or dialect name is required",
            ));
        };

        let durability = durability.unwrap_or(registry.env.durability);
        let starting_rev = starting_rev.or_else(|| registry.env.starting_rev.clone());
        let tag = tag.or_else(|| registry.env.tag.clone());
        let version_table = version_table.or_else(|| registry.version_table.clone());

        if registry.env.mode == Mode::Live && starting_rev.is_some() {
            return Err(MigrateError::config(
                "can't specify a starting revision when using a database connection",
            ));
        }

        let sequencer = registry.sequencer()?;
        let start = match starting_rev.as_deref() {
            Some(symbol) => sequencer.resolve(symbol)?,
            None => None,
        };

        let sink = match registry.env.mode {
            Mode::Live => {
                let conn = connection.ok_or_else(|| {
                    MigrateError::config("live mode requires a database connection")
                })?;
                ExecutionSink::live(conn, dialect)
            }
            Mode::Rendering => match output {
                Some(out) => ExecutionSink::rendering(out, dialect),
                None => ExecutionSink::stdout(dialect),
            },
        };

        let table = version_table.as_deref().unwrap_or(DEFAULT_VERSION_TABLE);
        let version = VersionStore::new(table, start)?;
        let context = ExecutionContext::new(sink, version, sequencer, durability)?;

        // Overrides persist only once a context was built from them.
        registry.env.durability = durability;
        registry.env.starting_rev = starting_rev;
        registry.env.tag = tag;
        registry.version_table = version_table;

        tracing::debug!(context = ?context, "Configured migration context");
        registry.context = Some(context);
        Ok(())
    })
}

/// Run `f` against the active context.
///
/// `f` must not call back into the registry; such calls fail with
/// [`MigrateError::ContextInUse`].
pub fn with_context<R>(f: impl FnOnce(&mut ExecutionContext) -> R) -> Result<R> {
    with_registry(|registry| Ok(f(registry.context_mut()?)))
}

/// Whether a context has been configured on this thread.
pub fn is_configured() -> bool {
    with_registry(|registry| Ok(registry.context.is_some() || registry.running))
        .unwrap_or(true)
}

/// Run migrations with the active context.
///
/// The context is checked out of the registry for the duration of the run;
/// steps receive the sink directly and should not use [`execute`].
pub fn run(args: &RunArgs) -> Result<RunSummary> {
    let mut context = with_registry(|registry| {
        registry.context_mut()?;
        let context = registry.context.take().ok_or(MigrateError::NotConfigured)?;
        registry.running = true;
        Ok(context)
    })?;

    let result = context.run(args);

    with_registry(|registry| {
        registry.running = false;
        // A step may have reconfigured; the newer context wins.
        if registry.context.is_none() {
            registry.context = Some(context);
        }
        Ok(())
    })?;
    result
}

/// Execute a statement with the active context.
pub fn execute(stmt: impl Into<Statement>) -> Result<()> {
    let stmt = stmt.into();
    with_context(|ctx| ctx.execute(stmt))?
}

/// Whether the environment expects a live database connection.
pub fn requires_live_target() -> bool {
    with_registry(|registry| Ok(registry.env.mode == Mode::Live)).unwrap_or(true)
}

/// The starting revision argument.
///
/// # Errors
///
/// Returns a configuration error if no context is configured and no starting
/// revision was supplied.
pub fn starting_revision() -> Result<Option<RevisionId>> {
    with_registry(|registry| {
        if let Some(ctx) = &registry.context {
            return Ok(ctx.starting_revision().cloned());
        }
        match registry.env.starting_rev.as_deref() {
            Some(symbol) => registry.sequencer()?.resolve(symbol),
            None => Err(MigrateError::config(
                "no starting revision argument is available",
            )),
        }
    })
}

/// The destination revision argument, with `head`/`base` resolved.
pub fn destination_revision() -> Result<Option<RevisionId>> {
    with_registry(|registry| {
        let symbol = registry
            .env
            .destination
            .clone()
            .ok_or_else(|| MigrateError::config("no destination revision argument is available"))?;
        registry.sequencer()?.resolve(&symbol)
    })
}

/// The head revision of the prepared sequencer.
pub fn head_revision() -> Result<Option<RevisionId>> {
    with_registry(|registry| registry.sequencer()?.resolve("head"))
}

/// The `tag` option, if any.
pub fn tag() -> Option<String> {
    with_registry(|registry| Ok(registry.env.tag.clone()))
        .ok()
        .flatten()
}

/// Drop the active context and every option.
pub fn clear() {
    let _ = with_registry(|registry| {
        *registry = Registry::default();
        Ok(())
    });
}
