//! tidemark: apply, revert and render schema migrations.
//!
//! # Usage
//!
//! ```bash
//! tidemark --database-url sqlite:///app.db upgrade
//! tidemark --sql --dialect postgresql upgrade base:head > upgrade.sql
//! ```
//!
//! Environment variables can also be used:
//! - `TIDEMARK_DATABASE_URL`: Database URL
//! - `TIDEMARK_DIR`: Directory containing migration scripts
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::sync::Arc;

use tidemark::config::{split_revision_range, sqlite_path, Command, Config, OutputFormat};
use tidemark::observability::tracing::init_tracing;
use tidemark::registry::{self, ConfigureArgs, EnvironmentOptions};
use tidemark::revision::RevisionId;
use tidemark::scripts::load_directory;
use tidemark::RunArgs;

#[derive(Serialize)]
struct RevisionOutput {
    revision: Option<String>,
}

fn main() -> Result<()> {
    let config = Config::parse_args();
    init_tracing(&config.log_level);

    match config.command.clone() {
        Command::Upgrade { revision } | Command::Downgrade { revision } => {
            migrate(&config, &revision)
        }
        Command::Current => current(&config),
        Command::Heads => heads(&config),
    }
}

/// Prepare the registry for a destination and configure a context.
fn setup(config: &Config, revision: &str) -> Result<()> {
    let (start, destination) =
        split_revision_range(revision, config.sql).map_err(anyhow::Error::msg)?;

    let sequencer = load_directory(&config.dir)
        .with_context(|| format!("failed to load migrations from {}", config.dir.display()))?
        .with_destination(destination.clone());

    registry::prepare(EnvironmentOptions {
        mode: config.mode(),
        sequencer: Some(Arc::new(sequencer)),
        destination: Some(destination),
        starting_rev: start,
        tag: config.tag.clone(),
        durability: config.transactional_ddl,
        ..Default::default()
    })?;

    let mut args = ConfigureArgs::default().with_version_table(config.version_table.clone());
    if config.sql {
        args.url = config.database_url.clone();
        args.dialect_name = config.dialect.clone();
    } else {
        let url = config
            .database_url
            .as_deref()
            .context("--database-url is required unless --sql is given")?;
        args = args.with_connection(open_sqlite(url)?);
    }

    registry::configure(args).context("failed to configure migration context")?;
    Ok(())
}

fn open_sqlite(url: &str) -> Result<rusqlite::Connection> {
    let conn = match sqlite_path(url).map_err(anyhow::Error::msg)? {
        Some(path) => rusqlite::Connection::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?,
        None => rusqlite::Connection::open_in_memory()?,
    };
    Ok(conn)
}

fn migrate(config: &Config, revision: &str) -> Result<()> {
    setup(config, revision)?;

    // A live transactional run is wrapped in one native transaction so the
    // schema changes and the single pointer write commit together.
    let wrap = !config.sql && registry::with_context(|ctx| ctx.transactional_ddl())?;
    if wrap {
        registry::execute("BEGIN")?;
    }

    match registry::run(&RunArgs::new()) {
        Ok(summary) => {
            if wrap {
                registry::execute("COMMIT")?;
            }
            tracing::info!(
                steps = summary.steps,
                revision = ?summary.end.as_ref().map(RevisionId::as_str),
                "Done"
            );
            Ok(())
        }
        Err(err) => {
            if wrap {
                if let Err(rollback) = registry::execute("ROLLBACK") {
                    tracing::warn!(error = %rollback, "Rollback failed");
                }
            }
            Err(err).context("migration failed")
        }
    }
}

fn current(config: &Config) -> Result<()> {
    if config.sql {
        bail!("'current' needs a database connection and cannot be used with --sql");
    }
    setup(config, "head")?;
    let revision = registry::with_context(|ctx| ctx.current_revision())??;
    print_revision(revision, config.output)
}

fn heads(config: &Config) -> Result<()> {
    let sequencer = load_directory(&config.dir)
        .with_context(|| format!("failed to load migrations from {}", config.dir.display()))?;
    registry::prepare(EnvironmentOptions {
        sequencer: Some(Arc::new(sequencer)),
        ..Default::default()
    })?;
    print_revision(registry::head_revision()?, config.output)
}

fn print_revision(revision: Option<RevisionId>, format: OutputFormat) -> Result<()> {
    let output = RevisionOutput {
        revision: revision.map(|r| r.to_string()),
    };
    match format {
        OutputFormat::Text => println!("{}", output.revision.as_deref().unwrap_or("<base>")),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
    }
    Ok(())
}
