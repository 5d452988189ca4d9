//! Command-line configuration for the `tidemark` binary.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Defaults that work from a project root with a `migrations/` directory

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::context::Durability;
use crate::registry::Mode;
use crate::version::DEFAULT_VERSION_TABLE;

/// tidemark: apply, revert and render schema migrations.
#[derive(Parser, Debug, Clone)]
#[command(name = "tidemark")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Config {
    /// Database URL (e.g. sqlite:///app.db). Live mode supports sqlite only.
    #[arg(short = 'u', long, env = "TIDEMARK_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Dialect name, used for --sql when no URL is given
    #[arg(long, env = "TIDEMARK_DIALECT")]
    pub dialect: Option<String>,

    /// Directory containing migration scripts
    #[arg(short, long, env = "TIDEMARK_DIR", default_value = "./migrations")]
    pub dir: PathBuf,

    /// Render SQL to stdout instead of executing it
    #[arg(long)]
    pub sql: bool,

    /// Transactional DDL: auto, on or off
    #[arg(long, env = "TIDEMARK_TRANSACTIONAL_DDL", default_value = "auto")]
    pub transactional_ddl: Durability,

    /// Free-form tag made available to migration environments
    #[arg(long)]
    pub tag: Option<String>,

    /// Name of the version pointer table
    #[arg(long, env = "TIDEMARK_VERSION_TABLE", default_value = DEFAULT_VERSION_TABLE)]
    pub version_table: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Output format for status commands (text, json)
    #[arg(short, long, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Upgrade to a later revision ("start:end" allowed with --sql)
    Upgrade {
        #[arg(default_value = "head")]
        revision: String,
    },
    /// Revert to an earlier revision ("start:end" allowed with --sql)
    Downgrade { revision: String },
    /// Show the revision currently applied to the database
    Current,
    /// Show the head revision of the script directory
    Heads,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn mode(&self) -> Mode {
        if self.sql {
            Mode::Rendering
        } else {
            Mode::Live
        }
    }
}

/// Split a revision argument into an optional start and a destination.
///
/// `start:end` is only meaningful when rendering SQL.
pub fn split_revision_range(arg: &str, rendering: bool) -> Result<(Option<String>, String), String> {
    match arg.split_once(':') {
        Some(_) if !rendering => Err(format!(
            "range revision '{}' is only allowed with --sql",
            arg
        )),
        Some((start, end)) if start.is_empty() || end.is_empty() => {
            Err(format!("invalid revision range '{}'", arg))
        }
        Some((start, end)) => Ok((Some(start.to_string()), end.to_string())),
        None => Ok((None, arg.to_string())),
    }
}

/// Database file for a `sqlite://` URL; `None` means in-memory.
///
/// `sqlite:///app.db` is relative, `sqlite:////var/app.db` is absolute.
pub fn sqlite_path(url: &str) -> Result<Option<PathBuf>, String> {
    let rest = url
        .strip_prefix("sqlite://")
        .ok_or_else(|| format!("live mode supports sqlite:// URLs only, got '{}'", url))?;
    let path = rest.strip_prefix('/').unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        Ok(None)
    } else {
        Ok(Some(PathBuf::from(path)))
    }
}
