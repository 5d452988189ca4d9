//! tidemark: the execution core of a schema-migration runner.
//!
//! Given the steps from a sequencer and the revision last applied to a
//! target, tidemark advances (or reverts) the target and keeps a single-row
//! version pointer truthful across partial failures.
//!
//! # Architecture
//!
//! - **Two durability models**: per-step pointer writes for targets without
//!   transactional DDL, one deferred write for targets with it
//! - **Two sinks**: execute against a live connection, or render a
//!   replayable SQL script without touching any database
//! - **Explicit seams**: dialects, sequencers and live connections are traits
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration for the binary
//! - [`context`]: The execution context and run loop
//! - [`dialect`]: Dialect capabilities and the dialect registry
//! - [`observability`]: Tracing setup
//! - [`registry`]: Thread-local configuration registry
//! - [`revision`]: Revision identifiers
//! - [`scripts`]: Migration scripts loaded from a directory
//! - [`sequencer`]: Migration steps and sequencers
//! - [`sink`]: Live and rendering execution sinks
//! - [`statement`]: Statements issued through a sink
//! - [`version`]: The persisted version pointer

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // context::ExecutionContext is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes  // r#""# is fine for SQL
)]

pub mod config;
pub mod context;
pub mod dialect;
pub mod error;
pub mod observability;
pub mod registry;
pub mod revision;
pub mod scripts;
pub mod sequencer;
pub mod sink;
pub mod statement;
pub mod version;

pub use context::{Durability, ExecutionContext, RunSummary};
pub use error::{MigrateError, Result};
pub use revision::RevisionId;
pub use sequencer::{MigrationSequencer, MigrationStep, RunArgs};
pub use sink::{ExecutionSink, LiveConnection};
pub use statement::Statement;
