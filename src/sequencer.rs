//! Migration steps and the sequencer that supplies them.
//!
//! The execution core never decides which revisions exist or in what order;
//! it asks a [`MigrationSequencer`] for the steps leading away from the
//! current revision. [`LinearSequencer`] is a simple ordered chain suitable
//! for script directories and tests.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{MigrateError, Result};
use crate::revision::{DisplayRev, RevisionId};
use crate::sink::ExecutionSink;

/// Free-form arguments passed through `run` to every step.
pub type RunArgs = serde_json::Map<String, serde_json::Value>;

/// A step's apply function. The sink is injected so steps need no ambient state.
pub type ApplyFn = Arc<dyn Fn(&mut ExecutionSink, &RunArgs) -> Result<()> + Send + Sync>;

/// Lazy sequence of steps produced for one run.
pub type Steps<'a> = Box<dyn Iterator<Item = Result<MigrationStep>> + 'a>;

/// One transition between two revisions.
#[derive(Clone)]
pub struct MigrationStep {
    /// Human-readable name used in markers and logs.
    pub name: String,
    pub apply: ApplyFn,
    pub from: Option<RevisionId>,
    pub to: Option<RevisionId>,
}

impl MigrationStep {
    pub fn new<F>(
        name: impl Into<String>,
        from: Option<RevisionId>,
        to: Option<RevisionId>,
        apply: F,
    ) -> Self
    where
        F: Fn(&mut ExecutionSink, &RunArgs) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            apply: Arc::new(apply),
            from,
            to,
        }
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("name", &self.name)
            .field("from", &DisplayRev(self.from.as_ref()).to_string())
            .field("to", &DisplayRev(self.to.as_ref()).to_string())
            .finish()
    }
}

/// Supplies the ordered steps from a starting revision to a destination.
pub trait MigrationSequencer: Send + Sync {
    /// Steps to apply, in order, starting at `start`.
    fn next_steps(&self, start: Option<&RevisionId>) -> Result<Steps<'_>>;

    /// Translate a symbolic revision name into an identifier.
    fn resolve(&self, symbol: &str) -> Result<Option<RevisionId>> {
        match symbol {
            "base" => Ok(None),
            other => RevisionId::new(other).map(Some),
        }
    }
}

/// A revision in a [`LinearSequencer`] chain.
#[derive(Clone)]
pub struct Revision {
    pub id: RevisionId,
    pub name: String,
    upgrade: ApplyFn,
    downgrade: ApplyFn,
}

impl Revision {
    pub fn new<U, D>(id: RevisionId, name: impl Into<String>, upgrade: U, downgrade: D) -> Self
    where
        U: Fn(&mut ExecutionSink, &RunArgs) -> Result<()> + Send + Sync + 'static,
        D: Fn(&mut ExecutionSink, &RunArgs) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            id,
            name: name.into(),
            upgrade: Arc::new(upgrade),
            downgrade: Arc::new(downgrade),
        }
    }

    /// A revision whose upgrade and downgrade each execute one SQL text.
    pub fn sql(
        id: RevisionId,
        name: impl Into<String>,
        upgrade: impl Into<String>,
        downgrade: impl Into<String>,
    ) -> Self {
        let upgrade = upgrade.into();
        let downgrade = downgrade.into();
        Self::new(
            id,
            name,
            move |sink, _| run_sql(sink, &upgrade),
            move |sink, _| run_sql(sink, &downgrade),
        )
    }
}

fn run_sql(sink: &mut ExecutionSink, sql: &str) -> Result<()> {
    // An empty section means the direction has nothing to do.
    if sql.trim().is_empty() {
        return Ok(());
    }
    sink.execute(sql)
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Revision")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// An ordered chain of revisions walked up or down to a destination.
#[derive(Debug, Clone)]
pub struct LinearSequencer {
    revisions: Vec<Revision>,
    destination: String,
}

impl LinearSequencer {
    /// Build a chain; the destination defaults to `head`.
    pub fn new(revisions: Vec<Revision>) -> Result<Self> {
        let mut seen = HashSet::new();
        for rev in &revisions {
            if !seen.insert(rev.id.clone()) {
                return Err(MigrateError::config(format!(
                    "duplicate revision '{}'",
                    rev.id
                )));
            }
        }
        Ok(Self {
            revisions,
            destination: "head".to_string(),
        })
    }

    /// Set the destination: `head`, `base`, or a revision id.
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    /// Chain position of a revision: 0 is base, `i + 1` is `revisions[i]`.
    fn position(&self, rev: Option<&RevisionId>) -> Result<usize> {
        match rev {
            None => Ok(0),
            Some(rev) => self
                .revisions
                .iter()
                .position(|r| &r.id == rev)
                .map(|i| i + 1)
                .ok_or_else(|| MigrateError::config(format!("unknown revision '{rev}'"))),
        }
    }

    fn id_at(&self, position: usize) -> Option<RevisionId> {
        position
            .checked_sub(1)
            .map(|i| self.revisions[i].id.clone())
    }

    fn upgrade_step(&self, index: usize) -> MigrationStep {
        let rev = &self.revisions[index];
        MigrationStep {
            name: format!("upgrade {}", rev.name),
            apply: Arc::clone(&rev.upgrade),
            from: self.id_at(index),
            to: Some(rev.id.clone()),
        }
    }

    fn downgrade_step(&self, index: usize) -> MigrationStep {
        let rev = &self.revisions[index];
        MigrationStep {
            name: format!("downgrade {}", rev.name),
            apply: Arc::clone(&rev.downgrade),
            from: Some(rev.id.clone()),
            to: self.id_at(index),
        }
    }
}

impl MigrationSequencer for LinearSequencer {
    fn next_steps(&self, start: Option<&RevisionId>) -> Result<Steps<'_>> {
        let from = self.position(start)?;
        let target = self.resolve(&self.destination)?;
        let to = self.position(target.as_ref())?;

        if to >= from {
            Ok(Box::new(
                (from..to).map(move |i| Ok::<_, MigrateError>(self.upgrade_step(i))),
            ))
        } else {
            Ok(Box::new(
                (to..from)
                    .rev()
                    .map(move |i| Ok::<_, MigrateError>(self.downgrade_step(i))),
            ))
        }
    }

    fn resolve(&self, symbol: &str) -> Result<Option<RevisionId>> {
        match symbol {
            "head" => Ok(self.revisions.last().map(|r| r.id.clone())),
            "base" => Ok(None),
            other => {
                let id = RevisionId::new(other)?;
                self.position(Some(&id))?;
                Ok(Some(id))
            }
        }
    }
}
