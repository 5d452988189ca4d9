//! Migration scripts loaded from a directory.
//!
//! Each `*.sql` file is one revision, named `<revision>_<description>.sql`
//! and ordered by file name. The body is split into sections:
//!
//! ```sql
//! -- +upgrade
//! CREATE TABLE users (id INTEGER PRIMARY KEY);
//! -- +downgrade
//! DROP TABLE users;
//! ```

use std::fs;
use std::path::Path;

use crate::error::{MigrateError, Result};
use crate::revision::RevisionId;
use crate::sequencer::{LinearSequencer, Revision};

const UPGRADE_MARKER: &str = "-- +upgrade";
const DOWNGRADE_MARKER: &str = "-- +downgrade";

/// Load every script in `dir` into a [`LinearSequencer`].
pub fn load_directory(dir: impl AsRef<Path>) -> Result<LinearSequencer> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| {
        MigrateError::config(format!(
            "cannot read migration directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| MigrateError::config(format!("cannot list {}: {}", dir.display(), e)))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();

    let mut revisions = Vec::with_capacity(files.len());
    for path in &files {
        let body = fs::read_to_string(path).map_err(|e| {
            MigrateError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| MigrateError::config(format!("invalid file name {}", path.display())))?;
        revisions.push(parse_script(stem, &body)?);
    }

    tracing::debug!(dir = %dir.display(), count = revisions.len(), "Loaded migration scripts");
    LinearSequencer::new(revisions)
}

/// Parse one script given its file stem and contents.
pub fn parse_script(stem: &str, body: &str) -> Result<Revision> {
    let (id, name) = stem.split_once('_').unwrap_or((stem, stem));
    let id = RevisionId::new(id)?;

    enum Section {
        Preamble,
        Upgrade,
        Downgrade,
    }

    let mut section = Section::Preamble;
    let mut seen_upgrade = false;
    let mut upgrade = String::new();
    let mut downgrade = String::new();

    for line in body.lines() {
        match line.trim() {
            UPGRADE_MARKER => {
                section = Section::Upgrade;
                seen_upgrade = true;
            }
            DOWNGRADE_MARKER => section = Section::Downgrade,
            trimmed => match section {
                Section::Preamble if trimmed.is_empty() || trimmed.starts_with("--") => {}
                Section::Preamble => {
                    return Err(MigrateError::config(format!(
                        "script '{stem}' has SQL before the '{UPGRADE_MARKER}' marker"
                    )))
                }
                Section::Upgrade => {
                    upgrade.push_str(line);
                    upgrade.push('\n');
                }
                Section::Downgrade => {
                    downgrade.push_str(line);
                    downgrade.push('\n');
                }
            },
        }
    }

    if !seen_upgrade {
        return Err(MigrateError::config(format!(
            "script '{stem}' is missing the '{UPGRADE_MARKER}' marker"
        )));
    }

    Ok(Revision::sql(id, name, upgrade, downgrade))
}
