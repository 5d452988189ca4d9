//! Test utilities shared by the integration tests.
//!
//! Provides:
//! - Temporary SQLite database fixtures
//! - A shared buffer to capture rendered SQL
//! - A live connection that records every statement it executes
//! - Small revision chains

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use tidemark::error::DriverError;
use tidemark::sequencer::{LinearSequencer, Revision};
use tidemark::{LiveConnection, RevisionId};

/// Test fixture that manages a temporary database directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for test database
    pub temp_dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with a temporary database directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        Self { temp_dir, db_path }
    }

    /// Open a connection to the fixture database.
    pub fn connect(&self) -> rusqlite::Connection {
        rusqlite::Connection::open(&self.db_path).expect("failed to open test db")
    }

    /// Rows currently in the version table.
    pub fn pointer_rows(&self) -> Vec<String> {
        let conn = self.connect();
        let mut stmt = conn
            .prepare("SELECT version_num FROM tidemark_version")
            .expect("version table missing");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows
    }

    /// Whether a table exists in the fixture database.
    pub fn has_table(&self, name: &str) -> bool {
        let conn = self.connect();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory writer that can be read back after the sink owns a clone.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).expect("rendered output is not UTF-8")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// SQLite connection that logs every statement it is asked to execute.
pub struct RecordingConnection {
    inner: rusqlite::Connection,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingConnection {
    pub fn new(inner: rusqlite::Connection) -> (Self, StatementLog) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let conn = Self {
            inner,
            log: Arc::clone(&log),
        };
        (conn, StatementLog(log))
    }

    pub fn in_memory() -> (Self, StatementLog) {
        Self::new(rusqlite::Connection::open_in_memory().unwrap())
    }
}

impl LiveConnection for RecordingConnection {
    fn dialect_name(&self) -> &str {
        "sqlite"
    }

    fn execute(&mut self, sql: &str) -> Result<(), DriverError> {
        self.log.lock().unwrap().push(sql.to_string());
        self.inner.execute_batch(sql)?;
        Ok(())
    }

    fn query_scalar(&mut self, sql: &str) -> Result<Option<String>, DriverError> {
        LiveConnection::query_scalar(&mut self.inner, sql)
    }
}

/// Handle onto a [`RecordingConnection`]'s statement log.
#[derive(Clone)]
pub struct StatementLog(Arc<Mutex<Vec<String>>>);

impl StatementLog {
    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Statements that wrote the version pointer row.
    pub fn pointer_writes(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|sql| {
                sql.starts_with("INSERT INTO tidemark_version")
                    || sql.starts_with("UPDATE tidemark_version")
                    || sql.starts_with("DELETE FROM tidemark_version")
            })
            .collect()
    }
}

/// Route library logs through the test writer.
pub fn init() {
    tidemark::observability::tracing::init_test_tracing();
}

pub fn rev(id: &str) -> RevisionId {
    RevisionId::new(id).expect("invalid test revision")
}

/// Chain `none -> a1 -> b2`, each revision creating one table.
pub fn two_step_chain() -> LinearSequencer {
    LinearSequencer::new(vec![
        Revision::sql(rev("a1"), "one", "CREATE TABLE one (id INT)", "DROP TABLE one"),
        Revision::sql(rev("b2"), "two", "CREATE TABLE two (id INT)", "DROP TABLE two"),
    ])
    .unwrap()
}

/// Chain `none -> a1 -> b2 -> c3` where the upgrade to `c3` fails.
pub fn failing_chain() -> LinearSequencer {
    LinearSequencer::new(vec![
        Revision::sql(rev("a1"), "one", "CREATE TABLE one (id INT)", "DROP TABLE one"),
        Revision::sql(rev("b2"), "two", "CREATE TABLE two (id INT)", "DROP TABLE two"),
        Revision::sql(rev("c3"), "broken", "CREATE TABL three (id INT)", ""),
    ])
    .unwrap()
}
