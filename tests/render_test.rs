//! Offline SQL rendering tests.
//!
//! Tests:
//! - Transactional scripts are bracketed by begin/commit markers
//! - Non-transactional scripts interleave pointer writes
//! - Pointer table is created from base and dropped back at base
//! - Malformed statements surface render errors
//! - Rendered scripts replay against a real database

mod common;

use common::{rev, two_step_chain, SharedBuffer};
use std::sync::Arc;
use tidemark::dialect::{Dialect, MySql, Postgres, Sqlite};
use tidemark::sequencer::{LinearSequencer, Revision};
use tidemark::version::{VersionStore, DEFAULT_VERSION_TABLE};
use tidemark::{Durability, ExecutionContext, ExecutionSink, MigrateError, RevisionId, RunArgs};

fn render(
    dialect: impl Dialect + 'static,
    sequencer: LinearSequencer,
    start: Option<RevisionId>,
    durability: Durability,
) -> Result<String, MigrateError> {
    let buffer = SharedBuffer::default();
    let mut ctx = ExecutionContext::new(
        ExecutionSink::rendering(Box::new(buffer.clone()), Arc::new(dialect)),
        VersionStore::new(DEFAULT_VERSION_TABLE, start).unwrap(),
        Arc::new(sequencer),
        durability,
    )?;
    ctx.run(&RunArgs::new())?;
    Ok(buffer.contents())
}

const CREATE_VERSION: &str =
    "CREATE TABLE tidemark_version (\n    version_num VARCHAR(32) NOT NULL\n);\n\n";

#[test]
fn test_transactional_upgrade_script() {
    common::init();
    let sql = render(Postgres, two_step_chain(), None, Durability::Auto).unwrap();

    let expected = [
        "BEGIN;\n\n",
        CREATE_VERSION,
        "-- Running upgrade one <base> -> a1\n\n",
        "CREATE TABLE one (id INT);\n\n",
        "-- Running upgrade two a1 -> b2\n\n",
        "CREATE TABLE two (id INT);\n\n",
        "INSERT INTO tidemark_version (version_num) VALUES ('b2');\n\n",
        "COMMIT;\n\n",
    ]
    .concat();
    assert_eq!(sql, expected);
}

#[test]
fn test_non_transactional_upgrade_script() {
    let sql = render(MySql, two_step_chain(), None, Durability::Auto).unwrap();

    let expected = [
        CREATE_VERSION,
        "-- Running upgrade one <base> -> a1\n\n",
        "CREATE TABLE one (id INT);\n\n",
        "INSERT INTO tidemark_version (version_num) VALUES ('a1');\n\n",
        "-- Running upgrade two a1 -> b2\n\n",
        "CREATE TABLE two (id INT);\n\n",
        "UPDATE tidemark_version SET version_num='b2';\n\n",
    ]
    .concat();
    assert_eq!(sql, expected);
    assert!(!sql.contains("START TRANSACTION"));
}

#[test]
fn test_forced_transactional_uses_dialect_markers() {
    let sql = render(MySql, two_step_chain(), None, Durability::Transactional).unwrap();

    assert!(sql.starts_with("START TRANSACTION;\n\n"));
    assert!(sql.ends_with("COMMIT;\n\n"));
    assert_eq!(sql.matches("-- Running").count(), 2);
    assert_eq!(sql.matches("tidemark_version (version_num)").count(), 1);
}

#[test]
fn test_downgrade_to_base_drops_pointer_table() {
    let sql = render(
        Postgres,
        two_step_chain().with_destination("base"),
        Some(rev("b2")),
        Durability::Auto,
    )
    .unwrap();

    let expected = [
        "BEGIN;\n\n",
        "-- Running downgrade two b2 -> a1\n\n",
        "DROP TABLE two;\n\n",
        "-- Running downgrade one a1 -> <base>\n\n",
        "DROP TABLE one;\n\n",
        "DELETE FROM tidemark_version;\n\n",
        "DROP TABLE tidemark_version;\n\n",
        "COMMIT;\n\n",
    ]
    .concat();
    assert_eq!(sql, expected);
}

#[test]
fn test_non_transactional_downgrade() {
    let sql = render(
        MySql,
        two_step_chain().with_destination("base"),
        Some(rev("b2")),
        Durability::Auto,
    )
    .unwrap();

    let update = sql.find("UPDATE tidemark_version SET version_num='a1'").unwrap();
    let delete = sql.find("DELETE FROM tidemark_version").unwrap();
    let drop = sql.find("DROP TABLE tidemark_version").unwrap();
    assert!(update < delete && delete < drop);
}

#[test]
fn test_start_override_skips_table_creation() {
    let sql = render(Postgres, two_step_chain(), Some(rev("a1")), Durability::Auto).unwrap();

    assert!(!sql.contains("CREATE TABLE tidemark_version"));
    assert!(sql.contains("-- Running upgrade two a1 -> b2"));
    assert!(sql.contains("UPDATE tidemark_version SET version_num='b2';"));
    assert_eq!(sql.matches("-- Running").count(), 1);
}

#[test]
fn test_nothing_to_apply() {
    let sql = render(Postgres, two_step_chain(), Some(rev("b2")), Durability::Auto).unwrap();
    assert_eq!(sql, "BEGIN;\n\nCOMMIT;\n\n");

    let sql = render(MySql, two_step_chain(), Some(rev("b2")), Durability::Auto).unwrap();
    assert!(sql.is_empty());
}

#[test]
fn test_malformed_statement_is_render_error() {
    let sequencer = LinearSequencer::new(vec![Revision::sql(rev("a1"), "empty", " ; ", "")]).unwrap();

    let err = render(Postgres, sequencer, None, Durability::Auto).unwrap_err();

    assert!(matches!(err, MigrateError::Render(_)));
}

#[test]
fn test_rendered_script_replays_with_trailing_comments() {
    let sequencer = LinearSequencer::new(vec![
        Revision::sql(rev("a1"), "one", "CREATE TABLE one (id INT) -- users", ""),
        Revision::sql(rev("b2"), "two", "CREATE TABLE two (id INT);", ""),
    ])
    .unwrap();

    let sql = render(Sqlite, sequencer, None, Durability::Auto).unwrap();
    assert!(sql.contains("CREATE TABLE one (id INT) -- users\n;\n\n"));

    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch(&sql).unwrap();
    let version: String = conn
        .query_row("SELECT version_num FROM tidemark_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, "b2");
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name IN ('one', 'two')",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 2);
}
