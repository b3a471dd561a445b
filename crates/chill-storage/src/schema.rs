//! Connection setup, the journal-mode gate and schema migrations.
//!
//! Migrations are tracked through SQLite's `user_version` pragma by
//! `rusqlite_migration` and embedded at compile time. The `Chill` table
//! records the content schema version separately so a site database can be
//! recognized without consulting pragmas.

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;
use crate::types::OpenOptions;

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial_schema.sql"))])
}

const TABLES: [&str; 6] = ["Route", "Node_Node", "Node", "Query", "Template", "Chill"];

/// Opens a database file and applies connection pragmas.
///
/// Fails with [`StorageError::JournalMode`] when the database does not end
/// up in write-ahead-log mode, unless `options.testing` is set.
pub fn open_database(path: &str, options: OpenOptions) -> Result<Connection, StorageError> {
    let conn = if options.read_only {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?
    } else {
        Connection::open(path)?
    };
    configure(&conn, options)?;
    Ok(conn)
}

/// Opens a private in-memory database. The WAL gate never applies.
pub fn open_in_memory() -> Result<Connection, StorageError> {
    let conn = Connection::open_in_memory()?;
    configure(&conn, OpenOptions::read_write().testing(true))?;
    Ok(conn)
}

fn configure(conn: &Connection, options: OpenOptions) -> Result<(), StorageError> {
    let journal_mode: String = if options.read_only {
        conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?
    } else {
        let mode =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        mode
    };
    conn.pragma_update(None, "foreign_keys", "ON")?;

    if !journal_mode.eq_ignore_ascii_case("wal") {
        if !options.testing {
            return Err(StorageError::JournalMode {
                found: journal_mode,
            });
        }
        tracing::debug!(journal_mode = %journal_mode, "WAL gate skipped in testing mode");
    }
    Ok(())
}

/// Creates the content tables. Idempotent.
pub fn init(conn: &mut Connection) -> Result<(), StorageError> {
    migrations()
        .to_latest(conn)
        .map_err(|e| StorageError::Migration(e.to_string()))
}

/// Drops every content table and resets migration tracking.
pub fn drop_tables(conn: &mut Connection) -> Result<(), StorageError> {
    let tx = conn.transaction()?;
    tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;
    for table in TABLES {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
    }
    tx.commit()?;
    conn.pragma_update(None, "user_version", 0)?;
    Ok(())
}

/// The content schema version, or `None` when the tables do not exist.
pub fn schema_version(conn: &Connection) -> Result<Option<i64>, StorageError> {
    let has_table: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'Chill')",
        [],
        |row| row.get(0),
    )?;
    if !has_table {
        return Ok(None);
    }
    let version = conn
        .query_row("SELECT max(version) FROM Chill", [], |row| {
            row.get::<_, Option<i64>>(0)
        })
        .optional()?
        .flatten();
    Ok(version)
}
