//! # merit-db
//!
//! Storage layer for the merit economy engine: a single SQLite database.
//!
//! ## Conventions
//!
//! - WAL mode, foreign keys enforced
//! - All timestamps are Unix epoch seconds
//! - All amounts are micro-merits stored as `INTEGER`
//! - Schema version stored in `PRAGMA user_version`
//!
//! Query functions take `&Connection`; a `rusqlite::Transaction` derefs to
//! one, so engine crates compose several queries inside one transaction and
//! get all-or-nothing semantics from SQLite. Engine writes open their
//! transaction with [`begin_write`] so that read-then-write sequences on
//! separate connections queue on `busy_timeout` instead of failing.

pub mod migrations;
pub mod queries;
pub mod schema;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

/// Begin a transaction that takes the write lock up front.
///
/// A deferred transaction that reads before writing cannot upgrade once
/// another connection has committed, and SQLite reports that as an
/// immediate `SQLITE_BUSY`. Taking the lock at `BEGIN` waits instead.
pub fn begin_write(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// Convert a stored micro-merit column into an [`Amount`](merit_types::Amount).
pub(crate) fn amount_from_column(value: i64, column: &str) -> Result<merit_types::Amount> {
    merit_types::Amount::from_i64(value)
        .ok_or_else(|| DbError::Constraint(format!("negative amount in column {column}")))
}

/// Convert an [`Amount`](merit_types::Amount) into its storage representation.
pub(crate) fn amount_to_column(amount: merit_types::Amount) -> Result<i64> {
    amount
        .to_i64()
        .ok_or_else(|| DbError::Constraint(format!("amount {} exceeds storage range", amount.micro())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory() {
        let conn = open_memory().expect("open in-memory db");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("get user_version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_memory().expect("open");
        let fk: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("get foreign_keys");
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_begin_write_commits() {
        let mut conn = open_memory().expect("open");
        let tx = begin_write(&mut conn).expect("begin");
        tx.execute(
            "INSERT INTO wallets (user_id, community_id, balance, created_at, updated_at) VALUES ('u', 'c', 1, 0, 0)",
            [],
        )
        .expect("insert");
        tx.commit().expect("commit");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM wallets", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_amount_column_conversion() {
        assert!(amount_from_column(-1, "balance").is_err());
        assert_eq!(
            amount_from_column(5, "balance").expect("convert"),
            merit_types::Amount::from_micro(5)
        );
        assert!(amount_to_column(merit_types::Amount::from_micro(u64::MAX)).is_err());
    }
}
