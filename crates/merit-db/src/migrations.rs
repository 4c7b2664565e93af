//! Forward-only schema migrations.
//!
//! `PRAGMA user_version` holds the number of applied steps. Each step runs
//! in its own transaction together with the version bump, so a failed step
//! leaves the database at the previous version.

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// One schema step. `version` is the `user_version` after it is applied.
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "ledger, quota, publications and tappalka tables",
    sql: schema::SCHEMA_V1,
}];

fn user_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Apply every step newer than the stored version.
pub fn run(conn: &Connection) -> Result<()> {
    let current = user_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database is at v{current}, this build understands up to v{SCHEMA_VERSION}"
        )));
    }

    for step in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(step.sql)
            .map_err(|e| DbError::Migration(format!("v{} ({}): {e}", step.version, step.name)))?;
        tx.pragma_update(None, "user_version", step.version)?;
        tx.commit()?;
        tracing::info!(version = step.version, name = step.name, "schema migrated");
    }
    Ok(())
}
