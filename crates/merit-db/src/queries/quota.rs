//! Daily quota usage records.
//!
//! Usage rows are append-only facts; remaining quota is always derived.

use merit_types::Amount;
use rusqlite::Connection;

use crate::{amount_from_column, amount_to_column, Result};

/// Append a usage record and return its id.
pub fn insert_usage(
    conn: &Connection,
    user_id: &str,
    community_id: &str,
    amount: Amount,
    usage_type: &str,
    reference_id: &str,
    created_at: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO quota_usage (user_id, community_id, amount, usage_type, reference_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            user_id,
            community_id,
            amount_to_column(amount)?,
            usage_type,
            reference_id,
            created_at as i64,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Total quota used at or after `since`.
pub fn used_since(conn: &Connection, user_id: &str, community_id: &str, since: u64) -> Result<Amount> {
    let used: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM quota_usage
         WHERE user_id = ?1 AND community_id = ?2 AND created_at >= ?3",
        rusqlite::params![user_id, community_id, since as i64],
        |row| row.get(0),
    )?;
    amount_from_column(used, "SUM(quota_usage.amount)")
}

/// Usage records at or after `since`, oldest first.
pub fn list_since(
    conn: &Connection,
    user_id: &str,
    community_id: &str,
    since: u64,
) -> Result<Vec<QuotaUsageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, amount, usage_type, reference_id, created_at FROM quota_usage
         WHERE user_id = ?1 AND community_id = ?2 AND created_at >= ?3
         ORDER BY created_at, id",
    )?;
    let raw = stmt
        .query_map(rusqlite::params![user_id, community_id, since as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, amount, usage_type, reference_id, created_at)| {
            Ok(QuotaUsageRow {
                id,
                amount: amount_from_column(amount, "quota_usage.amount")?,
                usage_type,
                reference_id,
                created_at: created_at as u64,
            })
        })
        .collect()
}

/// A raw usage row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaUsageRow {
    pub id: i64,
    pub amount: Amount,
    pub usage_type: String,
    pub reference_id: String,
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_used_since_window() {
        let conn = test_db();
        insert_usage(&conn, "u1", "c1", Amount::from_merits(2), "vote", "p1", 100).expect("insert");
        insert_usage(&conn, "u1", "c1", Amount::from_merits(3), "vote", "p2", 200).expect("insert");
        insert_usage(&conn, "u1", "c2", Amount::from_merits(7), "vote", "p3", 200).expect("insert");

        assert_eq!(used_since(&conn, "u1", "c1", 0).expect("sum"), Amount::from_merits(5));
        assert_eq!(used_since(&conn, "u1", "c1", 150).expect("sum"), Amount::from_merits(3));
        assert_eq!(used_since(&conn, "u1", "c1", 201).expect("sum"), Amount::ZERO);
    }

    #[test]
    fn test_zero_amount_rejected_by_schema() {
        let conn = test_db();
        assert!(insert_usage(&conn, "u1", "c1", Amount::ZERO, "vote", "p1", 1).is_err());
    }

    #[test]
    fn test_list_since() {
        let conn = test_db();
        insert_usage(&conn, "u1", "c1", Amount::from_merits(1), "vote", "p1", 100).expect("insert");
        insert_usage(&conn, "u1", "c1", Amount::from_merits(1), "publication", "p9", 150)
            .expect("insert");
        let rows = list_since(&conn, "u1", "c1", 0).expect("list");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].usage_type, "publication");
        assert_eq!(rows[1].reference_id, "p9");
    }
}
