//! Double-entry journal of merit movements.
//!
//! Each atomic delta group is one `ledger_transactions` row plus one
//! `ledger_entries` row per account touched. Publication scores and pools,
//! quota allowances, emission and burn are journaled as accounts too, so
//! the entries of every transaction sum to zero.

use rusqlite::Connection;

use crate::Result;

/// Open a journal transaction and return its id.
pub fn insert_transaction(
    conn: &Connection,
    kind: &str,
    reference_id: &str,
    externally_funded: bool,
    created_at: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO ledger_transactions (kind, reference_id, externally_funded, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![kind, reference_id, externally_funded, created_at as i64],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Record one signed delta against an account.
pub fn insert_entry(
    conn: &Connection,
    transaction_id: i64,
    account_kind: &str,
    account_id: &str,
    community_id: &str,
    delta: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO ledger_entries (transaction_id, account_kind, account_id, community_id, delta)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![transaction_id, account_kind, account_id, community_id, delta],
    )?;
    Ok(())
}

/// Entries belonging to one transaction, in insertion order.
pub fn entries(conn: &Connection, transaction_id: i64) -> Result<Vec<EntryRow>> {
    let mut stmt = conn.prepare(
        "SELECT account_kind, account_id, community_id, delta
         FROM ledger_entries WHERE transaction_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([transaction_id], |row| {
            Ok(EntryRow {
                account_kind: row.get(0)?,
                account_id: row.get(1)?,
                community_id: row.get(2)?,
                delta: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Recent wallet movements of a user, newest first.
pub fn recent_for_user(conn: &Connection, user_id: &str, limit: u32) -> Result<Vec<HistoryRow>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.kind, t.reference_id, e.community_id, e.delta, t.externally_funded, t.created_at
         FROM ledger_entries e JOIN ledger_transactions t ON t.id = e.transaction_id
         WHERE e.account_kind = 'wallet' AND e.account_id = ?1
         ORDER BY t.created_at DESC, t.id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, limit], |row| {
            Ok(HistoryRow {
                transaction_id: row.get(0)?,
                kind: row.get(1)?,
                reference_id: row.get(2)?,
                community_id: row.get(3)?,
                delta: row.get(4)?,
                externally_funded: row.get(5)?,
                created_at: row.get::<_, i64>(6)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Transactions whose entries do not sum to zero. Empty in a healthy journal.
pub fn unbalanced_transactions(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT transaction_id FROM ledger_entries
         GROUP BY transaction_id HAVING SUM(delta) != 0 ORDER BY transaction_id",
    )?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Net journaled delta for one account.
pub fn account_net(
    conn: &Connection,
    account_kind: &str,
    account_id: &str,
    community_id: &str,
) -> Result<i64> {
    let net: i64 = conn.query_row(
        "SELECT COALESCE(SUM(delta), 0) FROM ledger_entries
         WHERE account_kind = ?1 AND account_id = ?2 AND community_id = ?3",
        rusqlite::params![account_kind, account_id, community_id],
        |row| row.get(0),
    )?;
    Ok(net)
}

/// Net journaled delta per account kind, ordered by kind.
pub fn net_by_kind(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT account_kind, SUM(delta) FROM ledger_entries
         GROUP BY account_kind ORDER BY account_kind",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A raw journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub account_kind: String,
    pub account_id: String,
    pub community_id: String,
    pub delta: i64,
}

/// A wallet movement joined with its transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub transaction_id: i64,
    pub kind: String,
    pub reference_id: String,
    pub community_id: String,
    pub delta: i64,
    pub externally_funded: bool,
    pub created_at: u64,
}
