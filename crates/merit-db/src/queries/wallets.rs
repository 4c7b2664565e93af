//! Wallet balance queries.
//!
//! Balances are only ever changed with single conditional statements, so
//! concurrent deltas on the same wallet serialize inside SQLite instead of
//! racing through a read-modify-write in Rust.

use merit_types::Amount;
use rusqlite::{Connection, OptionalExtension};

use crate::{amount_from_column, amount_to_column, Result};

/// Balance of a wallet, zero if it has never been touched.
pub fn balance(conn: &Connection, user_id: &str, community_id: &str) -> Result<Amount> {
    let balance: Option<i64> = conn
        .query_row(
            "SELECT balance FROM wallets WHERE user_id = ?1 AND community_id = ?2",
            rusqlite::params![user_id, community_id],
            |row| row.get(0),
        )
        .optional()?;
    amount_from_column(balance.unwrap_or(0), "wallets.balance")
}

/// Add `amount` to a wallet, creating it on first credit.
///
/// Returns `false` (and changes nothing) if the new balance would overflow.
pub fn credit(
    conn: &Connection,
    user_id: &str,
    community_id: &str,
    amount: Amount,
    currency_label: &str,
    now: u64,
) -> Result<bool> {
    let amount = amount_to_column(amount)?;
    let changed = conn.execute(
        "INSERT INTO wallets (user_id, community_id, balance, currency_label, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(user_id, community_id) DO UPDATE
            SET balance = balance + excluded.balance,
                updated_at = excluded.updated_at
            WHERE balance <= 9223372036854775807 - excluded.balance",
        rusqlite::params![user_id, community_id, amount, currency_label, now as i64],
    )?;
    Ok(changed == 1)
}

/// Subtract `amount` from a wallet if and only if the balance covers it.
///
/// Returns `false` (and changes nothing) when funds are insufficient or the
/// wallet does not exist.
pub fn try_debit(
    conn: &Connection,
    user_id: &str,
    community_id: &str,
    amount: Amount,
    now: u64,
) -> Result<bool> {
    let amount = amount_to_column(amount)?;
    let changed = conn.execute(
        "UPDATE wallets SET balance = balance - ?3, updated_at = ?4
         WHERE user_id = ?1 AND community_id = ?2 AND balance >= ?3",
        rusqlite::params![user_id, community_id, amount, now as i64],
    )?;
    Ok(changed == 1)
}

/// All wallets of a user.
pub fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<WalletRow>> {
    let mut stmt = conn.prepare(
        "SELECT community_id, balance, currency_label, updated_at
         FROM wallets WHERE user_id = ?1 ORDER BY community_id",
    )?;

    let raw = stmt
        .query_map([user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(community_id, balance, currency_label, updated_at)| {
            Ok(WalletRow {
                user_id: user_id.to_string(),
                community_id,
                balance: amount_from_column(balance, "wallets.balance")?,
                currency_label,
                updated_at: updated_at as u64,
            })
        })
        .collect()
}

/// Sum of every wallet balance, for conservation checks.
pub fn total_balance(conn: &Connection) -> Result<Amount> {
    let total: i64 = conn.query_row("SELECT COALESCE(SUM(balance), 0) FROM wallets", [], |row| {
        row.get(0)
    })?;
    amount_from_column(total, "SUM(wallets.balance)")
}

/// A raw wallet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletRow {
    pub user_id: String,
    pub community_id: String,
    pub balance: Amount,
    pub currency_label: String,
    pub updated_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_missing_wallet_is_zero() {
        let conn = test_db();
        assert_eq!(balance(&conn, "u1", "global").expect("balance"), Amount::ZERO);
    }

    #[test]
    fn test_credit_creates_and_accumulates() {
        let conn = test_db();
        assert!(credit(&conn, "u1", "c1", Amount::from_merits(3), "merits", 100).expect("credit"));
        assert!(credit(&conn, "u1", "c1", Amount::from_merits(2), "merits", 200).expect("credit"));
        assert_eq!(balance(&conn, "u1", "c1").expect("balance"), Amount::from_merits(5));
    }

    #[test]
    fn test_debit_requires_funds() {
        let conn = test_db();
        credit(&conn, "u1", "c1", Amount::from_merits(3), "merits", 100).expect("credit");
        assert!(!try_debit(&conn, "u1", "c1", Amount::from_merits(4), 200).expect("debit"));
        assert_eq!(balance(&conn, "u1", "c1").expect("balance"), Amount::from_merits(3));
        assert!(try_debit(&conn, "u1", "c1", Amount::from_merits(3), 200).expect("debit"));
        assert_eq!(balance(&conn, "u1", "c1").expect("balance"), Amount::ZERO);
    }

    #[test]
    fn test_debit_missing_wallet() {
        let conn = test_db();
        assert!(!try_debit(&conn, "ghost", "c1", Amount::from_micro(1), 100).expect("debit"));
    }

    #[test]
    fn test_credit_overflow_rejected() {
        let conn = test_db();
        let near_max = Amount::from_micro(i64::MAX as u64 - 1);
        assert!(credit(&conn, "u1", "c1", near_max, "merits", 1).expect("credit"));
        assert!(!credit(&conn, "u1", "c1", Amount::from_micro(2), "merits", 2).expect("credit"));
        assert_eq!(balance(&conn, "u1", "c1").expect("balance"), near_max);
    }

    #[test]
    fn test_list_for_user() {
        let conn = test_db();
        credit(&conn, "u1", "global", Amount::from_merits(1), "merits", 1).expect("credit");
        credit(&conn, "u1", "c1", Amount::from_merits(2), "coins", 1).expect("credit");
        credit(&conn, "u2", "c1", Amount::from_merits(9), "coins", 1).expect("credit");

        let wallets = list_for_user(&conn, "u1").expect("list");
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[0].community_id, "c1");
        assert_eq!(wallets[0].currency_label, "coins");
        assert_eq!(total_balance(&conn).expect("total"), Amount::from_merits(12));
    }
}
