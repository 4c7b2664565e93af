//! Investment records: one aggregated row per (publication, investor).

use merit_types::publication::Investment;
use merit_types::Amount;
use rusqlite::{Connection, OptionalExtension};

use crate::{amount_from_column, amount_to_column, DbError, Result};

/// Add `amount` to an investor's record, creating it on first investment.
///
/// Repeat investments accumulate into the same row.
pub fn accumulate(
    conn: &Connection,
    publication_id: &str,
    investor_id: &str,
    amount: Amount,
    now: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO investments (publication_id, investor_id, amount, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(publication_id, investor_id) DO UPDATE
            SET amount = amount + excluded.amount,
                updated_at = excluded.updated_at",
        rusqlite::params![publication_id, investor_id, amount_to_column(amount)?, now as i64],
    )?;
    Ok(())
}

/// Recompute every investor's `share_percent` against `pool_total`.
pub fn recompute_shares(conn: &Connection, publication_id: &str, pool_total: Amount) -> Result<()> {
    if pool_total.is_zero() {
        return Err(DbError::Constraint(format!(
            "zero investment total for publication '{publication_id}'"
        )));
    }
    conn.execute(
        "UPDATE investments SET share_percent = CAST(amount AS REAL) * 100.0 / ?2
         WHERE publication_id = ?1",
        rusqlite::params![publication_id, amount_to_column(pool_total)? as f64],
    )?;
    Ok(())
}

/// One investor's record, if any.
pub fn get(conn: &Connection, publication_id: &str, investor_id: &str) -> Result<Option<Investment>> {
    let raw = conn
        .query_row(
            "SELECT investor_id, amount, share_percent, created_at, updated_at
             FROM investments WHERE publication_id = ?1 AND investor_id = ?2",
            rusqlite::params![publication_id, investor_id],
            read_raw,
        )
        .optional()?;
    raw.map(into_investment).transpose()
}

/// All investments in a publication, oldest first.
pub fn list(conn: &Connection, publication_id: &str) -> Result<Vec<Investment>> {
    let mut stmt = conn.prepare(
        "SELECT investor_id, amount, share_percent, created_at, updated_at
         FROM investments WHERE publication_id = ?1 ORDER BY created_at, investor_id",
    )?;
    let raws = stmt
        .query_map([publication_id], read_raw)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raws.into_iter().map(into_investment).collect()
}

/// Sum of all investment amounts in a publication.
pub fn total(conn: &Connection, publication_id: &str) -> Result<Amount> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM investments WHERE publication_id = ?1",
        [publication_id],
        |row| row.get(0),
    )?;
    amount_from_column(total, "SUM(investments.amount)")
}

type RawInvestment = (String, i64, f64, i64, i64);

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawInvestment> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_investment(raw: RawInvestment) -> Result<Investment> {
    let (investor_id, amount, share_percent, created_at, updated_at) = raw;
    Ok(Investment {
        investor_id,
        amount: amount_from_column(amount, "investments.amount")?,
        share_percent,
        created_at: created_at as u64,
        updated_at: updated_at as u64,
    })
}
