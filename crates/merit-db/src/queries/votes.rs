//! Vote records.

use merit_types::publication::Vote;
use merit_types::Amount;
use rusqlite::Connection;

use crate::{amount_from_column, amount_to_column, Result};

/// Insert a vote and return its id.
#[allow(clippy::too_many_arguments)]
pub fn insert(
    conn: &Connection,
    publication_id: &str,
    voter_id: &str,
    community_id: &str,
    quota_amount: Amount,
    wallet_amount: Amount,
    wallet_community_id: Option<&str>,
    created_at: u64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO votes (publication_id, voter_id, community_id, quota_amount, wallet_amount,
            wallet_community_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            publication_id,
            voter_id,
            community_id,
            amount_to_column(quota_amount)?,
            amount_to_column(wallet_amount)?,
            wallet_community_id,
            created_at as i64,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Votes on a publication, oldest first.
pub fn list_for_publication(conn: &Connection, publication_id: &str) -> Result<Vec<Vote>> {
    let mut stmt = conn.prepare(
        "SELECT id, voter_id, community_id, quota_amount, wallet_amount, wallet_community_id, created_at
         FROM votes WHERE publication_id = ?1 ORDER BY created_at, id",
    )?;
    let raws = stmt
        .query_map([publication_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raws.into_iter()
        .map(
            |(id, voter_id, community_id, quota, wallet, wallet_community_id, created_at)| {
                Ok(Vote {
                    id,
                    publication_id: publication_id.to_string(),
                    voter_id,
                    community_id,
                    quota_amount: amount_from_column(quota, "votes.quota_amount")?,
                    wallet_amount: amount_from_column(wallet, "votes.wallet_amount")?,
                    wallet_community_id,
                    created_at: created_at as u64,
                })
            },
        )
        .collect()
}

/// Number of votes on a publication.
pub fn count_for_publication(conn: &Connection, publication_id: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM votes WHERE publication_id = ?1",
        [publication_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
