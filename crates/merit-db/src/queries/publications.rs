//! Publication queries.

use merit_types::publication::{Publication, PublicationDraft};
use merit_types::Amount;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::queries::investments;
use crate::{amount_from_column, amount_to_column, DbError, Result};

const COLUMNS: &str = "id, community_id, author_id, beneficiary_id, categories, score,
    investing_enabled, investment_pool, investment_pool_total, investor_share_percent,
    created_at, deleted_at";

/// Insert a new publication with zero score and an empty pool.
pub fn insert(conn: &Connection, draft: &PublicationDraft, created_at: u64) -> Result<()> {
    let categories = serde_json::to_string(&draft.categories)
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    conn.execute(
        "INSERT INTO publications (id, community_id, author_id, beneficiary_id, categories,
            investing_enabled, investor_share_percent, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            draft.id,
            draft.community_id,
            draft.author_id,
            draft.beneficiary_id,
            categories,
            draft.investing_enabled,
            draft.investor_share_percent,
            created_at as i64,
        ],
    )?;
    Ok(())
}

/// Load a publication together with its investments.
pub fn get(conn: &Connection, id: &str) -> Result<Publication> {
    get_opt(conn, id)?.ok_or_else(|| DbError::NotFound(format!("publication '{id}'")))
}

/// Load a publication if it exists.
pub fn get_opt(conn: &Connection, id: &str) -> Result<Option<Publication>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM publications WHERE id = ?1"),
            [id],
            read_raw,
        )
        .optional()?;
    match raw {
        Some(raw) => {
            let investments = investments::list(conn, id)?;
            Ok(Some(raw.into_publication(investments)?))
        }
        None => Ok(None),
    }
}

/// Non-deleted publications of a community, oldest first.
pub fn list_active(conn: &Connection, community_id: &str) -> Result<Vec<Publication>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM publications
         WHERE community_id = ?1 AND deleted_at IS NULL ORDER BY created_at, id"
    ))?;
    let raws = stmt
        .query_map([community_id], read_raw)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raws.into_iter()
        .map(|raw| {
            let investments = investments::list(conn, &raw.id)?;
            raw.into_publication(investments)
        })
        .collect()
}

/// Increase a publication's score.
pub fn add_score(conn: &Connection, id: &str, amount: Amount) -> Result<()> {
    let changed = conn.execute(
        "UPDATE publications SET score = score + ?2 WHERE id = ?1",
        rusqlite::params![id, amount_to_column(amount)?],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("publication '{id}'")));
    }
    Ok(())
}

/// Decrease a publication's score if it covers `amount`.
///
/// Returns `false` (and changes nothing) when the score is too low.
pub fn try_sub_score(conn: &Connection, id: &str, amount: Amount) -> Result<bool> {
    let amount = amount_to_column(amount)?;
    let changed = conn.execute(
        "UPDATE publications SET score = score - ?2 WHERE id = ?1 AND score >= ?2",
        rusqlite::params![id, amount],
    )?;
    Ok(changed == 1)
}

/// Add an investment to both the live pool and the historical total.
pub fn add_to_pool(conn: &Connection, id: &str, amount: Amount) -> Result<()> {
    let changed = conn.execute(
        "UPDATE publications
         SET investment_pool = investment_pool + ?2,
             investment_pool_total = investment_pool_total + ?2
         WHERE id = ?1",
        rusqlite::params![id, amount_to_column(amount)?],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("publication '{id}'")));
    }
    Ok(())
}

/// Remove `amount` from the live pool if it covers it.
pub fn try_sub_pool(conn: &Connection, id: &str, amount: Amount) -> Result<bool> {
    let amount = amount_to_column(amount)?;
    let changed = conn.execute(
        "UPDATE publications SET investment_pool = investment_pool - ?2
         WHERE id = ?1 AND investment_pool >= ?2",
        rusqlite::params![id, amount],
    )?;
    Ok(changed == 1)
}

/// Soft-delete a publication. Returns `false` if it was already deleted.
pub fn mark_deleted(conn: &Connection, id: &str, deleted_at: u64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE publications SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
        rusqlite::params![id, deleted_at as i64],
    )?;
    Ok(changed == 1)
}

/// Row image before JSON and amount decoding.
struct RawPublication {
    id: String,
    community_id: String,
    author_id: String,
    beneficiary_id: Option<String>,
    categories: String,
    score: i64,
    investing_enabled: bool,
    investment_pool: i64,
    investment_pool_total: i64,
    investor_share_percent: u8,
    created_at: i64,
    deleted_at: Option<i64>,
}

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawPublication> {
    Ok(RawPublication {
        id: row.get(0)?,
        community_id: row.get(1)?,
        author_id: row.get(2)?,
        beneficiary_id: row.get(3)?,
        categories: row.get(4)?,
        score: row.get(5)?,
        investing_enabled: row.get(6)?,
        investment_pool: row.get(7)?,
        investment_pool_total: row.get(8)?,
        investor_share_percent: row.get(9)?,
        created_at: row.get(10)?,
        deleted_at: row.get(11)?,
    })
}

impl RawPublication {
    fn into_publication(
        self,
        investments: Vec<merit_types::publication::Investment>,
    ) -> Result<Publication> {
        let categories: Vec<String> = serde_json::from_str(&self.categories)
            .map_err(|e| DbError::Serialization(format!("categories of '{}': {e}", self.id)))?;
        Ok(Publication {
            score: amount_from_column(self.score, "publications.score")?,
            investment_pool: amount_from_column(self.investment_pool, "publications.investment_pool")?,
            investment_pool_total: amount_from_column(
                self.investment_pool_total,
                "publications.investment_pool_total",
            )?,
            id: self.id,
            community_id: self.community_id,
            author_id: self.author_id,
            beneficiary_id: self.beneficiary_id,
            categories,
            investing_enabled: self.investing_enabled,
            investor_share_percent: self.investor_share_percent,
            investments,
            created_at: self.created_at as u64,
            deleted_at: self.deleted_at.map(|t| t as u64),
        })
    }
}
