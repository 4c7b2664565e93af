//! Tappalka progress and pair-session queries.

use merit_types::tappalka::{TappalkaProgress, TappalkaSession};
use rusqlite::{Connection, OptionalExtension};

use crate::Result;

/// Load progress, creating a zeroed row on first access.
pub fn ensure_progress(conn: &Connection, user_id: &str, community_id: &str) -> Result<TappalkaProgress> {
    conn.execute(
        "INSERT OR IGNORE INTO tappalka_progress (user_id, community_id) VALUES (?1, ?2)",
        rusqlite::params![user_id, community_id],
    )?;
    let progress = conn.query_row(
        "SELECT comparison_count, total_comparisons, total_rewards_earned, onboarding_seen
         FROM tappalka_progress WHERE user_id = ?1 AND community_id = ?2",
        rusqlite::params![user_id, community_id],
        |row| {
            Ok(TappalkaProgress {
                user_id: user_id.to_string(),
                community_id: community_id.to_string(),
                comparison_count: row.get(0)?,
                total_comparisons: row.get::<_, i64>(1)? as u64,
                total_rewards_earned: row.get::<_, i64>(2)? as u64,
                onboarding_seen: row.get(3)?,
            })
        },
    )?;
    Ok(progress)
}

/// Persist counters. The onboarding latch is never cleared here.
pub fn save_progress(conn: &Connection, progress: &TappalkaProgress) -> Result<()> {
    conn.execute(
        "INSERT INTO tappalka_progress
            (user_id, community_id, comparison_count, total_comparisons, total_rewards_earned, onboarding_seen)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id, community_id) DO UPDATE
            SET comparison_count = excluded.comparison_count,
                total_comparisons = excluded.total_comparisons,
                total_rewards_earned = excluded.total_rewards_earned,
                onboarding_seen = MAX(onboarding_seen, excluded.onboarding_seen)",
        rusqlite::params![
            progress.user_id,
            progress.community_id,
            progress.comparison_count,
            progress.total_comparisons as i64,
            progress.total_rewards_earned as i64,
            progress.onboarding_seen,
        ],
    )?;
    Ok(())
}

/// Set the onboarding latch.
pub fn mark_onboarding_seen(conn: &Connection, user_id: &str, community_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO tappalka_progress (user_id, community_id, onboarding_seen) VALUES (?1, ?2, 1)
         ON CONFLICT(user_id, community_id) DO UPDATE SET onboarding_seen = 1",
        rusqlite::params![user_id, community_id],
    )?;
    Ok(())
}

/// Store a freshly issued pair session.
pub fn insert_session(conn: &Connection, session: &TappalkaSession) -> Result<()> {
    conn.execute(
        "INSERT INTO tappalka_sessions (session_id, user_id, community_id, post_a, post_b, created_at, resolved)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            session.session_id,
            session.user_id,
            session.community_id,
            session.post_a,
            session.post_b,
            session.created_at as i64,
            session.resolved,
        ],
    )?;
    Ok(())
}

/// Drop a player's unresolved sessions in a community.
///
/// Resolved sessions stay: their ids are the references of the tappalka
/// journal entries.
pub fn retire_open_sessions(conn: &Connection, user_id: &str, community_id: &str) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM tappalka_sessions WHERE user_id = ?1 AND community_id = ?2 AND resolved = 0",
        rusqlite::params![user_id, community_id],
    )?;
    Ok(removed)
}

/// Load a session by id.
pub fn get_session(conn: &Connection, session_id: &str) -> Result<Option<TappalkaSession>> {
    let session = conn
        .query_row(
            "SELECT user_id, community_id, post_a, post_b, created_at, resolved
             FROM tappalka_sessions WHERE session_id = ?1",
            [session_id],
            |row| {
                Ok(TappalkaSession {
                    session_id: session_id.to_string(),
                    user_id: row.get(0)?,
                    community_id: row.get(1)?,
                    post_a: row.get(2)?,
                    post_b: row.get(3)?,
                    created_at: row.get::<_, i64>(4)? as u64,
                    resolved: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(session)
}

/// Mark a session resolved. Returns `false` if it was already resolved.
pub fn resolve_session(conn: &Connection, session_id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE tappalka_sessions SET resolved = 1 WHERE session_id = ?1 AND resolved = 0",
        [session_id],
    )?;
    Ok(changed == 1)
}
