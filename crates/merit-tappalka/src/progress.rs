//! Player progress.

use merit_db::queries::tappalka;
use merit_types::community::CommunitySettings;
use merit_types::tappalka::TappalkaProgress;
use rusqlite::Connection;

use crate::{log_unexpected, Result};

/// Progress of `user_id` in a community, created zeroed on first access.
pub fn get_progress(
    conn: &Connection,
    settings: &CommunitySettings,
    user_id: &str,
) -> Result<TappalkaProgress> {
    log_unexpected(
        "get_progress",
        tappalka::ensure_progress(conn, user_id, &settings.id).map_err(Into::into),
    )
}

/// Set the onboarding latch. Idempotent; the latch is never cleared.
pub fn mark_onboarding_seen(
    conn: &Connection,
    settings: &CommunitySettings,
    user_id: &str,
) -> Result<TappalkaProgress> {
    tappalka::mark_onboarding_seen(conn, user_id, &settings.id)?;
    tracing::debug!(user = user_id, community = %settings.id, "tappalka onboarding seen");
    get_progress(conn, settings, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::tests::settings;

    #[test]
    fn test_progress_lazily_created() {
        let conn = merit_db::open_memory().expect("open");
        let progress = get_progress(&conn, &settings(), "player").expect("progress");
        assert_eq!(progress, TappalkaProgress::new("player", "c1"));
    }

    #[test]
    fn test_onboarding_latch() {
        let conn = merit_db::open_memory().expect("open");
        let settings = settings();
        assert!(mark_onboarding_seen(&conn, &settings, "player")
            .expect("mark")
            .onboarding_seen);
        assert!(mark_onboarding_seen(&conn, &settings, "player")
            .expect("mark again")
            .onboarding_seen);

        let mut progress = get_progress(&conn, &settings, "player").expect("progress");
        progress.onboarding_seen = false;
        tappalka::save_progress(&conn, &progress).expect("save");
        assert!(get_progress(&conn, &settings, "player")
            .expect("progress")
            .onboarding_seen);
    }
}
