//! Eligible-post filtering.

use merit_db::queries::publications;
use merit_types::community::CommunitySettings;
use merit_types::publication::Publication;
use merit_types::tappalka::PairPost;
use rusqlite::Connection;

use crate::Result;

/// Whether `publication` may be shown to `user_id`.
///
/// The rating must cover both the configured minimum and one showing.
pub fn is_eligible(publication: &Publication, settings: &CommunitySettings, user_id: &str) -> bool {
    publication.community_id == settings.id
        && !publication.is_deleted()
        && publication.author_id != user_id
        && publication.score >= settings.tappalka.eligibility_floor()
        && publication.in_any_category(&settings.tappalka.categories)
}

/// Posts `user_id` may be shown, oldest first. Empty when tappalka is off.
pub fn get_eligible_posts(
    conn: &Connection,
    settings: &CommunitySettings,
    user_id: &str,
) -> Result<Vec<PairPost>> {
    if !settings.tappalka.enabled {
        return Ok(Vec::new());
    }
    let posts = publications::list_active(conn, &settings.id)?
        .into_iter()
        .filter(|p| is_eligible(p, settings, user_id))
        .map(pair_post)
        .collect();
    Ok(posts)
}

pub(crate) fn pair_post(publication: Publication) -> PairPost {
    PairPost {
        id: publication.id,
        author_id: publication.author_id,
        rating: publication.score,
        categories: publication.categories,
    }
}
