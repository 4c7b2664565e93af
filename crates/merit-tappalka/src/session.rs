//! Pair sessions and choices.

use merit_db::queries::{publications, tappalka};
use merit_ledger::posting::{Account, Posting, TxKind};
use merit_ledger::{resolver, wallet};
use merit_permissions::PermissionEngine;
use merit_types::community::CommunitySettings;
use merit_types::identity::Role;
use merit_types::permission::{Action, Decision, DenialReason, PermissionContext};
use merit_types::tappalka::{TappalkaPair, TappalkaProgress, TappalkaSession};
use merit_types::{Amount, PublicationId, SessionId, UserId};
use rand::Rng;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::eligibility::{get_eligible_posts, is_eligible};
use crate::{log_unexpected, Result, TappalkaError};

/// Random bytes in a session id.
const SESSION_ID_BYTES: usize = 16;

/// A player's pick for a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRequest {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub role: Role,
    pub winner_id: PublicationId,
    pub loser_id: PublicationId,
}

/// Result of a recorded choice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOutcome {
    pub reward_earned: bool,
    /// Zero unless `reward_earned`.
    pub user_merits_earned: Amount,
    pub progress: TappalkaProgress,
    pub next_pair: Option<TappalkaPair>,
    pub no_more_posts: bool,
}

/// Issue a pair of distinct eligible posts, or `None` with fewer than two.
///
/// A disabled game has no eligible posts, so it also yields `None`. Issuing
/// a pair retires the player's earlier unresolved sessions.
pub fn get_pair<R: Rng + ?Sized>(
    conn: &Connection,
    settings: &CommunitySettings,
    user_id: &str,
    role: Role,
    rng: &mut R,
    now: u64,
) -> Result<Option<TappalkaPair>> {
    check_play(settings, role)?;
    log_unexpected("get_pair", issue_pair(conn, settings, user_id, rng, now))
}

/// Record a choice, move ratings, advance progress and issue the next pair.
///
/// All writes share one transaction: a failed reward credit leaves the
/// ratings and the session untouched.
pub fn submit_choice<R: Rng + ?Sized>(
    conn: &mut Connection,
    settings: &CommunitySettings,
    request: &ChoiceRequest,
    rng: &mut R,
    now: u64,
) -> Result<ChoiceOutcome> {
    if !settings.tappalka.enabled {
        return Err(TappalkaError::Denied(DenialReason::FeatureDisabled));
    }
    check_play(settings, request.role)?;
    log_unexpected(
        "submit_choice",
        submit_inner(conn, settings, request, rng, now),
    )
}

fn submit_inner<R: Rng + ?Sized>(
    conn: &mut Connection,
    settings: &CommunitySettings,
    request: &ChoiceRequest,
    rng: &mut R,
    now: u64,
) -> Result<ChoiceOutcome> {
    let tx = merit_db::begin_write(conn)?;
    let session = tappalka::get_session(&tx, &request.session_id)?
        .filter(|s| s.user_id == request.user_id && s.community_id == settings.id)
        .ok_or_else(|| TappalkaError::SessionNotFound(request.session_id.clone()))?;
    if session.resolved {
        return Err(TappalkaError::SessionResolved(session.session_id));
    }
    if !session.matches_pair(&request.winner_id, &request.loser_id) {
        return Err(TappalkaError::PairMismatch(session.session_id));
    }

    for post_id in [&session.post_a, &session.post_b] {
        let available = publications::get_opt(&tx, post_id)?
            .is_some_and(|p| is_eligible(&p, settings, &request.user_id));
        if !available {
            tracing::debug!(session = %session.session_id, post = %post_id, "pair post retired");
            return Err(TappalkaError::PostsNoLongerAvailable(session.session_id));
        }
    }

    let tappalka_settings = &settings.tappalka;
    let burn = Account::burn(&settings.id);
    let show = Posting::new(TxKind::TappalkaShow, &session.session_id)
        .with_currency_label(&settings.currency_label)
        .transfer(
            Account::score(&session.post_a, &settings.id),
            burn.clone(),
            tappalka_settings.show_cost,
        )
        .transfer(
            Account::score(&session.post_b, &settings.id),
            burn,
            tappalka_settings.show_cost,
        );
    wallet::commit(&tx, &show, now)?;

    let win = Posting::new(TxKind::TappalkaWin, &session.session_id)
        .with_currency_label(&settings.currency_label)
        .transfer(
            Account::emission(&settings.id),
            Account::score(&request.winner_id, &settings.id),
            tappalka_settings.win_reward,
        );
    wallet::commit(&tx, &win, now)?;

    if !tappalka::resolve_session(&tx, &session.session_id)? {
        return Err(TappalkaError::SessionResolved(session.session_id));
    }

    let mut progress = tappalka::ensure_progress(&tx, &request.user_id, &settings.id)?;
    progress.comparison_count = progress.comparison_count.saturating_add(1);
    progress.total_comparisons = progress.total_comparisons.saturating_add(1);

    let mut user_merits_earned = Amount::ZERO;
    let reward_earned = progress.comparison_count >= tappalka_settings.comparisons_required.max(1);
    if reward_earned {
        progress.comparison_count = 0;
        progress.total_rewards_earned = progress.total_rewards_earned.saturating_add(1);
        if !tappalka_settings.user_reward.is_zero() {
            let reward_wallet = resolver::tappalka_reward_account(&request.user_id, settings);
            wallet::credit_emission(
                &tx,
                &request.user_id,
                reward_wallet.community_id(),
                tappalka_settings.user_reward,
                TxKind::TappalkaReward,
                &session.session_id,
                now,
            )?;
            user_merits_earned = tappalka_settings.user_reward;
        }
    }
    tappalka::save_progress(&tx, &progress)?;

    let next_pair = issue_pair(&tx, settings, &request.user_id, rng, now)?;
    tx.commit()?;

    tracing::info!(
        session = %session.session_id,
        user = %request.user_id,
        winner = %request.winner_id,
        loser = %request.loser_id,
        show_cost = %tappalka_settings.show_cost,
        win_reward = %tappalka_settings.win_reward,
        reward_earned,
        "tappalka choice recorded"
    );

    Ok(ChoiceOutcome {
        reward_earned,
        user_merits_earned,
        progress,
        no_more_posts: next_pair.is_none(),
        next_pair,
    })
}

fn issue_pair<R: Rng + ?Sized>(
    conn: &Connection,
    settings: &CommunitySettings,
    user_id: &str,
    rng: &mut R,
    now: u64,
) -> Result<Option<TappalkaPair>> {
    let posts = get_eligible_posts(conn, settings, user_id)?;
    if posts.len() < 2 {
        return Ok(None);
    }

    let picked = rand::seq::index::sample(rng, posts.len(), 2);
    let post_a = posts[picked.index(0)].clone();
    let post_b = posts[picked.index(1)].clone();

    let mut bytes = [0u8; SESSION_ID_BYTES];
    rng.fill(&mut bytes[..]);
    let session = TappalkaSession {
        session_id: hex::encode(bytes),
        user_id: user_id.to_string(),
        community_id: settings.id.clone(),
        post_a: post_a.id.clone(),
        post_b: post_b.id.clone(),
        created_at: now,
        resolved: false,
    };
    let retired = tappalka::retire_open_sessions(conn, user_id, &settings.id)?;
    tappalka::insert_session(conn, &session)?;
    tracing::debug!(
        session = %session.session_id,
        user = user_id,
        retired,
        post_a = %session.post_a,
        post_b = %session.post_b,
        "tappalka pair issued"
    );

    Ok(Some(TappalkaPair {
        session_id: session.session_id,
        post_a,
        post_b,
    }))
}

fn check_play(settings: &CommunitySettings, role: Role) -> Result<()> {
    match PermissionEngine::for_community(settings).evaluate(
        role,
        Action::PlayTappalka,
        &PermissionContext::default(),
    ) {
        Decision::Allowed => Ok(()),
        Decision::Denied(reason) => Err(TappalkaError::Denied(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::tests::{post, settings};
    use merit_types::ErrorClass;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn choice(pair: &TappalkaPair, winner_is_a: bool) -> ChoiceRequest {
        let (winner, loser) = if winner_is_a {
            (&pair.post_a, &pair.post_b)
        } else {
            (&pair.post_b, &pair.post_a)
        };
        ChoiceRequest {
            session_id: pair.session_id.clone(),
            user_id: "player".to_string(),
            role: Role::Participant,
            winner_id: winner.id.clone(),
            loser_id: loser.id.clone(),
        }
    }

    fn score(conn: &Connection, id: &str) -> Amount {
        publications::get(conn, id).expect("publication").score
    }

    #[test]
    fn test_no_pair_with_one_post() {
        let conn = merit_db::open_memory().expect("open");
        post(&conn, "p1", "other", 5, &[]);
        let mut rng = StdRng::seed_from_u64(7);
        let pair = get_pair(&conn, &settings(), "player", Role::Participant, &mut rng, 0)
            .expect("pair");
        assert!(pair.is_none());
    }

    #[test]
    fn test_pair_is_distinct_and_persisted() {
        let conn = merit_db::open_memory().expect("open");
        post(&conn, "p1", "other", 5, &[]);
        post(&conn, "p2", "other", 5, &[]);
        let mut rng = StdRng::seed_from_u64(7);

        let pair = get_pair(&conn, &settings(), "player", Role::Participant, &mut rng, 0)
            .expect("pair")
            .expect("two posts");
        assert_ne!(pair.post_a.id, pair.post_b.id);
        assert_eq!(pair.session_id.len(), SESSION_ID_BYTES * 2);
        let session = tappalka::get_session(&conn, &pair.session_id)
            .expect("lookup")
            .expect("stored");
        assert!(session.matches_pair(&pair.post_a.id, &pair.post_b.id));
    }

    #[test]
    fn test_choice_moves_ratings() {
        let mut conn = merit_db::open_memory().expect("open");
        post(&conn, "p1", "other", 5, &[]);
        post(&conn, "p2", "other", 5, &[]);
        let settings = settings();
        let mut rng = StdRng::seed_from_u64(1);

        let pair = get_pair(&conn, &settings, "player", Role::Participant, &mut rng, 0)
            .expect("pair")
            .expect("two posts");
        let request = choice(&pair, true);
        let outcome = submit_choice(&mut conn, &settings, &request, &mut rng, 10).expect("choice");

        // 5 - 0.1 + 1 for the winner, 5 - 0.1 for the loser
        assert_eq!(score(&conn, &request.winner_id), Amount::from_micro(5_900_000));
        assert_eq!(score(&conn, &request.loser_id), Amount::from_micro(4_900_000));
        assert!(!outcome.reward_earned);
        assert_eq!(outcome.progress.comparison_count, 1);
        assert!(outcome.next_pair.is_some());
        assert!(!outcome.no_more_posts);
    }

    #[test]
    fn test_milestone_rewards_local_wallet() {
        let mut conn = merit_db::open_memory().expect("open");
        post(&conn, "p1", "other", 10, &[]);
        post(&conn, "p2", "other", 10, &[]);
        post(&conn, "p3", "other", 10, &[]);
        let mut settings = settings();
        settings.tappalka.comparisons_required = 3;
        settings.tappalka.user_reward = Amount::from_merits(5);
        let mut rng = StdRng::seed_from_u64(42);

        let mut pair = get_pair(&conn, &settings, "player", Role::Participant, &mut rng, 0)
            .expect("pair")
            .expect("posts");
        for round in 1..=3 {
            let outcome = submit_choice(&mut conn, &settings, &choice(&pair, true), &mut rng, round)
                .expect("choice");
            assert_eq!(outcome.reward_earned, round == 3);
            if round == 3 {
                assert_eq!(outcome.user_merits_earned, Amount::from_merits(5));
                assert_eq!(outcome.progress.comparison_count, 0);
                assert_eq!(outcome.progress.total_comparisons, 3);
                assert_eq!(outcome.progress.total_rewards_earned, 1);
            }
            pair = outcome.next_pair.expect("next pair");
        }
        assert_eq!(
            wallet::get_balance(&conn, "player", "c1").expect("local"),
            Amount::from_merits(5)
        );
    }

    #[test]
    fn test_session_resolves_once() {
        let mut conn = merit_db::open_memory().expect("open");
        post(&conn, "p1", "other", 5, &[]);
        post(&conn, "p2", "other", 5, &[]);
        let settings = settings();
        let mut rng = StdRng::seed_from_u64(3);

        let pair = get_pair(&conn, &settings, "player", Role::Participant, &mut rng, 0)
            .expect("pair")
            .expect("posts");
        submit_choice(&mut conn, &settings, &choice(&pair, true), &mut rng, 1).expect("first");
        let err = submit_choice(&mut conn, &settings, &choice(&pair, true), &mut rng, 2)
            .expect_err("replay");
        assert!(matches!(err, TappalkaError::SessionResolved(_)));
    }

    #[test]
    fn test_foreign_session_and_mismatch() {
        let mut conn = merit_db::open_memory().expect("open");
        post(&conn, "p1", "other", 5, &[]);
        post(&conn, "p2", "other", 5, &[]);
        post(&conn, "p3", "other", 5, &[]);
        let settings = settings();
        let mut rng = StdRng::seed_from_u64(3);

        let pair = get_pair(&conn, &settings, "player", Role::Participant, &mut rng, 0)
            .expect("pair")
            .expect("posts");

        let mut stolen = choice(&pair, true);
        stolen.user_id = "intruder".to_string();
        let err = submit_choice(&mut conn, &settings, &stolen, &mut rng, 1).expect_err("foreign");
        assert_eq!(err.class(), ErrorClass::NotFound);

        let mut wrong = choice(&pair, true);
        wrong.loser_id = ["p1", "p2", "p3"]
            .into_iter()
            .find(|id| *id != pair.post_a.id && *id != pair.post_b.id)
            .expect("third post")
            .to_string();
        let err = submit_choice(&mut conn, &settings, &wrong, &mut rng, 1).expect_err("mismatch");
        assert!(matches!(err, TappalkaError::PairMismatch(_)));
    }

    #[test]
    fn test_deleted_post_no_longer_available() {
        let mut conn = merit_db::open_memory().expect("open");
        post(&conn, "p1", "other", 5, &[]);
        post(&conn, "p2", "other", 5, &[]);
        let settings = settings();
        let mut rng = StdRng::seed_from_u64(3);

        let pair = get_pair(&conn, &settings, "player", Role::Participant, &mut rng, 0)
            .expect("pair")
            .expect("posts");
        publications::mark_deleted(&conn, "p1", 5).expect("delete");

        let err = submit_choice(&mut conn, &settings, &choice(&pair, true), &mut rng, 6)
            .expect_err("gone");
        assert!(matches!(err, TappalkaError::PostsNoLongerAvailable(_)));
        assert_eq!(score(&conn, "p2"), Amount::from_merits(5));
    }

    #[test]
    fn test_last_pair_reports_no_more_posts() {
        let mut conn = merit_db::open_memory().expect("open");
        post(&conn, "p1", "other", 1, &[]);
        post(&conn, "p2", "other", 1, &[]);
        let settings = settings();
        let mut rng = StdRng::seed_from_u64(9);

        let pair = get_pair(&conn, &settings, "player", Role::Participant, &mut rng, 0)
            .expect("pair")
            .expect("posts");
        // The loser drops to 0.9, under the 1-merit minimum.
        let outcome =
            submit_choice(&mut conn, &settings, &choice(&pair, true), &mut rng, 1).expect("choice");
        assert!(outcome.no_more_posts);
        assert!(outcome.next_pair.is_none());
    }

    #[test]
    fn test_viewer_cannot_play() {
        let conn = merit_db::open_memory().expect("open");
        let mut rng = StdRng::seed_from_u64(0);
        let err = get_pair(&conn, &settings(), "player", Role::Viewer, &mut rng, 0)
            .expect_err("viewer");
        assert_eq!(err.class(), ErrorClass::Denied);
    }

    #[test]
    fn test_new_pair_retires_previous_session() {
        let mut conn = merit_db::open_memory().expect("open");
        post(&conn, "p1", "other", 5, &[]);
        post(&conn, "p2", "other", 5, &[]);
        let settings = settings();
        let mut rng = StdRng::seed_from_u64(11);

        let first = get_pair(&conn, &settings, "player", Role::Participant, &mut rng, 0)
            .expect("pair")
            .expect("posts");
        let second = get_pair(&conn, &settings, "player", Role::Participant, &mut rng, 1)
            .expect("pair")
            .expect("posts");
        assert_ne!(first.session_id, second.session_id);

        let err = submit_choice(&mut conn, &settings, &choice(&first, true), &mut rng, 2)
            .expect_err("retired");
        assert!(matches!(err, TappalkaError::SessionNotFound(_)));
        let open: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM tappalka_sessions WHERE user_id = 'player' AND resolved = 0",
                [],
                |row| row.get(0),
            )
            .expect("count");
        assert_eq!(open, 1);

        let outcome = submit_choice(&mut conn, &settings, &choice(&second, true), &mut rng, 3)
            .expect("current session");
        assert_eq!(outcome.progress.comparison_count, 1);
    }

    #[test]
    fn test_disabled_game_has_no_pair() {
        let mut conn = merit_db::open_memory().expect("open");
        post(&conn, "p1", "other", 5, &[]);
        post(&conn, "p2", "other", 5, &[]);
        let mut settings = settings();
        settings.tappalka.enabled = false;
        let mut rng = StdRng::seed_from_u64(5);

        let pair = get_pair(&conn, &settings, "player", Role::Participant, &mut rng, 0)
            .expect("no error when disabled");
        assert!(pair.is_none());

        let request = ChoiceRequest {
            session_id: "missing".to_string(),
            user_id: "player".to_string(),
            role: Role::Participant,
            winner_id: "p1".to_string(),
            loser_id: "p2".to_string(),
        };
        let err = submit_choice(&mut conn, &settings, &request, &mut rng, 1).expect_err("disabled");
        assert!(matches!(
            err,
            TappalkaError::Denied(DenialReason::FeatureDisabled)
        ));
    }
}
