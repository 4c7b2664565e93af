//! Tappalka command handlers.

use std::sync::Arc;

use merit_tappalka::session::ChoiceRequest;
use merit_tappalka::{eligibility, progress, session};
use merit_types::identity::Role;
use merit_types::{CommunityId, UserId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde_json::Value;

use super::{community, engine_error, parse, to_value, Result};
use crate::events::{Event, EventType};
use crate::{unix_now, DaemonState};

#[derive(Deserialize)]
struct PlayerParams {
    community_id: CommunityId,
    user_id: UserId,
}

#[derive(Deserialize)]
struct PairParams {
    community_id: CommunityId,
    user_id: UserId,
    role: Role,
}

#[derive(Deserialize)]
struct ChoiceParams {
    community_id: CommunityId,
    #[serde(flatten)]
    request: ChoiceRequest,
}

/// Posts the player may be shown.
pub async fn get_eligible_posts(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: PlayerParams = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let db = state.db.lock().await;
    let posts = eligibility::get_eligible_posts(&db, settings, &p.user_id)
        .map_err(|e| engine_error(e.class(), e))?;
    to_value(&posts)
}

/// Issue a pair. `null` when fewer than two posts are eligible.
pub async fn get_pair(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: PairParams = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let mut rng = StdRng::from_entropy();
    let db = state.db.lock().await;
    let pair = session::get_pair(&db, settings, &p.user_id, p.role, &mut rng, unix_now())
        .map_err(|e| engine_error(e.class(), e))?;
    to_value(&pair)
}

/// Record a choice and return the next pair.
pub async fn submit_choice(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ChoiceParams = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let now = unix_now();
    let mut rng = StdRng::from_entropy();
    let outcome = {
        let mut db = state.db.lock().await;
        session::submit_choice(&mut db, settings, &p.request, &mut rng, now)
            .map_err(|e| engine_error(e.class(), e))?
    };

    if outcome.reward_earned {
        state.event_bus.emit(Event::new(
            EventType::TappalkaRewardEarned,
            now,
            serde_json::json!({
                "community_id": settings.id,
                "user_id": p.request.user_id,
                "amount": outcome.user_merits_earned,
                "total_rewards_earned": outcome.progress.total_rewards_earned,
            }),
        ));
    }
    to_value(&outcome)
}

/// Player progress.
pub async fn get_progress(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: PlayerParams = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let db = state.db.lock().await;
    let progress = progress::get_progress(&db, settings, &p.user_id)
        .map_err(|e| engine_error(e.class(), e))?;
    to_value(&progress)
}

/// Set the onboarding latch.
pub async fn mark_onboarding_seen(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: PlayerParams = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let db = state.db.lock().await;
    let progress = progress::mark_onboarding_seen(&db, settings, &p.user_id)
        .map_err(|e| engine_error(e.class(), e))?;
    to_value(&progress)
}
