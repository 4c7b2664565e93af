//! Publication and permission command handlers.

use std::sync::Arc;

use merit_db::queries::publications;
use merit_invest::payout::CloseRequest;
use merit_permissions::PermissionEngine;
use merit_types::identity::Role;
use merit_types::permission::{Action, PermissionContext};
use merit_types::publication::PublicationDraft;
use merit_types::{CommunityId, ErrorClass, PublicationId};
use serde::Deserialize;
use serde_json::Value;

use super::{community, engine_error, parse, to_value, Result};
use crate::events::{Event, EventType};
use crate::{unix_now, DaemonState};

#[derive(Deserialize)]
struct CreateParams {
    role: Role,
    #[serde(default)]
    context: PermissionContext,
    draft: PublicationDraft,
}

#[derive(Deserialize)]
struct PublicationParams {
    publication_id: PublicationId,
}

#[derive(Deserialize)]
struct CommunityParams {
    community_id: CommunityId,
}

#[derive(Deserialize)]
struct CloseParams {
    community_id: CommunityId,
    #[serde(flatten)]
    request: CloseRequest,
}

#[derive(Deserialize)]
struct EvaluateParams {
    community_id: CommunityId,
    role: Role,
    action: Action,
    #[serde(default)]
    context: PermissionContext,
}

/// Create a publication, charging the post fee.
pub async fn create_publication(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: CreateParams = parse(params)?;
    let settings = community(state, &p.draft.community_id)?;
    let now = unix_now();
    let receipt = {
        let mut db = state.db.lock().await;
        merit_voting::publishing::create_publication(
            &mut db, settings, p.role, &p.context, &p.draft, now,
        )
        .map_err(|e| engine_error(e.class(), e))?
    };

    state.event_bus.emit(Event::new(
        EventType::PublicationCreated,
        now,
        serde_json::json!({
            "community_id": settings.id,
            "publication_id": receipt.publication.id,
            "author_id": receipt.publication.author_id,
        }),
    ));
    to_value(&receipt)
}

/// A publication with its investments.
pub async fn get_publication(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: PublicationParams = parse(params)?;
    let db = state.db.lock().await;
    let publication = publications::get_opt(&db, &p.publication_id)
        .map_err(|e| engine_error(ErrorClass::Storage, e))?
        .ok_or_else(|| {
            engine_error(
                ErrorClass::NotFound,
                format!("publication '{}'", p.publication_id),
            )
        })?;
    to_value(&publication)
}

/// Live publications of a community, oldest first.
pub async fn list_publications(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: CommunityParams = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let db = state.db.lock().await;
    let list = publications::list_active(&db, &settings.id)
        .map_err(|e| engine_error(ErrorClass::Storage, e))?;
    to_value(&list)
}

/// Votes recorded on a publication.
pub async fn list_votes(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: PublicationParams = parse(params)?;
    let db = state.db.lock().await;
    let votes = merit_voting::vote::list_votes(&db, &p.publication_id)
        .map_err(|e| engine_error(e.class(), e))?;
    to_value(&votes)
}

/// Close (soft-delete) a publication, paying out pool and rating first.
pub async fn close_publication(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: CloseParams = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let now = unix_now();
    let receipt = {
        let mut db = state.db.lock().await;
        merit_invest::payout::close(&mut db, settings, &p.request, now)
            .map_err(|e| engine_error(e.class(), e))?
    };

    state.event_bus.emit(Event::new(
        EventType::PublicationClosed,
        now,
        serde_json::json!({
            "community_id": settings.id,
            "publication_id": receipt.publication_id,
            "refunded_investors": receipt.refunds.len(),
        }),
    ));
    to_value(&receipt)
}

/// Evaluate a permission without performing the action.
pub async fn evaluate_permission(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: EvaluateParams = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let decision = PermissionEngine::for_community(settings).evaluate(p.role, p.action, &p.context);
    to_value(&decision)
}
