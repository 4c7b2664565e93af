//! Diagnostics command handlers.

use std::sync::Arc;

use serde_json::Value;

use super::Result;
use crate::DaemonState;

/// Daemon version and event counters.
pub async fn get_daemon_info(state: &Arc<DaemonState>) -> Result {
    Ok(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "schema_version": merit_db::SCHEMA_VERSION,
        "events_emitted": state.event_bus.sequence(),
        "communities": state.communities.len(),
    }))
}

/// Configured communities, sorted by id.
pub async fn list_communities(state: &Arc<DaemonState>) -> Result {
    let mut communities: Vec<Value> = state
        .communities
        .values()
        .map(|c| {
            serde_json::json!({
                "id": c.id,
                "community_type": c.community_type,
                "currency_label": c.currency_label,
                "priority": c.is_priority(),
                "routing": c.routing(),
                "tappalka_enabled": c.tappalka.enabled,
            })
        })
        .collect();
    communities.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
    Ok(Value::Array(communities))
}
