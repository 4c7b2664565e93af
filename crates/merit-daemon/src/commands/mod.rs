//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category. Handlers
//! parse params, resolve the community, lock the database for exactly one
//! engine call and emit an event once the call has committed.

pub mod diagnostics;
pub mod economy;
pub mod publications;
pub mod tappalka;

use std::fmt::Display;

use merit_types::community::CommunitySettings;
use merit_types::ErrorClass;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::rpc::RpcError;
use crate::DaemonState;

pub(crate) type Result = std::result::Result<Value, RpcError>;

/// Deserialize params, treating a missing params object as `{}`.
pub(crate) fn parse<T: DeserializeOwned>(params: &Value) -> std::result::Result<T, RpcError> {
    let params = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params.clone()
    };
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(&e.to_string()))
}

/// Serialize a handler result.
pub(crate) fn to_value<T: serde::Serialize>(value: &T) -> Result {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Look up configured community settings.
pub(crate) fn community<'a>(
    state: &'a DaemonState,
    community_id: &str,
) -> std::result::Result<&'a CommunitySettings, RpcError> {
    state
        .communities
        .get(community_id)
        .ok_or_else(|| RpcError::unknown_community(community_id))
}

/// Translate a classified engine error.
pub(crate) fn engine_error<E: Display>(class: ErrorClass, err: E) -> RpcError {
    RpcError::engine(class, &err.to_string())
}
