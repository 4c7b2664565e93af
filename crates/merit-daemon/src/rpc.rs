//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC 2.0 calls to the command handlers. Amounts
//! cross the wire as integer micro-merits.

use std::path::PathBuf;
use std::sync::Arc;

use merit_types::ErrorClass;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::events::EventFilter;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Stable error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: &str, detail: Option<&str>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: detail.map(|d| serde_json::json!({ "detail": d })),
        }
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self::new(-32700, "PARSE_ERROR", None)
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self::new(-32600, "INVALID_REQUEST", None)
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({ "method": method })),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::new(-32602, "INVALID_PARAMS", Some(detail))
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self::new(-32603, "INTERNAL_ERROR", Some(detail))
    }

    // Engine outcomes

    /// Unknown community id (-32020).
    pub fn unknown_community(community_id: &str) -> Self {
        Self {
            code: -32020,
            message: "UNKNOWN_COMMUNITY".to_string(),
            data: Some(serde_json::json!({ "community_id": community_id })),
        }
    }

    /// Map an engine error to its stable code by class.
    pub fn engine(class: ErrorClass, detail: &str) -> Self {
        match class {
            ErrorClass::Denied => Self::new(-32030, "FORBIDDEN", Some(detail)),
            ErrorClass::InsufficientFunds => Self::new(-32040, "INSUFFICIENT_FUNDS", Some(detail)),
            ErrorClass::InsufficientQuota => Self::new(-32041, "INSUFFICIENT_QUOTA", Some(detail)),
            ErrorClass::NotFound => Self::new(-32044, "NOT_FOUND", Some(detail)),
            ErrorClass::InvalidInput => Self::invalid_params(detail),
            // Details of bugs and storage failures stay in the daemon log.
            ErrorClass::InvariantViolation => Self::new(-32050, "INVARIANT_VIOLATION", None),
            ErrorClass::Storage => Self::internal_error("storage failure"),
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let request = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => request,
            Err(_) => {
                let response = RpcResponse::error(serde_json::Value::Null, RpcError::parse_error());
                write_line(&mut writer, &response).await?;
                continue;
            }
        };

        // Subscribing turns the connection into a one-way event stream.
        if request.method == "subscribe_events" {
            let filter: EventFilter = match commands::parse(&request.params) {
                Ok(filter) => filter,
                Err(err) => {
                    write_line(&mut writer, &RpcResponse::error(request.id, err)).await?;
                    continue;
                }
            };
            let mut events = state.event_bus.subscribe();
            let ack = serde_json::json!({ "subscribed": true });
            write_line(&mut writer, &RpcResponse::success(request.id, ack)).await?;
            loop {
                match events.recv().await {
                    Ok(event) if filter.matches(&event) => {
                        let notification = serde_json::json!({
                            "jsonrpc": "2.0",
                            "method": "event",
                            "params": event,
                        });
                        write_line(&mut writer, &notification).await?;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event subscriber lagging");
                    }
                    Err(RecvError::Closed) => return Ok(()),
                }
            }
        }

        let response = dispatch_request(state.clone(), request).await;
        write_line(&mut writer, &response).await?;
    }

    Ok(())
}

async fn write_line<W, T>(writer: &mut W, value: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut json = serde_json::to_string(value)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return RpcResponse::error(id, RpcError::invalid_request());
    }
    let method = request.method.as_str();
    let params = &request.params;

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Economy commands
        "get_balance" => commands::economy::get_balance(&state, params).await,
        "list_wallets" => commands::economy::list_wallets(&state, params).await,
        "get_transaction_history" => {
            commands::economy::get_transaction_history(&state, params).await
        }
        "get_quota" => commands::economy::get_quota(&state, params).await,
        "cast_vote" => commands::economy::cast_vote(&state, params).await,
        "invest" => commands::economy::invest(&state, params).await,
        "withdraw" => commands::economy::withdraw(&state, params).await,
        "credit_emission" => commands::economy::credit_emission(&state, params).await,
        "audit_ledger" => commands::economy::audit_ledger(&state).await,

        // Publication commands
        "create_publication" => {
            commands::publications::create_publication(&state, params).await
        }
        "get_publication" => commands::publications::get_publication(&state, params).await,
        "list_publications" => commands::publications::list_publications(&state, params).await,
        "list_votes" => commands::publications::list_votes(&state, params).await,
        "close_publication" => commands::publications::close_publication(&state, params).await,
        "evaluate_permission" => {
            commands::publications::evaluate_permission(&state, params).await
        }

        // Tappalka commands
        "tappalka_get_eligible_posts" => {
            commands::tappalka::get_eligible_posts(&state, params).await
        }
        "tappalka_get_pair" => commands::tappalka::get_pair(&state, params).await,
        "tappalka_submit_choice" => commands::tappalka::submit_choice(&state, params).await,
        "tappalka_get_progress" => commands::tappalka::get_progress(&state, params).await,
        "tappalka_mark_onboarding_seen" => {
            commands::tappalka::mark_onboarding_seen(&state, params).await
        }

        // Diagnostics commands
        "get_daemon_info" => commands::diagnostics::get_daemon_info(&state).await,
        "list_communities" => commands::diagnostics::list_communities(&state).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
