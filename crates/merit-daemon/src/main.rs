//! merit-daemon: request-handling host for the merit economy engine.
//!
//! Single OS process running a Tokio async runtime. Clients call the engine
//! via JSON-RPC over a Unix socket; the daemon resolves community settings
//! from its configuration, runs each call as one engine transaction and
//! broadcasts committed movements on the event bus.

mod commands;
mod config;
mod events;
mod rpc;

use std::collections::HashMap;
use std::sync::Arc;

use merit_types::community::CommunitySettings;
use merit_types::CommunityId;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::config::DaemonConfig;
use crate::events::{EventBus, EventType};
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Database connection. Engine calls hold the lock for one transaction.
    pub db: Arc<tokio::sync::Mutex<rusqlite::Connection>>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Community settings by id, read-only after startup.
    pub communities: HashMap<CommunityId, CommunitySettings>,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl DaemonState {
    pub fn new(conn: rusqlite::Connection, config: DaemonConfig) -> Self {
        let communities = config
            .communities
            .iter()
            .map(|c| (c.id.clone(), c.clone()))
            .collect();
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Self {
            db: Arc::new(tokio::sync::Mutex::new(conn)),
            event_bus: EventBus::new(config.rpc.event_capacity),
            communities,
            config,
            shutdown_tx,
        }
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // 2. Initialize tracing; RUST_LOG wins over the configured level
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!(
            "merit={}",
            config.logging.log_level
        ))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(communities = config.communities.len(), "Merit daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 3. Open database
    let conn = merit_db::open(&data_dir.join("merit.db"))?;

    // 4. Build daemon state
    let socket_path = data_dir.join(&config.rpc.socket_name);
    let state = Arc::new(DaemonState::new(conn, config));
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    state.event_bus.emit(events::Event::new(
        EventType::DaemonStarted,
        unix_now(),
        serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }),
    ));

    // 5. Run the RPC server until shutdown
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use merit_types::community::CommunityType;

    /// State over an in-memory database with a local and a priority community.
    pub(crate) fn test_state() -> Arc<DaemonState> {
        let mut local = CommunitySettings::new("c1", CommunityType::Custom);
        local.tappalka.enabled = true;
        let config = DaemonConfig {
            communities: vec![
                local,
                CommunitySettings::new("mog", CommunityType::MarathonOfGood),
            ],
            ..DaemonConfig::default()
        };
        let conn = merit_db::open_memory().expect("open");
        Arc::new(DaemonState::new(conn, config))
    }

    #[test]
    fn test_state_indexes_communities() {
        let state = test_state();
        assert_eq!(state.communities.len(), 2);
        assert!(state.communities["mog"].is_priority());
    }
}
