//! Event emission system.
//!
//! Committed merit movements are broadcast to in-process subscribers
//! (notification fan-out lives outside the daemon). Each subscriber has an
//! independent buffer; a slow subscriber lags and skips, it never blocks
//! the engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An event emitted by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type name (e.g. "VoteCast", "DaemonStarted").
    pub event_type: String,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Type-specific payload.
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(event_type: EventType, timestamp: u64, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.as_str().to_string(),
            timestamp,
            payload,
        }
    }
}

/// Event types emitted after a committed engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    DaemonStarted,
    VoteCast,
    PublicationCreated,
    PublicationClosed,
    InvestmentMade,
    FundsWithdrawn,
    MeritsEmitted,
    TappalkaRewardEarned,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::DaemonStarted => "DaemonStarted",
            EventType::VoteCast => "VoteCast",
            EventType::PublicationCreated => "PublicationCreated",
            EventType::PublicationClosed => "PublicationClosed",
            EventType::InvestmentMade => "InvestmentMade",
            EventType::FundsWithdrawn => "FundsWithdrawn",
            EventType::MeritsEmitted => "MeritsEmitted",
            EventType::TappalkaRewardEarned => "TappalkaRewardEarned",
        }
    }
}

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Category filter: "publication", "economy", "tappalka", "system".
    pub categories: Option<Vec<String>>,
    /// Filter to specific community ids.
    pub community_ids: Option<Vec<String>>,
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Get the current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref categories) = self.categories {
            let event_category = categorize_event(&event.event_type);
            if !categories.iter().any(|c| c == event_category) {
                return false;
            }
        }

        // Events without a community_id (system events) pass the community filter.
        if let Some(ref community_ids) = self.community_ids {
            if let Some(cid) = event.payload.get("community_id").and_then(|v| v.as_str()) {
                if !community_ids.iter().any(|id| id == cid) {
                    return false;
                }
            }
        }

        true
    }
}

/// Categorize an event type into a category.
fn categorize_event(event_type: &str) -> &'static str {
    match event_type {
        s if s.starts_with("Publication") => "publication",
        s if s.starts_with("Vote")
            || s.starts_with("Investment")
            || s.starts_with("Funds")
            || s.starts_with("Merits") =>
        {
            "economy"
        }
        s if s.starts_with("Tappalka") => "tappalka",
        _ => "system",
    }
}
