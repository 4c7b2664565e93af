//! # merit-types
//!
//! Shared domain types for the merit economy engine: identifiers, the
//! fixed-point [`Amount`](amount::Amount), roles, community configuration,
//! permission rule data, and the publication / tappalka records that the
//! storage layer and the engine crates exchange.

pub mod amount;
pub mod community;
pub mod error;
pub mod identity;
pub mod permission;
pub mod publication;
pub mod tappalka;

pub use amount::Amount;
pub use error::ErrorClass;

/// Common type aliases.
pub type UserId = String;
pub type CommunityId = String;
pub type PublicationId = String;
pub type SessionId = String;

/// Community id of the per-user global wallet.
pub const GLOBAL_COMMUNITY_ID: &str = "global";

/// Micro-merits per merit (1 merit = 1,000,000 micro-merits).
pub const MICRO_MERITS_PER_MERIT: u64 = 1_000_000;

/// Length of a quota period in seconds (24 hours).
pub const QUOTA_PERIOD_SECS: u64 = 86_400;

/// Returns `true` if `community_id` names the global wallet.
pub fn is_global(community_id: &str) -> bool {
    community_id == GLOBAL_COMMUNITY_ID
}
