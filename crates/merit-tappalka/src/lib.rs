//! # merit-tappalka
//!
//! Pairwise comparison game.
//!
//! Players are shown two eligible posts and pick one. Each showing costs
//! both posts `show_cost` of rating, the winner gains `win_reward`, and
//! every `comparisons_required` choices the player earns `user_reward` in
//! the community's local currency.
//!
//! ## Modules
//!
//! - [`eligibility`] — Which posts may be shown to whom
//! - [`session`] — `get_pair` and `submit_choice`
//! - [`progress`] — Per-player counters and the onboarding latch

pub mod eligibility;
pub mod progress;
pub mod session;

use merit_ledger::LedgerError;
use merit_types::permission::DenialReason;
use merit_types::ErrorClass;

/// Error types for tappalka operations.
#[derive(Debug, thiserror::Error)]
pub enum TappalkaError {
    /// Tappalka disabled or the player's role may not play.
    #[error("{0}")]
    Denied(DenialReason),

    /// Rating or wallet movement failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Storage failure.
    #[error("storage error: {0}")]
    Db(#[from] merit_db::DbError),

    /// Unknown session, or a session issued to another player.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The session already has a recorded choice.
    #[error("session {0} already resolved")]
    SessionResolved(String),

    /// Winner and loser are not exactly the session's pair.
    #[error("choice does not match the pair of session {0}")]
    PairMismatch(String),

    /// A post of the pair was deleted or dropped below eligibility.
    #[error("posts of session {0} are no longer available")]
    PostsNoLongerAvailable(String),
}

impl TappalkaError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TappalkaError::Denied(_) => ErrorClass::Denied,
            TappalkaError::Ledger(err) => err.class(),
            TappalkaError::Db(merit_db::DbError::NotFound(_)) => ErrorClass::NotFound,
            TappalkaError::Db(_) => ErrorClass::Storage,
            TappalkaError::SessionNotFound(_) => ErrorClass::NotFound,
            TappalkaError::SessionResolved(_) => ErrorClass::InvalidInput,
            TappalkaError::PairMismatch(_) => ErrorClass::InvalidInput,
            TappalkaError::PostsNoLongerAvailable(_) => ErrorClass::NotFound,
        }
    }
}

impl From<rusqlite::Error> for TappalkaError {
    fn from(err: rusqlite::Error) -> Self {
        TappalkaError::Db(merit_db::DbError::Sqlite(err))
    }
}

pub type Result<T> = std::result::Result<T, TappalkaError>;

pub(crate) fn log_unexpected<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        if !err.class().is_expected() {
            tracing::error!(operation, error = %err, "tappalka operation aborted");
        }
    }
    result
}
