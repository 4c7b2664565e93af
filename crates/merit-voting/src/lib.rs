//! # merit-voting
//!
//! Merit-funded publication actions.
//!
//! ## Modules
//!
//! - [`vote`] — VoteProcessor: permission, funding, quota, ledger and rating in one transaction
//! - [`publishing`] — Publication creation with the post fee

pub mod publishing;
pub mod vote;

use merit_ledger::LedgerError;
use merit_types::permission::DenialReason;
use merit_types::ErrorClass;

/// Error types for voting and publishing.
#[derive(Debug, thiserror::Error)]
pub enum VotingError {
    /// The permission engine refused the action.
    #[error("{0}")]
    Denied(DenialReason),

    /// Funding, quota or ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Storage failure.
    #[error("storage error: {0}")]
    Db(#[from] merit_db::DbError),

    /// The publication is soft-deleted.
    #[error("publication {0} has been deleted")]
    PublicationDeleted(String),

    /// Malformed request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl VotingError {
    pub fn class(&self) -> ErrorClass {
        match self {
            VotingError::Denied(_) => ErrorClass::Denied,
            VotingError::Ledger(err) => err.class(),
            VotingError::Db(merit_db::DbError::NotFound(_)) => ErrorClass::NotFound,
            VotingError::Db(_) => ErrorClass::Storage,
            VotingError::PublicationDeleted(_) => ErrorClass::NotFound,
            VotingError::InvalidRequest(_) => ErrorClass::InvalidInput,
        }
    }
}

impl From<rusqlite::Error> for VotingError {
    fn from(err: rusqlite::Error) -> Self {
        VotingError::Db(merit_db::DbError::Sqlite(err))
    }
}

pub type Result<T> = std::result::Result<T, VotingError>;

/// Log failures that indicate a bug or a broken store. Business outcomes
/// are left to the caller.
pub(crate) fn log_unexpected<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        if !err.class().is_expected() {
            tracing::error!(operation, error = %err, "merit operation aborted");
        }
    }
    result
}
