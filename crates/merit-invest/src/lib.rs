//! # merit-invest
//!
//! Publication investment pools.
//!
//! Investors fund a publication's pool from their wallet. When the
//! effective beneficiary withdraws rating, `investor_share_percent` of the
//! withdrawal is split among investors pro-rata by contribution and the rest
//! goes to the beneficiary. Closing a publication refunds the uninvested
//! pool and pays out the remaining rating before the soft-delete.
//!
//! ## Modules
//!
//! - [`distribution`] — Pure split computations
//! - [`pool`] — `invest`
//! - [`payout`] — `withdraw` and `close`

pub mod distribution;
pub mod payout;
pub mod pool;

use merit_ledger::LedgerError;
use merit_types::permission::DenialReason;
use merit_types::ErrorClass;

/// Error types for investment operations.
#[derive(Debug, thiserror::Error)]
pub enum InvestError {
    /// Permission or structural rule refused the action.
    #[error("{0}")]
    Denied(DenialReason),

    /// Funding or ledger failure.
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

    /// Investment records disagree with the publication's totals.
    #[error("investment invariant violated on {publication_id}: {detail}")]
    InvariantViolation {
        publication_id: String,
        detail: String,
    },
}

impl InvestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            InvestError::Denied(_) => ErrorClass::Denied,
            InvestError::Ledger(err) => err.class(),
            InvestError::Db(merit_db::DbError::NotFound(_)) => ErrorClass::NotFound,
            InvestError::Db(_) => ErrorClass::Storage,
            InvestError::PublicationDeleted(_) => ErrorClass::NotFound,
            InvestError::InvalidRequest(_) => ErrorClass::InvalidInput,
            InvestError::InvariantViolation { .. } => ErrorClass::InvariantViolation,
        }
    }
}

impl From<rusqlite::Error> for InvestError {
    fn from(err: rusqlite::Error) -> Self {
        InvestError::Db(merit_db::DbError::Sqlite(err))
    }
}

pub type Result<T> = std::result::Result<T, InvestError>;

pub(crate) fn log_unexpected<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        if !err.class().is_expected() {
            tracing::error!(operation, error = %err, "investment operation aborted");
        }
    }
    result
}
