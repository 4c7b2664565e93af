//! # merit-ledger
//!
//! Balances, daily quota and funding decisions.
//!
//! ## Modules
//!
//! - [`posting`] — Accounts and balanced postings
//! - [`wallet`] — WalletLedger: balances, atomic delta groups, emission, history
//! - [`quota`] — QuotaTracker: derived daily allowance, increment-then-check consumption
//! - [`resolver`] — MeritResolver: which wallet and how much quota funds an action
//!
//! Every mutating function takes a `rusqlite::Transaction`, so a delta group
//! either commits together with the caller's other writes or not at all.

pub mod posting;
pub mod quota;
pub mod resolver;
pub mod wallet;

use merit_types::{Amount, ErrorClass};

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Storage failure.
    #[error("storage error: {0}")]
    Db(#[from] merit_db::DbError),

    /// A wallet cannot cover a debit.
    #[error("insufficient funds in {user_id}@{community_id}: need {needed}, have {available}")]
    InsufficientFunds {
        user_id: String,
        community_id: String,
        needed: Amount,
        available: Amount,
    },

    /// A publication rating cannot cover a deduction.
    #[error("insufficient rating on publication {publication_id}: need {needed}, have {available}")]
    InsufficientRating {
        publication_id: String,
        needed: Amount,
        available: Amount,
    },

    /// The daily allowance cannot cover a consumption.
    #[error("insufficient quota: requested {requested}, remaining {remaining}")]
    InsufficientQuota { requested: Amount, remaining: Amount },

    /// Funds moved from a user to themselves.
    #[error("self-transfer by {0} is not allowed")]
    SelfTransfer(String),

    /// Caller supplied an amount the operation cannot take.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Debits and credits of a posting differ.
    #[error("unbalanced posting {kind}/{reference_id}: debits {debits}, credits {credits}")]
    Unbalanced {
        kind: &'static str,
        reference_id: String,
        debits: Amount,
        credits: Amount,
    },

    /// An investment pool was asked to pay out more than it holds.
    #[error("investment pool of {0} exhausted")]
    PoolExhausted(String),

    /// Arithmetic overflow inside an engine computation.
    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),
}

impl LedgerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::Db(merit_db::DbError::NotFound(_)) => ErrorClass::NotFound,
            LedgerError::Db(_) => ErrorClass::Storage,
            LedgerError::InsufficientFunds { .. } | LedgerError::InsufficientRating { .. } => {
                ErrorClass::InsufficientFunds
            }
            LedgerError::InsufficientQuota { .. } => ErrorClass::InsufficientQuota,
            LedgerError::SelfTransfer(_) => ErrorClass::Denied,
            LedgerError::InvalidAmount(_) => ErrorClass::InvalidInput,
            LedgerError::Unbalanced { .. }
            | LedgerError::PoolExhausted(_)
            | LedgerError::Overflow(_) => ErrorClass::InvariantViolation,
        }
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Db(merit_db::DbError::Sqlite(err))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let funds = LedgerError::InsufficientFunds {
            user_id: "u1".to_string(),
            community_id: "c1".to_string(),
            needed: Amount::from_merits(2),
            available: Amount::from_merits(1),
        };
        assert_eq!(funds.class(), ErrorClass::InsufficientFunds);
        assert_eq!(
            LedgerError::SelfTransfer("u1".to_string()).class(),
            ErrorClass::Denied
        );
        assert_eq!(
            LedgerError::Overflow("vote total").class(),
            ErrorClass::InvariantViolation
        );
        assert_eq!(
            LedgerError::Db(merit_db::DbError::NotFound("p1".to_string())).class(),
            ErrorClass::NotFound
        );
    }
}
