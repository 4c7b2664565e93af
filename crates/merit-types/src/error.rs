//! Error classification shared by every engine crate.
//!
//! Each crate keeps its own error enum; `class()` on those enums maps them
//! onto this taxonomy so the request layer can translate outcomes without
//! matching on crate-specific variants.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Permission or structural rule refused the action.
    Denied,
    /// A wallet cannot cover the requested debit.
    InsufficientFunds,
    /// The free daily allowance cannot cover the requested consumption.
    InsufficientQuota,
    /// Publication, session or record missing or no longer eligible.
    NotFound,
    /// Malformed request (zero amount, bad percentage, ...).
    InvalidInput,
    /// Internal computation broke a ledger invariant. Indicates a bug.
    InvariantViolation,
    /// Storage layer failure.
    Storage,
}

impl ErrorClass {
    /// Expected business outcomes are returned to the caller and are not
    /// logged as errors.
    pub fn is_expected(self) -> bool {
        !matches!(self, ErrorClass::InvariantViolation | ErrorClass::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_classes() {
        assert!(ErrorClass::Denied.is_expected());
        assert!(ErrorClass::InsufficientFunds.is_expected());
        assert!(ErrorClass::NotFound.is_expected());
        assert!(!ErrorClass::InvariantViolation.is_expected());
        assert!(!ErrorClass::Storage.is_expected());
    }
}
