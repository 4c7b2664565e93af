//! # merit-permissions
//!
//! Role/condition based permission evaluation for community actions.
//!
//! Evaluation is a pure function over an immutable rule table: no I/O, no
//! clock, no ambient state. Everything resource-specific arrives in a
//! caller-computed [`PermissionContext`](merit_types::permission::PermissionContext).
//!
//! ## Modules
//!
//! - [`rules`] — Rule matching and specificity precedence
//! - [`edit`] — Time-boxed edit/delete of publications
//! - [`engine`] — Per-community entry point combining both

pub mod edit;
pub mod engine;
pub mod rules;

pub use engine::PermissionEngine;

/// Error types for rule table validation.
///
/// Evaluation itself never fails: a missing rule is a denial, not an error.
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    /// A rule requires a condition and its negation.
    #[error("rule for {role}/{action} can never apply: {detail}")]
    ContradictoryConditions {
        role: &'static str,
        action: &'static str,
        detail: String,
    },

    /// Two rules with the same conditions disagree on the outcome.
    #[error("conflicting rules for {role}/{action} with identical conditions")]
    ConflictingRules {
        role: &'static str,
        action: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, PermissionError>;
