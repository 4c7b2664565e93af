//! Fixed-point merit amounts.
//!
//! Merits may be fractional (tappalka show-costs are typically 0.1), so
//! amounts are stored as whole micro-merits. All arithmetic is checked;
//! callers decide whether an overflow is an input error or an invariant
//! violation.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::MICRO_MERITS_PER_MERIT;

/// A non-negative merit amount in micro-merits.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    ts_rs::TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Construct from micro-merits.
    pub const fn from_micro(micro: u64) -> Self {
        Self(micro)
    }

    /// Construct from whole merits.
    pub const fn from_merits(merits: u64) -> Self {
        Self(merits * MICRO_MERITS_PER_MERIT)
    }

    /// Construct from a fractional merit value, rounding to the nearest
    /// micro-merit. Returns `None` for negative, non-finite or out-of-range input.
    pub fn from_merits_f64(merits: f64) -> Option<Self> {
        if !merits.is_finite() || merits < 0.0 {
            return None;
        }
        let micro = (merits * MICRO_MERITS_PER_MERIT as f64).round();
        if micro > u64::MAX as f64 {
            return None;
        }
        Some(Self(micro as u64))
    }

    /// Raw micro-merit value.
    pub const fn micro(self) -> u64 {
        self.0
    }

    /// Value in merits, for display only.
    pub fn as_merits_f64(self) -> f64 {
        self.0 as f64 / MICRO_MERITS_PER_MERIT as f64
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }

    /// `self * numerator / denominator`, truncating toward zero.
    ///
    /// Uses a 128-bit intermediate. Returns `None` if `denominator` is zero
    /// or the result does not fit in a `u64`.
    pub fn mul_ratio(self, numerator: u64, denominator: u64) -> Option<Amount> {
        if denominator == 0 {
            return None;
        }
        let value = u128::from(self.0) * u128::from(numerator) / u128::from(denominator);
        u64::try_from(value).ok().map(Amount)
    }

    /// Sum an iterator of amounts, returning `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(iter: I) -> Option<Amount> {
        iter.into_iter()
            .try_fold(Amount::ZERO, |acc, next| acc.checked_add(next))
    }

    /// Signed micro-merit value for storage columns and ledger deltas.
    pub fn to_i64(self) -> Option<i64> {
        i64::try_from(self.0).ok()
    }

    /// Parse a stored signed value back into an amount.
    pub fn from_i64(value: i64) -> Option<Amount> {
        u64::try_from(value).ok().map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MICRO_MERITS_PER_MERIT;
        let frac = self.0 % MICRO_MERITS_PER_MERIT;
        if frac == 0 {
            write!(f, "{whole}")
        } else {
            let digits = format!("{frac:06}");
            write!(f, "{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

/// Serde adapter for configuration files, where amounts are written in
/// (possibly fractional) merits rather than micro-merits.
///
/// ```toml
/// show_cost = 0.1
/// daily_quota = 10
/// ```
pub mod merits_f64 {
    use super::*;

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(amount.as_merits_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let merits = f64::deserialize(deserializer)?;
        Amount::from_merits_f64(merits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid merit amount: {merits}")))
    }
}
