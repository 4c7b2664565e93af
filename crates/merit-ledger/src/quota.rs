//! QuotaTracker: the free daily allowance.
//!
//! Remaining quota is never stored. It is derived on every read from the
//! append-only usage rows that fall inside the current period, so a new
//! period needs no reset job.

use merit_db::queries::quota as usage;
use merit_types::community::{CommunitySettings, QuotaReset};
use merit_types::identity::Role;
use merit_types::{Amount, QUOTA_PERIOD_SECS};
use rusqlite::{Connection, Transaction};

use crate::{LedgerError, Result};

/// What the allowance was spent on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsageType {
    Vote,
    Publication,
}

impl UsageType {
    pub fn as_str(self) -> &'static str {
        match self {
            UsageType::Vote => "vote",
            UsageType::Publication => "publication",
        }
    }
}

/// Result of a successful consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Consumed {
    pub amount: Amount,
    pub remaining: Amount,
}

/// First second that belongs to the current period.
///
/// Calendar periods start at 00:00 UTC; rolling periods are the 24 hours
/// ending at `now`.
pub fn period_start(reset: QuotaReset, now: u64) -> u64 {
    match reset {
        QuotaReset::Calendar => now - now % QUOTA_PERIOD_SECS,
        QuotaReset::Rolling => (now + 1).saturating_sub(QUOTA_PERIOD_SECS),
    }
}

/// Quota still available to `user_id` in the current period.
pub fn remaining(
    conn: &Connection,
    settings: &CommunitySettings,
    user_id: &str,
    role: Role,
    now: u64,
) -> Result<Amount> {
    let daily = settings.daily_quota_for(role);
    if daily.is_zero() {
        return Ok(Amount::ZERO);
    }
    let since = period_start(settings.quota.reset, now);
    let used = usage::used_since(conn, user_id, &settings.id, since)?;
    Ok(daily.saturating_sub(used))
}

/// Spend `amount` of the allowance, all or nothing.
///
/// The usage row is written first and the period total checked after, so
/// two concurrent consumers cannot both pass a stale check. On
/// [`LedgerError::InsufficientQuota`] the caller's transaction must be
/// dropped, which also removes the row.
#[allow(clippy::too_many_arguments)]
pub fn consume(
    tx: &Transaction<'_>,
    settings: &CommunitySettings,
    user_id: &str,
    role: Role,
    amount: Amount,
    usage_type: UsageType,
    reference_id: &str,
    now: u64,
) -> Result<Consumed> {
    if amount.is_zero() {
        return Ok(Consumed {
            amount,
            remaining: remaining(tx, settings, user_id, role, now)?,
        });
    }

    let daily = settings.daily_quota_for(role);
    usage::insert_usage(
        tx,
        user_id,
        &settings.id,
        amount,
        usage_type.as_str(),
        reference_id,
        now,
    )?;

    let since = period_start(settings.quota.reset, now);
    let used = usage::used_since(tx, user_id, &settings.id, since)?;
    if used > daily {
        let before = used.saturating_sub(amount);
        return Err(LedgerError::InsufficientQuota {
            requested: amount,
            remaining: daily.saturating_sub(before),
        });
    }

    tracing::debug!(
        user = user_id,
        community = %settings.id,
        amount = %amount,
        usage = usage_type.as_str(),
        reference = reference_id,
        "quota consumed"
    );
    Ok(Consumed {
        amount,
        remaining: daily.saturating_sub(used),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use merit_types::community::CommunityType;

    const DAY: u64 = QUOTA_PERIOD_SECS;

    fn settings(reset: QuotaReset) -> CommunitySettings {
        let mut s = CommunitySettings::new("c1", CommunityType::Custom);
        s.quota.daily_quota = Amount::from_merits(10);
        s.quota.reset = reset;
        s
    }

    fn spend(conn: &mut Connection, s: &CommunitySettings, merits: u64, now: u64) -> Result<Consumed> {
        let tx = conn.transaction().expect("begin");
        let consumed = consume(
            &tx,
            s,
            "u1",
            Role::Participant,
            Amount::from_merits(merits),
            UsageType::Vote,
            "p1",
            now,
        )?;
        tx.commit().expect("commit");
        Ok(consumed)
    }

    #[test]
    fn test_period_start() {
        assert_eq!(period_start(QuotaReset::Calendar, DAY * 3 + 500), DAY * 3);
        assert_eq!(period_start(QuotaReset::Rolling, DAY * 3 + 500), DAY * 2 + 501);
        assert_eq!(period_start(QuotaReset::Rolling, 10), 0);
    }

    #[test]
    fn test_consume_and_remaining() {
        let mut conn = merit_db::open_memory().expect("open");
        let s = settings(QuotaReset::Calendar);
        let now = DAY * 10 + 100;

        let consumed = spend(&mut conn, &s, 4, now).expect("consume");
        assert_eq!(consumed.remaining, Amount::from_merits(6));
        assert_eq!(
            remaining(&conn, &s, "u1", Role::Participant, now).expect("remaining"),
            Amount::from_merits(6)
        );
    }

    #[test]
    fn test_overspend_rejected_without_record() {
        let mut conn = merit_db::open_memory().expect("open");
        let s = settings(QuotaReset::Calendar);
        let now = DAY * 10;
        spend(&mut conn, &s, 8, now).expect("consume");

        let err = spend(&mut conn, &s, 3, now + 1).expect_err("over quota");
        assert!(matches!(
            err,
            LedgerError::InsufficientQuota { remaining, .. } if remaining == Amount::from_merits(2)
        ));
        assert_eq!(
            remaining(&conn, &s, "u1", Role::Participant, now + 1).expect("remaining"),
            Amount::from_merits(2)
        );
    }

    #[test]
    fn test_calendar_reset() {
        let mut conn = merit_db::open_memory().expect("open");
        let s = settings(QuotaReset::Calendar);
        spend(&mut conn, &s, 10, DAY * 10 + DAY - 1).expect("consume");
        assert_eq!(
            remaining(&conn, &s, "u1", Role::Participant, DAY * 11).expect("remaining"),
            Amount::from_merits(10)
        );
    }

    #[test]
    fn test_rolling_reset() {
        let mut conn = merit_db::open_memory().expect("open");
        let s = settings(QuotaReset::Rolling);
        let t = DAY * 10 + 5_000;
        spend(&mut conn, &s, 10, t).expect("consume");
        // Next calendar day, but still within 24h.
        assert_eq!(
            remaining(&conn, &s, "u1", Role::Participant, DAY * 11 + 10).expect("remaining"),
            Amount::ZERO
        );
        assert_eq!(
            remaining(&conn, &s, "u1", Role::Participant, t + DAY).expect("remaining"),
            Amount::from_merits(10)
        );
    }

    #[test]
    fn test_zero_consumption_leaves_no_record() {
        let mut conn = merit_db::open_memory().expect("open");
        let s = settings(QuotaReset::Calendar);
        spend(&mut conn, &s, 0, DAY).expect("consume zero");
        assert!(usage::list_since(&conn, "u1", "c1", 0).expect("list").is_empty());
    }

    #[test]
    fn test_non_recipient_has_no_quota() {
        let mut conn = merit_db::open_memory().expect("open");
        let s = settings(QuotaReset::Calendar);
        assert_eq!(
            remaining(&conn, &s, "u1", Role::Viewer, DAY).expect("remaining"),
            Amount::ZERO
        );
        let tx = conn.transaction().expect("begin");
        let err = consume(
            &tx,
            &s,
            "u1",
            Role::Viewer,
            Amount::from_merits(1),
            UsageType::Vote,
            "p1",
            DAY,
        )
        .expect_err("viewer has no quota");
        assert_eq!(err.class(), merit_types::ErrorClass::InsufficientQuota);
    }
}
