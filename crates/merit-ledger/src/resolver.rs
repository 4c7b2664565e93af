//! MeritResolver: funding plans.
//!
//! Resolution is the read-only first phase of every funded action. It
//! decides which wallet pays and how much of the free allowance is used;
//! the acting crate then applies the plan through [`crate::quota::consume`]
//! and [`crate::wallet::commit`] inside one transaction.
//!
//! Routing:
//! - votes, post fees and investments use the community's
//!   [`CurrencyRouting`](merit_types::community::CurrencyRouting);
//! - post fees in priority communities always use the global wallet;
//! - withdrawals always credit the recipient's global wallet;
//! - tappalka rewards always credit the player's community wallet.

use merit_types::community::{CommunitySettings, WalletRoute};
use merit_types::identity::Role;
use merit_types::{Amount, CommunityId, GLOBAL_COMMUNITY_ID};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::posting::Account;
use crate::{quota, wallet, LedgerError, Result};

/// How an action is paid for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingPlan {
    /// Drawn from the free daily allowance of the action's community.
    pub quota_amount: Amount,
    /// Drawn from `wallet_community_id`.
    pub wallet_amount: Amount,
    pub wallet_community_id: CommunityId,
}

impl FundingPlan {
    pub fn total(&self) -> Result<Amount> {
        self.quota_amount
            .checked_add(self.wallet_amount)
            .ok_or(LedgerError::Overflow("funding plan total"))
    }
}

/// Structural self-dealing check for funded actions.
pub fn ensure_distinct_parties(actor_id: &str, recipient_id: &str) -> Result<()> {
    if actor_id == recipient_id {
        tracing::warn!(user = actor_id, "self-transfer rejected");
        return Err(LedgerError::SelfTransfer(actor_id.to_string()));
    }
    Ok(())
}

/// Plan a vote of `requested_quota + requested_wallet`.
///
/// Quota beyond what remains is drawn from the wallet instead of failing.
/// Fails only if the wallet cannot cover its share.
#[allow(clippy::too_many_arguments)]
pub fn resolve_vote_funding(
    conn: &Connection,
    settings: &CommunitySettings,
    user_id: &str,
    role: Role,
    requested_quota: Amount,
    requested_wallet: Amount,
    now: u64,
) -> Result<FundingPlan> {
    let total = requested_quota
        .checked_add(requested_wallet)
        .ok_or_else(|| LedgerError::InvalidAmount("vote amount overflows".to_string()))?;
    if total.is_zero() {
        return Err(LedgerError::InvalidAmount(
            "vote amount must be positive".to_string(),
        ));
    }

    let available_quota = quota::remaining(conn, settings, user_id, role, now)?;
    let route = settings.routing().vote;
    let plan = split_funding(settings, total, requested_quota.min(available_quota), route)?;
    ensure_wallet_covers(conn, user_id, &plan)?;

    tracing::debug!(
        user = user_id,
        community = %settings.id,
        quota = %plan.quota_amount,
        wallet = %plan.wallet_amount,
        wallet_community = %plan.wallet_community_id,
        "vote funding resolved"
    );
    Ok(plan)
}

/// Plan the fee for a new publication.
///
/// With `can_pay_post_from_quota` the remaining allowance is used first.
pub fn resolve_post_fee(
    conn: &Connection,
    settings: &CommunitySettings,
    user_id: &str,
    role: Role,
    now: u64,
) -> Result<FundingPlan> {
    let cost = settings.posts.post_cost;
    let quota_part = if settings.posts.can_pay_post_from_quota {
        cost.min(quota::remaining(conn, settings, user_id, role, now)?)
    } else {
        Amount::ZERO
    };
    let route = if settings.is_priority() {
        WalletRoute::Global
    } else {
        settings.routing().post_fee
    };
    let plan = split_funding(settings, cost, quota_part, route)?;
    ensure_wallet_covers(conn, user_id, &plan)?;
    Ok(plan)
}

/// Wallet community that funds an investment.
pub fn resolve_investment_source(
    conn: &Connection,
    settings: &CommunitySettings,
    user_id: &str,
    amount: Amount,
) -> Result<CommunityId> {
    if amount.is_zero() {
        return Err(LedgerError::InvalidAmount(
            "investment amount must be positive".to_string(),
        ));
    }
    let plan = FundingPlan {
        quota_amount: Amount::ZERO,
        wallet_amount: amount,
        wallet_community_id: settings.wallet_community(settings.routing().invest),
    };
    ensure_wallet_covers(conn, user_id, &plan)?;
    Ok(plan.wallet_community_id)
}

/// Account credited by a withdrawal: always the recipient's global wallet.
pub fn withdrawal_account(recipient_id: &str) -> Account {
    Account::wallet(recipient_id, GLOBAL_COMMUNITY_ID)
}

/// Account credited by a tappalka milestone: always the community wallet.
pub fn tappalka_reward_account(user_id: &str, settings: &CommunitySettings) -> Account {
    Account::wallet(user_id, &settings.id)
}

fn split_funding(
    settings: &CommunitySettings,
    total: Amount,
    quota_amount: Amount,
    route: WalletRoute,
) -> Result<FundingPlan> {
    let wallet_amount = total
        .checked_sub(quota_amount)
        .ok_or(LedgerError::Overflow("quota share exceeds total"))?;
    Ok(FundingPlan {
        quota_amount,
        wallet_amount,
        wallet_community_id: settings.wallet_community(route),
    })
}

fn ensure_wallet_covers(conn: &Connection, user_id: &str, plan: &FundingPlan) -> Result<()> {
    if plan.wallet_amount.is_zero() {
        return Ok(());
    }
    let available = wallet::get_balance(conn, user_id, &plan.wallet_community_id)?;
    if available < plan.wallet_amount {
        return Err(LedgerError::InsufficientFunds {
            user_id: user_id.to_string(),
            community_id: plan.wallet_community_id.clone(),
            needed: plan.wallet_amount,
            available,
        });
    }
    Ok(())
}
