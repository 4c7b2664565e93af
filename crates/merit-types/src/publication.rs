//! Publication, investment and vote records.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::{CommunityId, PublicationId, UserId};

/// A publication with its rating and investment state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct Publication {
    pub id: PublicationId,
    pub community_id: CommunityId,
    pub author_id: UserId,
    /// Receives withdrawals instead of the author when set.
    pub beneficiary_id: Option<UserId>,
    pub categories: Vec<String>,
    /// Net rating.
    pub score: Amount,
    pub investing_enabled: bool,
    /// Current pool balance not yet paid out.
    pub investment_pool: Amount,
    /// Historical total invested. Equals the sum of `investments`.
    pub investment_pool_total: Amount,
    /// Share of every withdrawal that goes to investors (0-100).
    pub investor_share_percent: u8,
    /// One aggregated record per investor.
    pub investments: Vec<Investment>,
    pub created_at: u64,
    pub deleted_at: Option<u64>,
}

impl Publication {
    /// User credited on withdrawal.
    pub fn effective_beneficiary(&self) -> &str {
        self.beneficiary_id.as_deref().unwrap_or(&self.author_id)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether `categories` admits this publication. Empty = all.
    pub fn in_any_category(&self, categories: &[String]) -> bool {
        categories.is_empty() || self.categories.iter().any(|c| categories.contains(c))
    }
}

/// An investor's aggregated stake in a publication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct Investment {
    pub investor_id: UserId,
    pub amount: Amount,
    /// `amount / investment_pool_total * 100`, for display.
    pub share_percent: f64,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Input for creating a publication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationDraft {
    pub id: PublicationId,
    pub community_id: CommunityId,
    pub author_id: UserId,
    #[serde(default)]
    pub beneficiary_id: Option<UserId>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub investing_enabled: bool,
    #[serde(default)]
    pub investor_share_percent: u8,
}

/// A recorded upvote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub publication_id: PublicationId,
    pub voter_id: UserId,
    pub community_id: CommunityId,
    pub quota_amount: Amount,
    pub wallet_amount: Amount,
    /// Wallet the wallet portion was drawn from.
    pub wallet_community_id: Option<CommunityId>,
    pub created_at: u64,
}

impl Vote {
    pub fn total(&self) -> Option<Amount> {
        self.quota_amount.checked_add(self.wallet_amount)
    }
}
