//! Tappalka (pairwise comparison game) settings and records.

use serde::{Deserialize, Serialize};

use crate::amount::{merits_f64, Amount};
use crate::{CommunityId, PublicationId, SessionId, UserId};

/// Per-community tappalka configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TappalkaSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Empty = all categories.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(with = "merits_f64", default = "default_min_rating")]
    pub min_rating: Amount,
    /// Deducted from both posts' ratings per comparison.
    #[serde(with = "merits_f64", default = "default_show_cost")]
    pub show_cost: Amount,
    /// Added to the winner's rating.
    #[serde(with = "merits_f64", default = "default_win_reward")]
    pub win_reward: Amount,
    /// Credited to the player's local wallet at each milestone.
    #[serde(with = "merits_f64", default = "default_user_reward")]
    pub user_reward: Amount,
    #[serde(default = "default_comparisons_required")]
    pub comparisons_required: u32,
}

impl TappalkaSettings {
    /// A post must clear both the minimum rating and its own show cost.
    pub fn eligibility_floor(&self) -> Amount {
        self.min_rating.max(self.show_cost)
    }
}

impl Default for TappalkaSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            categories: Vec::new(),
            min_rating: default_min_rating(),
            show_cost: default_show_cost(),
            win_reward: default_win_reward(),
            user_reward: default_user_reward(),
            comparisons_required: default_comparisons_required(),
        }
    }
}

fn default_min_rating() -> Amount {
    Amount::from_merits(1)
}

fn default_show_cost() -> Amount {
    Amount::from_micro(100_000)
}

fn default_win_reward() -> Amount {
    Amount::from_merits(1)
}

fn default_user_reward() -> Amount {
    Amount::from_merits(1)
}

fn default_comparisons_required() -> u32 {
    10
}

/// Per-(user, community) progress. Created lazily.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct TappalkaProgress {
    pub user_id: UserId,
    pub community_id: CommunityId,
    /// Resets to zero when a reward is earned.
    pub comparison_count: u32,
    pub total_comparisons: u64,
    pub total_rewards_earned: u64,
    /// One-way latch.
    pub onboarding_seen: bool,
}

impl TappalkaProgress {
    pub fn new(user_id: impl Into<UserId>, community_id: impl Into<CommunityId>) -> Self {
        Self {
            user_id: user_id.into(),
            community_id: community_id.into(),
            comparison_count: 0,
            total_comparisons: 0,
            total_rewards_earned: 0,
            onboarding_seen: false,
        }
    }
}

/// Post as shown to a tappalka player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct PairPost {
    pub id: PublicationId,
    pub author_id: UserId,
    pub rating: Amount,
    pub categories: Vec<String>,
}

/// Two posts to compare, bound to a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TappalkaPair {
    pub session_id: SessionId,
    pub post_a: PairPost,
    pub post_b: PairPost,
}

/// Stored pair session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TappalkaSession {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub community_id: CommunityId,
    pub post_a: PublicationId,
    pub post_b: PublicationId,
    pub created_at: u64,
    pub resolved: bool,
}

impl TappalkaSession {
    /// Whether `{winner, loser}` is exactly this session's pair.
    pub fn matches_pair(&self, winner: &str, loser: &str) -> bool {
        winner != loser
            && (winner == self.post_a || winner == self.post_b)
            && (loser == self.post_a || loser == self.post_b)
    }
}
