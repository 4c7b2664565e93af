//! Accounts and postings.
//!
//! A [`Posting`] is one atomic group of deltas. It is built from transfers
//! (`from` debited, `to` credited by the same amount), so debits and credits
//! balance by construction. Wallets, publication ratings and investment pools
//! hold real balances; quota, emission and burn are journal-only accounts
//! that make free allowance spending, external credits and fees visible in
//! the double-entry journal.

use merit_types::{Amount, CommunityId, PublicationId, UserId};

/// Account id used for system-side accounts.
pub const SYSTEM_ACCOUNT: &str = "system";

/// Something a delta is applied to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Account {
    Wallet {
        user_id: UserId,
        community_id: CommunityId,
    },
    /// Publication rating.
    Score {
        publication_id: PublicationId,
        community_id: CommunityId,
    },
    /// Uninvested investment pool of a publication.
    Pool {
        publication_id: PublicationId,
        community_id: CommunityId,
    },
    /// Free daily allowance.
    Quota {
        user_id: UserId,
        community_id: CommunityId,
    },
    /// Source of externally funded credits.
    Emission { community_id: CommunityId },
    /// Sink of fees and show costs.
    Burn { community_id: CommunityId },
}

impl Account {
    pub fn wallet(user_id: &str, community_id: &str) -> Self {
        Account::Wallet {
            user_id: user_id.to_string(),
            community_id: community_id.to_string(),
        }
    }

    pub fn score(publication_id: &str, community_id: &str) -> Self {
        Account::Score {
            publication_id: publication_id.to_string(),
            community_id: community_id.to_string(),
        }
    }

    pub fn pool(publication_id: &str, community_id: &str) -> Self {
        Account::Pool {
            publication_id: publication_id.to_string(),
            community_id: community_id.to_string(),
        }
    }

    pub fn quota(user_id: &str, community_id: &str) -> Self {
        Account::Quota {
            user_id: user_id.to_string(),
            community_id: community_id.to_string(),
        }
    }

    pub fn emission(community_id: &str) -> Self {
        Account::Emission {
            community_id: community_id.to_string(),
        }
    }

    pub fn burn(community_id: &str) -> Self {
        Account::Burn {
            community_id: community_id.to_string(),
        }
    }

    /// Journal `account_kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Account::Wallet { .. } => "wallet",
            Account::Score { .. } => "score",
            Account::Pool { .. } => "pool",
            Account::Quota { .. } => "quota",
            Account::Emission { .. } => "emission",
            Account::Burn { .. } => "burn",
        }
    }

    /// Journal `account_id`.
    pub fn id(&self) -> &str {
        match self {
            Account::Wallet { user_id, .. } | Account::Quota { user_id, .. } => user_id,
            Account::Score { publication_id, .. } | Account::Pool { publication_id, .. } => {
                publication_id
            }
            Account::Emission { .. } | Account::Burn { .. } => SYSTEM_ACCOUNT,
        }
    }

    pub fn community_id(&self) -> &str {
        match self {
            Account::Wallet { community_id, .. }
            | Account::Score { community_id, .. }
            | Account::Pool { community_id, .. }
            | Account::Quota { community_id, .. }
            | Account::Emission { community_id }
            | Account::Burn { community_id } => community_id,
        }
    }
}

/// Journal transaction kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxKind {
    Vote,
    PostFee,
    Invest,
    Withdraw,
    PoolRefund,
    CloseDistribution,
    TappalkaShow,
    TappalkaWin,
    TappalkaReward,
    Emission,
    Transfer,
}

impl TxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Vote => "vote",
            TxKind::PostFee => "post_fee",
            TxKind::Invest => "invest",
            TxKind::Withdraw => "withdraw",
            TxKind::PoolRefund => "pool_refund",
            TxKind::CloseDistribution => "close_distribution",
            TxKind::TappalkaShow => "tappalka_show",
            TxKind::TappalkaWin => "tappalka_win",
            TxKind::TappalkaReward => "tappalka_reward",
            TxKind::Emission => "emission",
            TxKind::Transfer => "transfer",
        }
    }
}

/// Direction of a single leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Debit,
    Credit,
}

/// One side of a transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leg {
    pub account: Account,
    pub side: Side,
    pub amount: Amount,
}

/// An atomic group of deltas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Posting {
    pub kind: TxKind,
    pub reference_id: String,
    /// Label for local wallets created by this posting.
    pub currency_label: String,
    pub legs: Vec<Leg>,
}

impl Posting {
    pub fn new(kind: TxKind, reference_id: impl Into<String>) -> Self {
        Self {
            kind,
            reference_id: reference_id.into(),
            currency_label: "merits".to_string(),
            legs: Vec::new(),
        }
    }

    pub fn with_currency_label(mut self, label: &str) -> Self {
        self.currency_label = label.to_string();
        self
    }

    /// Move `amount` from `from` to `to`. Zero amounts add nothing.
    pub fn transfer(mut self, from: Account, to: Account, amount: Amount) -> Self {
        self.push_transfer(from, to, amount);
        self
    }

    pub fn push_transfer(&mut self, from: Account, to: Account, amount: Amount) {
        if amount.is_zero() {
            return;
        }
        self.legs.push(Leg {
            account: from,
            side: Side::Debit,
            amount,
        });
        self.legs.push(Leg {
            account: to,
            side: Side::Credit,
            amount,
        });
    }

    /// Add a single leg. Used when building a posting from raw deltas.
    pub fn push_leg(&mut self, account: Account, side: Side, amount: Amount) {
        if !amount.is_zero() {
            self.legs.push(Leg {
                account,
                side,
                amount,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Externally funded postings draw from an emission account.
    pub fn is_externally_funded(&self) -> bool {
        self.legs
            .iter()
            .any(|leg| matches!(leg.account, Account::Emission { .. }) && leg.side == Side::Debit)
    }

    /// Sum of debits and sum of credits.
    pub fn totals(&self) -> Option<(Amount, Amount)> {
        let debits = Amount::checked_sum(
            self.legs
                .iter()
                .filter(|l| l.side == Side::Debit)
                .map(|l| l.amount),
        )?;
        let credits = Amount::checked_sum(
            self.legs
                .iter()
                .filter(|l| l.side == Side::Credit)
                .map(|l| l.amount),
        )?;
        Some((debits, credits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_balances() {
        let posting = Posting::new(TxKind::Vote, "p1")
            .transfer(
                Account::wallet("voter", "c1"),
                Account::score("p1", "c1"),
                Amount::from_merits(3),
            )
            .transfer(
                Account::quota("voter", "c1"),
                Account::score("p1", "c1"),
                Amount::from_merits(2),
            );
        assert_eq!(posting.legs.len(), 4);
        let (debits, credits) = posting.totals().expect("totals");
        assert_eq!(debits, credits);
        assert!(!posting.is_externally_funded());
    }

    #[test]
    fn test_zero_transfer_skipped() {
        let posting = Posting::new(TxKind::Vote, "p1").transfer(
            Account::quota("voter", "c1"),
            Account::score("p1", "c1"),
            Amount::ZERO,
        );
        assert!(posting.is_empty());
    }

    #[test]
    fn test_emission_is_external() {
        let posting = Posting::new(TxKind::Emission, "welcome").transfer(
            Account::emission("global"),
            Account::wallet("u1", "global"),
            Amount::from_merits(10),
        );
        assert!(posting.is_externally_funded());
    }

    #[test]
    fn test_account_journal_fields() {
        let burn = Account::burn("c1");
        assert_eq!(burn.kind(), "burn");
        assert_eq!(burn.id(), SYSTEM_ACCOUNT);
        assert_eq!(burn.community_id(), "c1");
        assert_eq!(Account::score("p1", "c1").id(), "p1");
    }
}
