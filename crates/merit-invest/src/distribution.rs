//! Split computations.
//!
//! Splits use integer micro-merits with `u128` intermediates, so every
//! split sums exactly to its input. Rounding remainders go to the
//! beneficiary on withdrawal and to the largest contributor on pool refund.

use merit_types::publication::Publication;
use merit_types::{Amount, UserId};
use serde::{Deserialize, Serialize};

use crate::{InvestError, Result};

/// One investor's payout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorShare {
    pub investor_id: UserId,
    pub amount: Amount,
}

/// Result of splitting a withdrawal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub beneficiary_id: UserId,
    pub beneficiary_share: Amount,
    pub investor_shares: Vec<InvestorShare>,
}

impl Distribution {
    pub fn total(&self) -> Option<Amount> {
        Amount::checked_sum(
            std::iter::once(self.beneficiary_share)
                .chain(self.investor_shares.iter().map(|s| s.amount)),
        )
    }
}

/// Split `withdraw_amount` between investors and the effective beneficiary.
///
/// Investors collectively receive `investor_share_percent` of the amount,
/// each in proportion to their contribution.
pub fn distribute_on_withdraw(
    publication: &Publication,
    withdraw_amount: Amount,
) -> Result<Distribution> {
    let contributed = checked_investment_total(publication)?;

    let mut investor_shares = Vec::new();
    if !contributed.is_zero() && publication.investor_share_percent > 0 {
        let investors_total = withdraw_amount
            .mul_ratio(u64::from(publication.investor_share_percent.min(100)), 100)
            .ok_or_else(|| overflow(publication, "investor total"))?;
        for investment in &publication.investments {
            let amount = investors_total
                .mul_ratio(investment.amount.micro(), contributed.micro())
                .ok_or_else(|| overflow(publication, "investor share"))?;
            if !amount.is_zero() {
                investor_shares.push(InvestorShare {
                    investor_id: investment.investor_id.clone(),
                    amount,
                });
            }
        }
    }

    let paid = Amount::checked_sum(investor_shares.iter().map(|s| s.amount))
        .ok_or_else(|| overflow(publication, "investor payouts"))?;
    let beneficiary_share = withdraw_amount
        .checked_sub(paid)
        .ok_or_else(|| overflow(publication, "beneficiary remainder"))?;

    Ok(Distribution {
        beneficiary_id: publication.effective_beneficiary().to_string(),
        beneficiary_share,
        investor_shares,
    })
}

/// Split the uninvested pool back to investors by contribution.
pub fn refund_pool(publication: &Publication) -> Result<Vec<InvestorShare>> {
    let pool = publication.investment_pool;
    if pool.is_zero() {
        return Ok(Vec::new());
    }
    let contributed = checked_investment_total(publication)?;
    if contributed.is_zero() {
        return Err(InvestError::InvariantViolation {
            publication_id: publication.id.clone(),
            detail: format!("pool holds {pool} without any investment"),
        });
    }

    let mut shares = Vec::with_capacity(publication.investments.len());
    for investment in &publication.investments {
        let amount = pool
            .mul_ratio(investment.amount.micro(), contributed.micro())
            .ok_or_else(|| overflow(publication, "refund share"))?;
        shares.push(InvestorShare {
            investor_id: investment.investor_id.clone(),
            amount,
        });
    }

    let paid = Amount::checked_sum(shares.iter().map(|s| s.amount))
        .ok_or_else(|| overflow(publication, "refund total"))?;
    let remainder = pool
        .checked_sub(paid)
        .ok_or_else(|| overflow(publication, "refund remainder"))?;
    if !remainder.is_zero() {
        let largest = publication
            .investments
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.amount.cmp(&b.amount).then(ib.cmp(ia)))
            .map(|(index, _)| index)
            .unwrap_or_default();
        if let Some(share) = shares.get_mut(largest) {
            share.amount = share
                .amount
                .checked_add(remainder)
                .ok_or_else(|| overflow(publication, "refund remainder"))?;
        }
    }

    shares.retain(|s| !s.amount.is_zero());
    Ok(shares)
}

/// Sum of investment records, checked against `investment_pool_total`.
pub fn checked_investment_total(publication: &Publication) -> Result<Amount> {
    let sum = Amount::checked_sum(publication.investments.iter().map(|i| i.amount))
        .ok_or_else(|| overflow(publication, "investment sum"))?;
    if sum != publication.investment_pool_total {
        tracing::error!(
            publication = %publication.id,
            records = %sum,
            pool_total = %publication.investment_pool_total,
            "investment records drifted from pool total"
        );
        return Err(InvestError::InvariantViolation {
            publication_id: publication.id.clone(),
            detail: format!(
                "investments sum to {sum}, pool total is {}",
                publication.investment_pool_total
            ),
        });
    }
    if publication.investment_pool > publication.investment_pool_total {
        return Err(InvestError::InvariantViolation {
            publication_id: publication.id.clone(),
            detail: "pool exceeds total invested".to_string(),
        });
    }
    Ok(sum)
}

fn overflow(publication: &Publication, what: &str) -> InvestError {
    InvestError::InvariantViolation {
        publication_id: publication.id.clone(),
        detail: format!("arithmetic overflow in {what}"),
    }
}
