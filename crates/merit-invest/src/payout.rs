//! Withdrawal and close.
//!
//! Both pay out to global wallets: local currency is not redeemable, so
//! leaving a community's economy always routes through global merits.

use merit_db::queries::publications;
use merit_ledger::posting::{Account, Posting, TxKind};
use merit_ledger::{resolver, wallet};
use merit_permissions::PermissionEngine;
use merit_types::community::CommunitySettings;
use merit_types::identity::Role;
use merit_types::permission::{Action, Decision, DenialReason, PermissionContext};
use merit_types::publication::Publication;
use merit_types::{Amount, PublicationId, UserId};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::distribution::{self, Distribution, InvestorShare};
use crate::pool::load_live;
use crate::{log_unexpected, InvestError, Result};

/// A withdrawal as submitted by the request layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub publication_id: PublicationId,
    pub requester_id: UserId,
    pub role: Role,
    pub amount: Amount,
    #[serde(default)]
    pub context: PermissionContext,
}

/// Outcome of a committed withdrawal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub publication_id: PublicationId,
    pub amount: Amount,
    pub distribution: Distribution,
    pub new_score: Amount,
}

/// A close (soft-delete) request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRequest {
    pub publication_id: PublicationId,
    pub requester_id: UserId,
    pub role: Role,
    /// Caller facts; authorship, votes and age are filled in from storage.
    #[serde(default)]
    pub context: PermissionContext,
}

/// Everything paid out by a close.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReceipt {
    pub publication_id: PublicationId,
    pub refunds: Vec<InvestorShare>,
    pub distribution: Option<Distribution>,
}

/// Withdraw rating from a publication into global wallets.
pub fn withdraw(
    conn: &mut Connection,
    settings: &CommunitySettings,
    request: &WithdrawRequest,
    now: u64,
) -> Result<WithdrawalReceipt> {
    log_unexpected("withdraw", withdraw_inner(conn, settings, request, now))
}

fn withdraw_inner(
    conn: &mut Connection,
    settings: &CommunitySettings,
    request: &WithdrawRequest,
    now: u64,
) -> Result<WithdrawalReceipt> {
    if request.amount.is_zero() {
        return Err(InvestError::InvalidRequest(
            "withdrawal amount must be positive".to_string(),
        ));
    }

    let tx = merit_db::begin_write(conn)?;
    let publication = load_live(&tx, settings, &request.publication_id)?;

    if publication.effective_beneficiary() != request.requester_id {
        tracing::warn!(
            requester = %request.requester_id,
            publication = %publication.id,
            "withdrawal by non-beneficiary rejected"
        );
        return Err(InvestError::Denied(DenialReason::NotBeneficiary));
    }
    let ctx = PermissionContext {
        is_author: publication.author_id == request.requester_id,
        is_effective_beneficiary: true,
        ..request.context.clone()
    };
    if let Decision::Denied(reason) =
        PermissionEngine::for_community(settings).evaluate(request.role, Action::Withdraw, &ctx)
    {
        return Err(InvestError::Denied(reason));
    }

    if request.amount > publication.score {
        return Err(merit_ledger::LedgerError::InsufficientRating {
            publication_id: publication.id.clone(),
            needed: request.amount,
            available: publication.score,
        }
        .into());
    }

    let distribution = distribution::distribute_on_withdraw(&publication, request.amount)?;
    let posting = payout_posting(TxKind::Withdraw, &publication, &distribution);
    wallet::commit(&tx, &posting, now)?;

    let new_score = publications::get(&tx, &publication.id)?.score;
    tx.commit()?;

    tracing::info!(
        publication = %publication.id,
        beneficiary = %distribution.beneficiary_id,
        amount = %request.amount,
        beneficiary_share = %distribution.beneficiary_share,
        investors = distribution.investor_shares.len(),
        "funds withdrawn"
    );

    Ok(WithdrawalReceipt {
        publication_id: publication.id,
        amount: request.amount,
        distribution,
        new_score,
    })
}

/// Close a publication: refund the pool, pay out the remaining rating,
/// then soft-delete. All in one transaction, so the pool is never orphaned.
pub fn close(
    conn: &mut Connection,
    settings: &CommunitySettings,
    request: &CloseRequest,
    now: u64,
) -> Result<CloseReceipt> {
    log_unexpected("close", close_inner(conn, settings, request, now))
}

fn close_inner(
    conn: &mut Connection,
    settings: &CommunitySettings,
    request: &CloseRequest,
    now: u64,
) -> Result<CloseReceipt> {
    let tx = merit_db::begin_write(conn)?;
    let publication = load_live(&tx, settings, &request.publication_id)?;

    let has_votes = merit_db::queries::votes::count_for_publication(&tx, &publication.id)? > 0;
    let ctx = PermissionContext {
        is_author: publication.author_id == request.requester_id,
        is_effective_beneficiary: publication.effective_beneficiary() == request.requester_id,
        has_votes,
        minutes_since_creation: Some(now.saturating_sub(publication.created_at) / 60),
        ..request.context.clone()
    };
    if let Decision::Denied(reason) = PermissionEngine::for_community(settings).evaluate(
        request.role,
        Action::DeletePublication,
        &ctx,
    ) {
        return Err(InvestError::Denied(reason));
    }

    let refunds = distribution::refund_pool(&publication)?;
    let mut refund_posting = Posting::new(TxKind::PoolRefund, &publication.id);
    for refund in &refunds {
        refund_posting.push_transfer(
            Account::pool(&publication.id, &publication.community_id),
            resolver::withdrawal_account(&refund.investor_id),
            refund.amount,
        );
    }
    wallet::commit(&tx, &refund_posting, now)?;

    let distribution = if publication.score.is_zero() {
        None
    } else {
        let distribution = distribution::distribute_on_withdraw(&publication, publication.score)?;
        let posting = payout_posting(TxKind::CloseDistribution, &publication, &distribution);
        wallet::commit(&tx, &posting, now)?;
        Some(distribution)
    };

    if !publications::mark_deleted(&tx, &publication.id, now)? {
        return Err(InvestError::PublicationDeleted(publication.id));
    }
    tx.commit()?;

    tracing::info!(
        publication = %publication.id,
        refunded = %publication.investment_pool,
        distributed = %publication.score,
        "publication closed"
    );

    Ok(CloseReceipt {
        publication_id: publication.id,
        refunds,
        distribution,
    })
}

fn payout_posting(kind: TxKind, publication: &Publication, distribution: &Distribution) -> Posting {
    let score = Account::score(&publication.id, &publication.community_id);
    let mut posting = Posting::new(kind, &publication.id);
    for share in &distribution.investor_shares {
        posting.push_transfer(
            score.clone(),
            resolver::withdrawal_account(&share.investor_id),
            share.amount,
        );
    }
    posting.push_transfer(
        score,
        resolver::withdrawal_account(&distribution.beneficiary_id),
        distribution.beneficiary_share,
    );
    posting
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::tests::{request as invest_request, setup};
    use crate::pool::invest;
    use merit_db::queries::ledger;
    use merit_types::community::CommunityType;
    use merit_types::{ErrorClass, GLOBAL_COMMUNITY_ID};

    fn add_score(conn: &Connection, merits: u64) {
        publications::add_score(conn, "p1", Amount::from_merits(merits)).expect("score");
    }

    fn withdraw_request(requester: &str, merits: u64) -> WithdrawRequest {
        WithdrawRequest {
            publication_id: "p1".to_string(),
            requester_id: requester.to_string(),
            role: Role::Participant,
            amount: Amount::from_merits(merits),
            context: PermissionContext::default(),
        }
    }

    fn close_request(requester: &str, role: Role) -> CloseRequest {
        CloseRequest {
            publication_id: "p1".to_string(),
            requester_id: requester.to_string(),
            role,
            context: PermissionContext::default(),
        }
    }

    #[test]
    fn test_withdraw_credits_global() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 0);
        add_score(&conn, 8);

        let receipt =
            withdraw(&mut conn, &settings, &withdraw_request("author", 8), 100).expect("withdraw");
        assert_eq!(receipt.new_score, Amount::ZERO);
        assert_eq!(
            wallet::get_balance(&conn, "author", GLOBAL_COMMUNITY_ID).expect("global"),
            Amount::from_merits(8)
        );
        assert_eq!(
            wallet::get_balance(&conn, "author", "c1").expect("local"),
            Amount::ZERO
        );
    }

    #[test]
    fn test_withdraw_splits_with_investors() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 50);
        invest(&mut conn, &settings, &invest_request("alice", 30), 10).expect("alice");
        invest(&mut conn, &settings, &invest_request("bob", 10), 11).expect("bob");
        add_score(&conn, 20);

        let receipt =
            withdraw(&mut conn, &settings, &withdraw_request("author", 20), 100).expect("withdraw");
        assert_eq!(receipt.distribution.beneficiary_share, Amount::from_merits(10));
        assert_eq!(
            wallet::get_balance(&conn, "alice", GLOBAL_COMMUNITY_ID).expect("alice"),
            Amount::from_micro(7_500_000)
        );
        assert_eq!(
            wallet::get_balance(&conn, "bob", GLOBAL_COMMUNITY_ID).expect("bob"),
            Amount::from_micro(2_500_000)
        );
        assert!(ledger::unbalanced_transactions(&conn).expect("journal").is_empty());
    }

    #[test]
    fn test_withdraw_bounded_by_score() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 0);
        add_score(&conn, 3);
        let err = withdraw(&mut conn, &settings, &withdraw_request("author", 4), 100)
            .expect_err("over score");
        assert_eq!(err.class(), ErrorClass::InsufficientFunds);
    }

    #[test]
    fn test_only_beneficiary_withdraws() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 0);
        add_score(&conn, 3);
        let err = withdraw(&mut conn, &settings, &withdraw_request("alice", 1), 100)
            .expect_err("not beneficiary");
        assert!(matches!(err, InvestError::Denied(DenialReason::NotBeneficiary)));
    }

    #[test]
    fn test_close_refunds_and_distributes() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 50);
        invest(&mut conn, &settings, &invest_request("alice", 30), 10).expect("alice");
        invest(&mut conn, &settings, &invest_request("bob", 10), 11).expect("bob");
        add_score(&conn, 4);

        let receipt =
            close(&mut conn, &settings, &close_request("author", Role::Lead), 100).expect("close");
        assert_eq!(receipt.refunds.len(), 2);
        assert_eq!(receipt.refunds[0].amount, Amount::from_merits(30));
        let distribution = receipt.distribution.expect("score distributed");
        assert_eq!(distribution.beneficiary_share, Amount::from_merits(2));

        // 30 refunded + 1.5 of the rating
        assert_eq!(
            wallet::get_balance(&conn, "alice", GLOBAL_COMMUNITY_ID).expect("alice"),
            Amount::from_micro(31_500_000)
        );
        let publication = publications::get(&conn, "p1").expect("publication");
        assert!(publication.is_deleted());
        assert_eq!(publication.investment_pool, Amount::ZERO);
        assert_eq!(publication.score, Amount::ZERO);
        assert_eq!(publication.investment_pool_total, Amount::from_merits(40));
    }

    #[test]
    fn test_close_twice_fails() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 0);
        close(&mut conn, &settings, &close_request("author", Role::Lead), 100).expect("close");
        let err = close(&mut conn, &settings, &close_request("author", Role::Lead), 101)
            .expect_err("closed");
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[test]
    fn test_participant_cannot_close_others() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 0);
        let err = close(&mut conn, &settings, &close_request("alice", Role::Participant), 100)
            .expect_err("not author");
        assert_eq!(err.class(), ErrorClass::Denied);
    }
}
