//! Investing in a publication.

use merit_db::queries::{investments, publications};
use merit_ledger::posting::{Account, Posting, TxKind};
use merit_ledger::{resolver, wallet};
use merit_permissions::PermissionEngine;
use merit_types::community::CommunitySettings;
use merit_types::identity::Role;
use merit_types::permission::{Action, Decision, DenialReason, PermissionContext};
use merit_types::publication::Publication;
use merit_types::{Amount, CommunityId, PublicationId, UserId};
use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};

use crate::distribution::checked_investment_total;
use crate::{log_unexpected, InvestError, Result};

/// An investment as submitted by the request layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestRequest {
    pub publication_id: PublicationId,
    pub investor_id: UserId,
    pub role: Role,
    pub amount: Amount,
    #[serde(default)]
    pub context: PermissionContext,
}

/// State after a committed investment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvestmentReceipt {
    pub publication_id: PublicationId,
    pub investor_id: UserId,
    /// Investor's accumulated contribution.
    pub invested_total: Amount,
    pub share_percent: f64,
    pub source_community_id: CommunityId,
    pub investment_pool: Amount,
    pub investment_pool_total: Amount,
}

/// Invest `request.amount` into a publication's pool.
///
/// Repeat investments accumulate into the investor's single record and
/// every investor's share is recomputed against the new total.
pub fn invest(
    conn: &mut Connection,
    settings: &CommunitySettings,
    request: &InvestRequest,
    now: u64,
) -> Result<InvestmentReceipt> {
    log_unexpected("invest", invest_inner(conn, settings, request, now))
}

fn invest_inner(
    conn: &mut Connection,
    settings: &CommunitySettings,
    request: &InvestRequest,
    now: u64,
) -> Result<InvestmentReceipt> {
    let tx = merit_db::begin_write(conn)?;
    let publication = load_live(&tx, settings, &request.publication_id)?;

    if publication.author_id == request.investor_id {
        tracing::warn!(
            investor = %request.investor_id,
            publication = %publication.id,
            "author investment rejected"
        );
        return Err(InvestError::Denied(DenialReason::SelfAction));
    }
    if !publication.investing_enabled {
        return Err(InvestError::Denied(DenialReason::FeatureDisabled));
    }

    let ctx = PermissionContext {
        is_author: false,
        is_effective_beneficiary: publication.effective_beneficiary() == request.investor_id,
        ..request.context.clone()
    };
    if let Decision::Denied(reason) =
        PermissionEngine::for_community(settings).evaluate(request.role, Action::Invest, &ctx)
    {
        return Err(InvestError::Denied(reason));
    }

    let source =
        resolver::resolve_investment_source(&tx, settings, &request.investor_id, request.amount)?;

    investments::accumulate(&tx, &publication.id, &request.investor_id, request.amount, now)?;
    let posting = Posting::new(TxKind::Invest, &publication.id)
        .with_currency_label(&settings.currency_label)
        .transfer(
            Account::wallet(&request.investor_id, &source),
            Account::pool(&publication.id, &settings.id),
            request.amount,
        );
    wallet::commit(&tx, &posting, now)?;

    let updated = publications::get(&tx, &publication.id)?;
    investments::recompute_shares(&tx, &updated.id, updated.investment_pool_total)?;
    let updated = publications::get(&tx, &publication.id)?;
    checked_investment_total(&updated)?;

    let record = updated
        .investments
        .iter()
        .find(|i| i.investor_id == request.investor_id)
        .cloned()
        .ok_or_else(|| InvestError::InvariantViolation {
            publication_id: updated.id.clone(),
            detail: format!("investment of {} missing after insert", request.investor_id),
        })?;
    tx.commit()?;

    tracing::info!(
        publication = %updated.id,
        investor = %request.investor_id,
        amount = %request.amount,
        invested_total = %record.amount,
        share_percent = record.share_percent,
        source = %source,
        "investment made"
    );

    Ok(InvestmentReceipt {
        publication_id: updated.id,
        investor_id: record.investor_id,
        invested_total: record.amount,
        share_percent: record.share_percent,
        source_community_id: source,
        investment_pool: updated.investment_pool,
        investment_pool_total: updated.investment_pool_total,
    })
}

/// Load a live publication of `settings`' community.
pub(crate) fn load_live(
    tx: &Transaction<'_>,
    settings: &CommunitySettings,
    publication_id: &str,
) -> Result<Publication> {
    let publication = publications::get(tx, publication_id)?;
    if publication.is_deleted() {
        return Err(InvestError::PublicationDeleted(publication.id));
    }
    if publication.community_id != settings.id {
        return Err(InvestError::InvalidRequest(format!(
            "publication {} belongs to community {}, not {}",
            publication.id, publication.community_id, settings.id
        )));
    }
    Ok(publication)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use merit_types::community::CommunityType;
    use merit_types::publication::PublicationDraft;
    use merit_types::ErrorClass;

    pub(crate) fn setup(settings: &CommunitySettings, share: u8) -> Connection {
        let mut conn = merit_db::open_memory().expect("open");
        let tx = conn.transaction().expect("begin");
        publications::insert(
            &tx,
            &PublicationDraft {
                id: "p1".to_string(),
                community_id: settings.id.clone(),
                author_id: "author".to_string(),
                beneficiary_id: None,
                categories: Vec::new(),
                investing_enabled: true,
                investor_share_percent: share,
            },
            0,
        )
        .expect("insert");
        for user in ["alice", "bob"] {
            wallet::credit_emission(
                &tx,
                user,
                &settings.id,
                Amount::from_merits(100),
                TxKind::Emission,
                "seed",
                0,
            )
            .expect("seed");
        }
        tx.commit().expect("commit");
        conn
    }

    pub(crate) fn request(investor: &str, merits: u64) -> InvestRequest {
        InvestRequest {
            publication_id: "p1".to_string(),
            investor_id: investor.to_string(),
            role: Role::Participant,
            amount: Amount::from_merits(merits),
            context: PermissionContext::default(),
        }
    }

    #[test]
    fn test_repeat_investment_accumulates() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 30);

        invest(&mut conn, &settings, &request("alice", 30), 10).expect("first");
        let receipt = invest(&mut conn, &settings, &request("alice", 20), 20).expect("second");

        assert_eq!(receipt.invested_total, Amount::from_merits(50));
        assert!((receipt.share_percent - 100.0).abs() < 1e-9);
        assert_eq!(receipt.investment_pool_total, Amount::from_merits(50));
        let publication = publications::get(&conn, "p1").expect("publication");
        assert_eq!(publication.investments.len(), 1);
        assert_eq!(
            wallet::get_balance(&conn, "alice", "c1").expect("balance"),
            Amount::from_merits(50)
        );
    }

    #[test]
    fn test_shares_recomputed_for_all() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 30);

        invest(&mut conn, &settings, &request("alice", 30), 10).expect("alice");
        let bob = invest(&mut conn, &settings, &request("bob", 10), 20).expect("bob");
        assert!((bob.share_percent - 25.0).abs() < 1e-9);

        let publication = publications::get(&conn, "p1").expect("publication");
        let alice = publication
            .investments
            .iter()
            .find(|i| i.investor_id == "alice")
            .expect("alice record");
        assert!((alice.share_percent - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_author_cannot_invest() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 30);
        let err = invest(&mut conn, &settings, &request("author", 1), 10).expect_err("self");
        assert!(matches!(err, InvestError::Denied(DenialReason::SelfAction)));
    }

    #[test]
    fn test_investing_disabled() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 30);
        conn.execute("UPDATE publications SET investing_enabled = 0", [])
            .expect("disable");
        let err = invest(&mut conn, &settings, &request("alice", 1), 10).expect_err("disabled");
        assert_eq!(err.class(), ErrorClass::Denied);
    }

    #[test]
    fn test_insufficient_wallet() {
        let settings = CommunitySettings::new("c1", CommunityType::Custom);
        let mut conn = setup(&settings, 30);
        let err = invest(&mut conn, &settings, &request("alice", 101), 10).expect_err("too much");
        assert_eq!(err.class(), ErrorClass::InsufficientFunds);
        assert!(publications::get(&conn, "p1")
            .expect("publication")
            .investments
            .is_empty());
    }
}
