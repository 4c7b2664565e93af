//! Integration test: the full life of an investable publication.
//!
//! Two investors fund the pool, upvotes raise the rating, the beneficiary
//! withdraws with the investor share split pro-rata, and closing refunds
//! the pool. Investments come from local wallets; every payout lands in
//! global wallets.

use merit_integration_tests::{
    assert_conserved, balance, draft, grant, open_db, publish, score, TEST_TIMESTAMP,
};
use merit_invest::payout::{self, CloseRequest, WithdrawRequest};
use merit_invest::pool::{self, InvestRequest};
use merit_types::community::{CommunitySettings, CommunityType};
use merit_types::identity::Role;
use merit_types::permission::{DenialReason, PermissionContext};
use merit_types::{Amount, ErrorClass, GLOBAL_COMMUNITY_ID};
use merit_voting::vote::{self, VoteRequest};
use rusqlite::Connection;

fn investment(investor: &str, merits: u64) -> InvestRequest {
    InvestRequest {
        publication_id: "p1".to_string(),
        investor_id: investor.to_string(),
        role: Role::Participant,
        amount: Amount::from_merits(merits),
        context: PermissionContext::default(),
    }
}

fn close_request(role: Role) -> CloseRequest {
    CloseRequest {
        publication_id: "p1".to_string(),
        requester_id: "author".to_string(),
        role,
        context: PermissionContext::default(),
    }
}

fn setup(settings: &CommunitySettings) -> Connection {
    let mut conn = open_db();
    grant(&mut conn, "author", "c1", 1);
    grant(&mut conn, "alice", "c1", 100);
    grant(&mut conn, "bob", "c1", 100);

    let mut d = draft("p1", "c1", "author");
    d.investing_enabled = true;
    d.investor_share_percent = 50;
    publish(&mut conn, settings, &d);
    conn
}

fn upvote(conn: &mut Connection, settings: &CommunitySettings, merits: u64) {
    vote::cast_vote(
        conn,
        settings,
        &VoteRequest {
            publication_id: "p1".to_string(),
            voter_id: "voter".to_string(),
            role: Role::Participant,
            quota_amount: Amount::from_merits(merits),
            wallet_amount: Amount::ZERO,
            context: PermissionContext::default(),
        },
        TEST_TIMESTAMP,
    )
    .expect("upvote");
}

#[test]
fn repeat_investments_accumulate() {
    let settings = CommunitySettings::new("c1", CommunityType::Custom);
    let mut conn = setup(&settings);

    pool::invest(&mut conn, &settings, &investment("alice", 30), TEST_TIMESTAMP).expect("first");
    let receipt = pool::invest(&mut conn, &settings, &investment("alice", 20), TEST_TIMESTAMP + 1)
        .expect("second");
    assert_eq!(receipt.invested_total, Amount::from_merits(50));
    assert_eq!(receipt.share_percent, 100.0);
    assert_eq!(receipt.source_community_id, "c1");
    assert_eq!(receipt.investment_pool, Amount::from_merits(50));
    assert_eq!(balance(&conn, "alice", "c1"), Amount::from_merits(50));

    let receipt = pool::invest(&mut conn, &settings, &investment("bob", 50), TEST_TIMESTAMP + 2)
        .expect("bob");
    assert_eq!(receipt.share_percent, 50.0);
    assert_eq!(receipt.investment_pool_total, Amount::from_merits(100));

    assert_conserved(&conn);
}

#[test]
fn withdraw_then_close_pays_investors() {
    let settings = CommunitySettings::new("c1", CommunityType::Custom);
    let mut conn = setup(&settings);
    pool::invest(&mut conn, &settings, &investment("alice", 50), TEST_TIMESTAMP).expect("alice");
    pool::invest(&mut conn, &settings, &investment("bob", 50), TEST_TIMESTAMP).expect("bob");
    upvote(&mut conn, &settings, 10);

    let receipt = payout::withdraw(
        &mut conn,
        &settings,
        &WithdrawRequest {
            publication_id: "p1".to_string(),
            requester_id: "author".to_string(),
            role: Role::Participant,
            amount: Amount::from_merits(10),
            context: PermissionContext::default(),
        },
        TEST_TIMESTAMP + 60,
    )
    .expect("withdraw");
    assert_eq!(receipt.distribution.beneficiary_share, Amount::from_merits(5));
    assert_eq!(receipt.distribution.investor_shares.len(), 2);
    assert_eq!(balance(&conn, "author", GLOBAL_COMMUNITY_ID), Amount::from_merits(5));
    assert_eq!(balance(&conn, "alice", GLOBAL_COMMUNITY_ID), Amount::from_micro(2_500_000));
    assert_eq!(balance(&conn, "bob", GLOBAL_COMMUNITY_ID), Amount::from_micro(2_500_000));
    assert_eq!(score(&conn, "p1"), Amount::ZERO);
    assert_conserved(&conn);

    // the vote counts as an interaction, so a participant author cannot close
    let err = payout::close(
        &mut conn,
        &settings,
        &close_request(Role::Participant),
        TEST_TIMESTAMP + 120,
    )
    .expect_err("has votes");
    assert!(matches!(
        err,
        merit_invest::InvestError::Denied(DenialReason::HasInteractions)
    ));

    let receipt = payout::close(
        &mut conn,
        &settings,
        &close_request(Role::Lead),
        TEST_TIMESTAMP + 120,
    )
    .expect("close");
    assert_eq!(receipt.refunds.len(), 2);
    assert!(receipt.distribution.is_none());
    assert_eq!(balance(&conn, "alice", GLOBAL_COMMUNITY_ID), Amount::from_micro(52_500_000));
    assert_eq!(balance(&conn, "bob", GLOBAL_COMMUNITY_ID), Amount::from_micro(52_500_000));
    assert_eq!(balance(&conn, "alice", "c1"), Amount::from_merits(50));
    assert_conserved(&conn);

    let err = pool::invest(&mut conn, &settings, &investment("alice", 1), TEST_TIMESTAMP + 180)
        .expect_err("closed");
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[test]
fn author_cannot_invest_in_own_post() {
    let settings = CommunitySettings::new("c1", CommunityType::Custom);
    let mut conn = setup(&settings);
    grant(&mut conn, "author", "c1", 10);

    let err = pool::invest(&mut conn, &settings, &investment("author", 5), TEST_TIMESTAMP)
        .expect_err("self invest");
    assert_eq!(err.class(), ErrorClass::Denied);
    assert_eq!(balance(&conn, "author", "c1"), Amount::from_merits(10));
}

#[test]
fn priority_community_invests_from_global() {
    let settings = CommunitySettings::new("mog", CommunityType::MarathonOfGood);
    let mut conn = open_db();
    grant(&mut conn, "author", GLOBAL_COMMUNITY_ID, 1);
    grant(&mut conn, "alice", GLOBAL_COMMUNITY_ID, 20);
    let mut d = draft("p1", "mog", "author");
    d.investing_enabled = true;
    d.investor_share_percent = 20;
    publish(&mut conn, &settings, &d);

    let receipt = pool::invest(&mut conn, &settings, &investment("alice", 15), TEST_TIMESTAMP)
        .expect("invest");
    assert_eq!(receipt.source_community_id, GLOBAL_COMMUNITY_ID);
    assert_eq!(balance(&conn, "alice", GLOBAL_COMMUNITY_ID), Amount::from_merits(5));
    assert_conserved(&conn);
}

#[test]
fn open_delete_rule_does_not_let_strangers_close() {
    let mut settings = CommunitySettings::new("c1", CommunityType::Custom);
    settings
        .permission_rules
        .push(merit_types::permission::PermissionRule::allow(
            Role::Participant,
            merit_types::permission::Action::DeletePublication,
        ));
    let mut conn = setup(&settings);
    pool::invest(&mut conn, &settings, &investment("alice", 40), TEST_TIMESTAMP).expect("alice");
    upvote(&mut conn, &settings, 5);

    let mut request = close_request(Role::Participant);
    request.requester_id = "bob".to_string();
    let err = payout::close(&mut conn, &settings, &request, TEST_TIMESTAMP + 60)
        .expect_err("stranger close");
    assert!(matches!(
        err,
        merit_invest::InvestError::Denied(DenialReason::EditByOthersDisabled)
    ));
    assert_eq!(balance(&conn, "alice", GLOBAL_COMMUNITY_ID), Amount::ZERO);
    assert_eq!(score(&conn, "p1"), Amount::from_merits(5));
    assert_conserved(&conn);
}
