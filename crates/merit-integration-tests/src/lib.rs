//! Integration test crate for the merit economy engine.
//!
//! The library only carries shared fixtures; the tests under `tests/`
//! exercise end-to-end flows across the engine crates against an
//! in-memory database.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p merit-integration-tests
//! ```

use merit_db::queries::{ledger, publications, wallets};
use merit_ledger::posting::TxKind;
use merit_ledger::wallet;
use merit_types::identity::Role;
use merit_types::permission::PermissionContext;
use merit_types::publication::{Publication, PublicationDraft};
use merit_types::Amount;
use rusqlite::Connection;

/// Simulated timestamp for deterministic testing (a UTC midnight).
pub const TEST_TIMESTAMP: u64 = 1_700_006_400;

/// Fresh in-memory database.
pub fn open_db() -> Connection {
    merit_db::open_memory().expect("open in-memory db")
}

/// Credit `merits` to a wallet as an externally funded emission.
pub fn grant(conn: &mut Connection, user_id: &str, community_id: &str, merits: u64) {
    let tx = conn.transaction().expect("begin");
    wallet::credit_emission(
        &tx,
        user_id,
        community_id,
        Amount::from_merits(merits),
        TxKind::Emission,
        "grant",
        TEST_TIMESTAMP,
    )
    .expect("grant");
    tx.commit().expect("commit grant");
}

/// Draft with defaults: no beneficiary, no categories, investing off.
pub fn draft(id: &str, community_id: &str, author_id: &str) -> PublicationDraft {
    PublicationDraft {
        id: id.to_string(),
        community_id: community_id.to_string(),
        author_id: author_id.to_string(),
        beneficiary_id: None,
        categories: Vec::new(),
        investing_enabled: false,
        investor_share_percent: 0,
    }
}

/// Publish through the engine as a participant, paying the post fee.
pub fn publish(
    conn: &mut Connection,
    settings: &merit_types::community::CommunitySettings,
    draft: &PublicationDraft,
) -> Publication {
    merit_voting::publishing::create_publication(
        conn,
        settings,
        Role::Participant,
        &PermissionContext::default(),
        draft,
        TEST_TIMESTAMP,
    )
    .expect("publish")
    .publication
}

pub fn balance(conn: &Connection, user_id: &str, community_id: &str) -> Amount {
    wallet::get_balance(conn, user_id, community_id).expect("balance")
}

pub fn score(conn: &Connection, publication_id: &str) -> Amount {
    publications::get(conn, publication_id).expect("publication").score
}

/// Assert the journal is consistent with the stored balances.
///
/// Every transaction balances, journaled wallet flow equals the sum of
/// wallet balances, and journaled score and pool flows equal the stored
/// ratings and pools.
pub fn assert_conserved(conn: &Connection) {
    assert!(
        ledger::unbalanced_transactions(conn).expect("journal").is_empty(),
        "every journal transaction must sum to zero"
    );

    let net = ledger::net_by_kind(conn).expect("net by kind");
    assert_eq!(net.iter().map(|(_, n)| n).sum::<i64>(), 0);

    let net_of = |kind: &str| {
        net.iter()
            .find(|(k, _)| k == kind)
            .map_or(0, |(_, n)| *n)
    };
    let wallet_total = wallets::total_balance(conn).expect("wallet total");
    assert_eq!(net_of("wallet"), wallet_total.to_i64().expect("fits"));

    let score_total: i64 = conn
        .query_row("SELECT COALESCE(SUM(score), 0) FROM publications", [], |row| {
            row.get(0)
        })
        .expect("score total");
    assert_eq!(net_of("score"), score_total);

    let pool_total: i64 = conn
        .query_row(
            "SELECT COALESCE(SUM(investment_pool), 0) FROM publications",
            [],
            |row| row.get(0),
        )
        .expect("pool total");
    assert_eq!(net_of("pool"), pool_total);
}
