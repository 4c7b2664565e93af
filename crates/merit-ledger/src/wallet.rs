//! WalletLedger: the only writer of balances, ratings and pools.
//!
//! [`commit`] applies every leg of a [`Posting`] with single conditional
//! statements and journals it. Debits run first; the first one that cannot
//! be covered aborts the whole group, and since the caller's transaction is
//! then dropped uncommitted, nothing of the group persists.

use merit_db::queries::{ledger, publications, wallets};
use merit_types::{is_global, Amount};
use rusqlite::{Connection, Transaction};

use crate::posting::{Account, Leg, Posting, Side, TxKind};
use crate::{LedgerError, Result};

pub use merit_db::queries::ledger::HistoryRow;
pub use merit_db::queries::wallets::WalletRow;

/// Currency label of global wallets.
pub const GLOBAL_CURRENCY_LABEL: &str = "merits";

/// Balance of one wallet (zero if never touched).
pub fn get_balance(conn: &Connection, user_id: &str, community_id: &str) -> Result<Amount> {
    Ok(wallets::balance(conn, user_id, community_id)?)
}

/// Every wallet a user holds.
pub fn list_wallets(conn: &Connection, user_id: &str) -> Result<Vec<WalletRow>> {
    Ok(wallets::list_for_user(conn, user_id)?)
}

/// Most recent wallet movements of a user, newest first.
pub fn transaction_history(conn: &Connection, user_id: &str, limit: u32) -> Result<Vec<HistoryRow>> {
    Ok(ledger::recent_for_user(conn, user_id, limit)?)
}

/// Apply and journal a posting. Returns the journal id, or `None` when the
/// posting moves nothing.
pub fn commit(tx: &Transaction<'_>, posting: &Posting, now: u64) -> Result<Option<i64>> {
    if posting.is_empty() {
        return Ok(None);
    }

    let (debits, credits) = posting
        .totals()
        .ok_or(LedgerError::Overflow("posting totals"))?;
    if debits != credits {
        let err = LedgerError::Unbalanced {
            kind: posting.kind.as_str(),
            reference_id: posting.reference_id.clone(),
            debits,
            credits,
        };
        tracing::error!(error = %err, "refusing unbalanced posting");
        return Err(err);
    }

    let tx_id = ledger::insert_transaction(
        tx,
        posting.kind.as_str(),
        &posting.reference_id,
        posting.is_externally_funded(),
        now,
    )?;

    let debit_legs = posting.legs.iter().filter(|l| l.side == Side::Debit);
    let credit_legs = posting.legs.iter().filter(|l| l.side == Side::Credit);
    for leg in debit_legs.chain(credit_legs) {
        apply_leg(tx, posting, leg, now)?;
        let magnitude = leg
            .amount
            .to_i64()
            .ok_or(LedgerError::Overflow("journal delta"))?;
        let delta = match leg.side {
            Side::Debit => -magnitude,
            Side::Credit => magnitude,
        };
        ledger::insert_entry(
            tx,
            tx_id,
            leg.account.kind(),
            leg.account.id(),
            leg.account.community_id(),
            delta,
        )?;
    }

    tracing::debug!(
        journal_id = tx_id,
        kind = posting.kind.as_str(),
        reference = %posting.reference_id,
        amount = %debits,
        legs = posting.legs.len(),
        "posting committed"
    );
    Ok(Some(tx_id))
}

fn apply_leg(conn: &Connection, posting: &Posting, leg: &Leg, now: u64) -> Result<()> {
    match (&leg.account, leg.side) {
        (Account::Wallet { user_id, community_id }, Side::Debit) => {
            if !wallets::try_debit(conn, user_id, community_id, leg.amount, now)? {
                return Err(LedgerError::InsufficientFunds {
                    user_id: user_id.clone(),
                    community_id: community_id.clone(),
                    needed: leg.amount,
                    available: wallets::balance(conn, user_id, community_id)?,
                });
            }
        }
        (Account::Wallet { user_id, community_id }, Side::Credit) => {
            let label = if is_global(community_id) {
                GLOBAL_CURRENCY_LABEL
            } else {
                posting.currency_label.as_str()
            };
            if !wallets::credit(conn, user_id, community_id, leg.amount, label, now)? {
                return Err(LedgerError::Overflow("wallet balance"));
            }
        }
        (Account::Score { publication_id, .. }, Side::Debit) => {
            if !publications::try_sub_score(conn, publication_id, leg.amount)? {
                let available = publications::get(conn, publication_id)?.score;
                return Err(LedgerError::InsufficientRating {
                    publication_id: publication_id.clone(),
                    needed: leg.amount,
                    available,
                });
            }
        }
        (Account::Score { publication_id, .. }, Side::Credit) => {
            publications::add_score(conn, publication_id, leg.amount)?;
        }
        (Account::Pool { publication_id, .. }, Side::Debit) => {
            if !publications::try_sub_pool(conn, publication_id, leg.amount)? {
                tracing::error!(
                    publication = %publication_id,
                    amount = %leg.amount,
                    "pool payout exceeds pool"
                );
                return Err(LedgerError::PoolExhausted(publication_id.clone()));
            }
        }
        (Account::Pool { publication_id, .. }, Side::Credit) => {
            publications::add_to_pool(conn, publication_id, leg.amount)?;
        }
        (Account::Quota { .. } | Account::Emission { .. } | Account::Burn { .. }, _) => {}
    }
    Ok(())
}

/// One signed wallet delta of [`apply_deltas`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletDelta {
    pub user_id: String,
    pub community_id: String,
    pub side: Side,
    pub amount: Amount,
}

impl WalletDelta {
    pub fn credit(user_id: &str, community_id: &str, amount: Amount) -> Self {
        Self {
            user_id: user_id.to_string(),
            community_id: community_id.to_string(),
            side: Side::Credit,
            amount,
        }
    }

    pub fn debit(user_id: &str, community_id: &str, amount: Amount) -> Self {
        Self {
            user_id: user_id.to_string(),
            community_id: community_id.to_string(),
            side: Side::Debit,
            amount,
        }
    }
}

/// Apply a group of wallet deltas all-or-nothing.
///
/// The group must balance: use [`credit_emission`] for pure credits.
pub fn apply_deltas(
    tx: &Transaction<'_>,
    reference_id: &str,
    deltas: &[WalletDelta],
    now: u64,
) -> Result<Option<i64>> {
    let mut posting = Posting::new(TxKind::Transfer, reference_id);
    for delta in deltas {
        posting.push_leg(
            Account::wallet(&delta.user_id, &delta.community_id),
            delta.side,
            delta.amount,
        );
    }
    commit(tx, &posting, now)
}

/// Credit a wallet from outside the economy (welcome merits, daily
/// emission, tappalka rewards).
pub fn credit_emission(
    tx: &Transaction<'_>,
    user_id: &str,
    community_id: &str,
    amount: Amount,
    kind: TxKind,
    reference_id: &str,
    now: u64,
) -> Result<i64> {
    if amount.is_zero() {
        return Err(LedgerError::InvalidAmount(
            "emission amount must be positive".to_string(),
        ));
    }
    let posting = Posting::new(kind, reference_id).transfer(
        Account::emission(community_id),
        Account::wallet(user_id, community_id),
        amount,
    );
    let journal_id = commit(tx, &posting, now)?
        .ok_or_else(|| LedgerError::InvalidAmount("emission moved nothing".to_string()))?;
    tracing::info!(
        user = user_id,
        community = community_id,
        amount = %amount,
        kind = kind.as_str(),
        "emission credited"
    );
    Ok(journal_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        merit_db::open_memory().expect("open test db")
    }

    fn fund(conn: &mut Connection, user: &str, community: &str, merits: u64) {
        let tx = conn.transaction().expect("begin");
        credit_emission(
            &tx,
            user,
            community,
            Amount::from_merits(merits),
            TxKind::Emission,
            "welcome",
            1,
        )
        .expect("emission");
        tx.commit().expect("commit");
    }

    #[test]
    fn test_emission_credit() {
        let mut conn = test_db();
        fund(&mut conn, "u1", "global", 10);
        assert_eq!(
            get_balance(&conn, "u1", "global").expect("balance"),
            Amount::from_merits(10)
        );
        let history = transaction_history(&conn, "u1", 10).expect("history");
        assert_eq!(history.len(), 1);
        assert!(history[0].externally_funded);
    }

    #[test]
    fn test_apply_deltas_transfer() {
        let mut conn = test_db();
        fund(&mut conn, "a", "c1", 5);
        let tx = conn.transaction().expect("begin");
        apply_deltas(
            &tx,
            "gift",
            &[
                WalletDelta::debit("a", "c1", Amount::from_merits(3)),
                WalletDelta::credit("b", "c1", Amount::from_merits(3)),
            ],
            2,
        )
        .expect("apply");
        tx.commit().expect("commit");

        assert_eq!(get_balance(&conn, "a", "c1").expect("a"), Amount::from_merits(2));
        assert_eq!(get_balance(&conn, "b", "c1").expect("b"), Amount::from_merits(3));
        assert!(ledger::unbalanced_transactions(&conn).expect("check").is_empty());
    }

    #[test]
    fn test_insufficient_funds_rolls_back_group() {
        let mut conn = test_db();
        fund(&mut conn, "a", "c1", 5);
        {
            let tx = conn.transaction().expect("begin");
            let result = apply_deltas(
                &tx,
                "too-much",
                &[
                    WalletDelta::credit("b", "c1", Amount::from_merits(1)),
                    WalletDelta::debit("a", "c1", Amount::from_merits(1)),
                    WalletDelta::credit("c", "c1", Amount::from_merits(5)),
                    WalletDelta::debit("a", "c1", Amount::from_merits(5)),
                ],
                2,
            );
            assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
            // dropped without commit
        }
        assert_eq!(get_balance(&conn, "a", "c1").expect("a"), Amount::from_merits(5));
        assert_eq!(get_balance(&conn, "b", "c1").expect("b"), Amount::ZERO);
        assert_eq!(get_balance(&conn, "c", "c1").expect("c"), Amount::ZERO);
    }

    #[test]
    fn test_unbalanced_rejected() {
        let mut conn = test_db();
        let tx = conn.transaction().expect("begin");
        let result = apply_deltas(
            &tx,
            "mint",
            &[WalletDelta::credit("b", "c1", Amount::from_merits(1))],
            2,
        );
        assert!(matches!(result, Err(LedgerError::Unbalanced { .. })));
    }

    #[test]
    fn test_zero_emission_rejected() {
        let mut conn = test_db();
        let tx = conn.transaction().expect("begin");
        let result = credit_emission(&tx, "u1", "c1", Amount::ZERO, TxKind::Emission, "x", 1);
        assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn test_local_wallet_label() {
        let mut conn = test_db();
        let tx = conn.transaction().expect("begin");
        let posting = Posting::new(TxKind::Emission, "seed")
            .with_currency_label("leaves")
            .transfer(
                Account::emission("c1"),
                Account::wallet("u1", "c1"),
                Amount::from_merits(1),
            );
        commit(&tx, &posting, 1).expect("commit posting");
        tx.commit().expect("commit");

        let wallets = list_wallets(&conn, "u1").expect("list");
        assert_eq!(wallets[0].currency_label, "leaves");
    }
}
