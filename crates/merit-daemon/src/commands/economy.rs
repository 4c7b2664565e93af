//! Wallet, quota, vote and investment command handlers.

use std::sync::Arc;

use merit_invest::payout::WithdrawRequest;
use merit_invest::pool::InvestRequest;
use merit_ledger::posting::TxKind;
use merit_ledger::{quota, wallet};
use merit_types::identity::Role;
use merit_types::{Amount, CommunityId, ErrorClass, UserId};
use merit_voting::vote::VoteRequest;
use serde::Deserialize;
use serde_json::Value;

use super::{community, engine_error, parse, to_value, Result};
use crate::events::{Event, EventType};
use crate::{unix_now, DaemonState};

#[derive(Deserialize)]
struct WalletParams {
    user_id: UserId,
    community_id: CommunityId,
}

#[derive(Deserialize)]
struct UserParams {
    user_id: UserId,
    #[serde(default = "default_history_limit")]
    limit: u32,
}

#[derive(Deserialize)]
struct QuotaParams {
    user_id: UserId,
    community_id: CommunityId,
    role: Role,
}

#[derive(Deserialize)]
struct CommunityCall<T> {
    community_id: CommunityId,
    #[serde(flatten)]
    request: T,
}

#[derive(Deserialize)]
struct EmissionParams {
    user_id: UserId,
    community_id: CommunityId,
    amount: Amount,
    reference_id: String,
}

fn default_history_limit() -> u32 {
    50
}

/// Balance of one wallet (`community_id = "global"` for the global wallet).
pub async fn get_balance(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: WalletParams = parse(params)?;
    let db = state.db.lock().await;
    let balance = wallet::get_balance(&db, &p.user_id, &p.community_id)
        .map_err(|e| engine_error(e.class(), e))?;
    Ok(serde_json::json!({
        "user_id": p.user_id,
        "community_id": p.community_id,
        "balance": balance,
    }))
}

/// Every wallet a user holds.
pub async fn list_wallets(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: UserParams = parse(params)?;
    let db = state.db.lock().await;
    let wallets = wallet::list_wallets(&db, &p.user_id).map_err(|e| engine_error(e.class(), e))?;

    let result: Vec<Value> = wallets
        .iter()
        .map(|w| {
            serde_json::json!({
                "community_id": w.community_id,
                "balance": w.balance,
                "currency_label": w.currency_label,
                "updated_at": w.updated_at,
            })
        })
        .collect();
    Ok(Value::Array(result))
}

/// Recent wallet movements of a user, newest first.
pub async fn get_transaction_history(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: UserParams = parse(params)?;
    let db = state.db.lock().await;
    let rows = wallet::transaction_history(&db, &p.user_id, p.limit)
        .map_err(|e| engine_error(e.class(), e))?;

    let result: Vec<Value> = rows
        .iter()
        .map(|row| {
            serde_json::json!({
                "transaction_id": row.transaction_id,
                "kind": row.kind,
                "reference_id": row.reference_id,
                "community_id": row.community_id,
                "delta": row.delta,
                "externally_funded": row.externally_funded,
                "created_at": row.created_at,
            })
        })
        .collect();
    Ok(Value::Array(result))
}

/// Remaining daily quota.
pub async fn get_quota(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: QuotaParams = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let now = unix_now();
    let db = state.db.lock().await;
    let remaining = quota::remaining(&db, settings, &p.user_id, p.role, now)
        .map_err(|e| engine_error(e.class(), e))?;
    Ok(serde_json::json!({
        "daily_quota": settings.daily_quota_for(p.role),
        "remaining": remaining,
        "period_start": quota::period_start(settings.quota.reset, now),
    }))
}

/// Cast an upvote.
pub async fn cast_vote(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: CommunityCall<VoteRequest> = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let now = unix_now();
    let receipt = {
        let mut db = state.db.lock().await;
        merit_voting::vote::cast_vote(&mut db, settings, &p.request, now)
            .map_err(|e| engine_error(e.class(), e))?
    };

    state.event_bus.emit(Event::new(
        EventType::VoteCast,
        now,
        serde_json::json!({
            "community_id": settings.id,
            "publication_id": receipt.publication_id,
            "voter_id": p.request.voter_id,
            "amount": receipt.quota_amount.checked_add(receipt.wallet_amount),
        }),
    ));
    to_value(&receipt)
}

/// Invest in a publication's pool.
pub async fn invest(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: CommunityCall<InvestRequest> = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let now = unix_now();
    let receipt = {
        let mut db = state.db.lock().await;
        merit_invest::pool::invest(&mut db, settings, &p.request, now)
            .map_err(|e| engine_error(e.class(), e))?
    };

    state.event_bus.emit(Event::new(
        EventType::InvestmentMade,
        now,
        serde_json::json!({
            "community_id": settings.id,
            "publication_id": receipt.publication_id,
            "investor_id": receipt.investor_id,
            "amount": p.request.amount,
        }),
    ));
    to_value(&receipt)
}

/// Withdraw rating into global wallets.
pub async fn withdraw(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: CommunityCall<WithdrawRequest> = parse(params)?;
    let settings = community(state, &p.community_id)?;
    let now = unix_now();
    let receipt = {
        let mut db = state.db.lock().await;
        merit_invest::payout::withdraw(&mut db, settings, &p.request, now)
            .map_err(|e| engine_error(e.class(), e))?
    };

    state.event_bus.emit(Event::new(
        EventType::FundsWithdrawn,
        now,
        serde_json::json!({
            "community_id": settings.id,
            "publication_id": receipt.publication_id,
            "beneficiary_id": receipt.distribution.beneficiary_id,
            "amount": receipt.amount,
        }),
    ));
    to_value(&receipt)
}

/// Externally funded credit (welcome merits, daily emission).
pub async fn credit_emission(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: EmissionParams = parse(params)?;
    if !merit_types::is_global(&p.community_id) {
        community(state, &p.community_id)?;
    }
    let now = unix_now();
    let journal_id = {
        let mut db = state.db.lock().await;
        let tx = merit_db::begin_write(&mut db)
            .map_err(|e| engine_error(ErrorClass::Storage, e))?;
        let journal_id = wallet::credit_emission(
            &tx,
            &p.user_id,
            &p.community_id,
            p.amount,
            TxKind::Emission,
            &p.reference_id,
            now,
        )
        .map_err(|e| engine_error(e.class(), e))?;
        tx.commit().map_err(|e| engine_error(ErrorClass::Storage, e))?;
        journal_id
    };

    state.event_bus.emit(Event::new(
        EventType::MeritsEmitted,
        now,
        serde_json::json!({
            "community_id": p.community_id,
            "user_id": p.user_id,
            "amount": p.amount,
        }),
    ));
    Ok(serde_json::json!({ "transaction_id": journal_id }))
}

/// Journal consistency report: unbalanced transactions and net flow by
/// account kind. A healthy ledger reports no unbalanced transactions.
pub async fn audit_ledger(state: &Arc<DaemonState>) -> Result {
    let db = state.db.lock().await;
    let storage = |e: merit_db::DbError| engine_error(ErrorClass::Storage, e);
    let unbalanced = merit_db::queries::ledger::unbalanced_transactions(&db).map_err(storage)?;
    let net_by_kind = merit_db::queries::ledger::net_by_kind(&db).map_err(storage)?;
    let total_balance = merit_db::queries::wallets::total_balance(&db).map_err(storage)?;

    let net: serde_json::Map<String, Value> = net_by_kind
        .into_iter()
        .map(|(kind, net)| (kind, Value::from(net)))
        .collect();
    Ok(serde_json::json!({
        "unbalanced_transactions": unbalanced,
        "net_by_account_kind": net,
        "total_wallet_balance": total_balance,
    }))
}
