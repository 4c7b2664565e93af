//! VoteProcessor.
//!
//! A vote moves merits from the voter's allowance and/or wallet into the
//! publication's rating. The whole flow runs in one SQLite transaction:
//!
//! 1. load the publication (must exist, be live, belong to the community)
//! 2. reject self-votes structurally
//! 3. evaluate `vote` permission
//! 4. resolve funding (excess quota becomes a wallet draw)
//! 5. record the vote, consume quota, commit the posting

use merit_db::queries::{publications, votes};
use merit_ledger::posting::{Account, Posting, TxKind};
use merit_ledger::quota::{self, UsageType};
use merit_ledger::{resolver, wallet};
use merit_permissions::PermissionEngine;
use merit_types::community::CommunitySettings;
use merit_types::identity::Role;
use merit_types::permission::{Action, Decision, PermissionContext};
use merit_types::publication::{Publication, Vote};
use merit_types::{Amount, CommunityId, PublicationId, UserId};
use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};

use crate::{log_unexpected, Result, VotingError};

/// A vote as submitted by the request layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub publication_id: PublicationId,
    pub voter_id: UserId,
    pub role: Role,
    /// Requested from the daily allowance. Any part beyond what remains is
    /// drawn from the wallet.
    pub quota_amount: Amount,
    pub wallet_amount: Amount,
    /// Caller facts (team membership, author role). Authorship and vote
    /// presence are filled in from storage.
    #[serde(default)]
    pub context: PermissionContext,
}

/// Outcome of a committed vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: i64,
    pub publication_id: PublicationId,
    pub quota_amount: Amount,
    pub wallet_amount: Amount,
    pub wallet_community_id: CommunityId,
    pub new_score: Amount,
}

/// Cast a vote.
pub fn cast_vote(
    conn: &mut Connection,
    settings: &CommunitySettings,
    request: &VoteRequest,
    now: u64,
) -> Result<VoteReceipt> {
    log_unexpected("vote", cast_vote_inner(conn, settings, request, now))
}

fn cast_vote_inner(
    conn: &mut Connection,
    settings: &CommunitySettings,
    request: &VoteRequest,
    now: u64,
) -> Result<VoteReceipt> {
    let tx = merit_db::begin_write(conn)?;
    let publication = load_live_publication(&tx, settings, &request.publication_id)?;

    resolver::ensure_distinct_parties(&request.voter_id, &publication.author_id)?;
    resolver::ensure_distinct_parties(&request.voter_id, publication.effective_beneficiary())?;

    let ctx = vote_context(&tx, &publication, request, now)?;
    if let Decision::Denied(reason) =
        PermissionEngine::for_community(settings).evaluate(request.role, Action::Vote, &ctx)
    {
        tracing::warn!(
            voter = %request.voter_id,
            publication = %publication.id,
            reason = reason.code(),
            "vote denied"
        );
        return Err(VotingError::Denied(reason));
    }

    let plan = resolver::resolve_vote_funding(
        &tx,
        settings,
        &request.voter_id,
        request.role,
        request.quota_amount,
        request.wallet_amount,
        now,
    )?;
    let total = plan.total()?;

    let vote_id = votes::insert(
        &tx,
        &publication.id,
        &request.voter_id,
        &settings.id,
        plan.quota_amount,
        plan.wallet_amount,
        (!plan.wallet_amount.is_zero()).then_some(plan.wallet_community_id.as_str()),
        now,
    )?;
    let reference = format!("vote:{vote_id}");

    quota::consume(
        &tx,
        settings,
        &request.voter_id,
        request.role,
        plan.quota_amount,
        UsageType::Vote,
        &reference,
        now,
    )?;

    let target = Account::score(&publication.id, &settings.id);
    let posting = Posting::new(TxKind::Vote, &reference)
        .with_currency_label(&settings.currency_label)
        .transfer(
            Account::quota(&request.voter_id, &settings.id),
            target.clone(),
            plan.quota_amount,
        )
        .transfer(
            Account::wallet(&request.voter_id, &plan.wallet_community_id),
            target,
            plan.wallet_amount,
        );
    wallet::commit(&tx, &posting, now)?;

    let new_score = publications::get(&tx, &publication.id)?.score;
    tx.commit()?;

    tracing::info!(
        vote_id,
        voter = %request.voter_id,
        publication = %publication.id,
        community = %settings.id,
        amount = %total,
        quota = %plan.quota_amount,
        wallet = %plan.wallet_amount,
        wallet_community = %plan.wallet_community_id,
        "vote cast"
    );

    Ok(VoteReceipt {
        vote_id,
        publication_id: publication.id,
        quota_amount: plan.quota_amount,
        wallet_amount: plan.wallet_amount,
        wallet_community_id: plan.wallet_community_id,
        new_score,
    })
}

/// Votes on a publication, oldest first.
pub fn list_votes(conn: &Connection, publication_id: &str) -> Result<Vec<Vote>> {
    Ok(votes::list_for_publication(conn, publication_id)?)
}

fn load_live_publication(
    tx: &Transaction<'_>,
    settings: &CommunitySettings,
    publication_id: &str,
) -> Result<Publication> {
    let publication = publications::get(tx, publication_id)?;
    if publication.is_deleted() {
        return Err(VotingError::PublicationDeleted(publication.id));
    }
    if publication.community_id != settings.id {
        return Err(VotingError::InvalidRequest(format!(
            "publication {} belongs to community {}, not {}",
            publication.id, publication.community_id, settings.id
        )));
    }
    Ok(publication)
}

fn vote_context(
    conn: &Connection,
    publication: &Publication,
    request: &VoteRequest,
    now: u64,
) -> Result<PermissionContext> {
    Ok(PermissionContext {
        is_author: publication.author_id == request.voter_id,
        is_effective_beneficiary: publication.effective_beneficiary() == request.voter_id,
        has_votes: votes::count_for_publication(conn, &publication.id)? > 0,
        minutes_since_creation: Some(now.saturating_sub(publication.created_at) / 60),
        ..request.context.clone()
    })
}
