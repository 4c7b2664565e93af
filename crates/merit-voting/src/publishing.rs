//! Publication creation.
//!
//! Creating a publication costs `post_cost`. The fee is burned: it leaves
//! the author's wallet (and, with `can_pay_post_from_quota`, the daily
//! allowance first) and is credited to nobody.

use merit_db::queries::publications;
use merit_ledger::posting::{Account, Posting, TxKind};
use merit_ledger::quota::{self, UsageType};
use merit_ledger::{resolver, wallet};
use merit_permissions::PermissionEngine;
use merit_types::community::CommunitySettings;
use merit_types::identity::Role;
use merit_types::permission::{Action, Decision, PermissionContext};
use merit_types::publication::{Publication, PublicationDraft};
use merit_types::{Amount, CommunityId};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{log_unexpected, Result, VotingError};

/// Outcome of a created publication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicationReceipt {
    pub publication: Publication,
    pub fee_from_quota: Amount,
    pub fee_from_wallet: Amount,
    pub fee_wallet_community_id: CommunityId,
}

/// Create a publication and charge the post fee.
pub fn create_publication(
    conn: &mut Connection,
    settings: &CommunitySettings,
    role: Role,
    context: &PermissionContext,
    draft: &PublicationDraft,
    now: u64,
) -> Result<PublicationReceipt> {
    log_unexpected(
        "create_publication",
        create_inner(conn, settings, role, context, draft, now),
    )
}

fn create_inner(
    conn: &mut Connection,
    settings: &CommunitySettings,
    role: Role,
    context: &PermissionContext,
    draft: &PublicationDraft,
    now: u64,
) -> Result<PublicationReceipt> {
    validate_draft(settings, draft)?;

    let ctx = PermissionContext {
        is_author: true,
        is_effective_beneficiary: draft
            .beneficiary_id
            .as_deref()
            .map_or(true, |b| b == draft.author_id),
        ..context.clone()
    };
    if let Decision::Denied(reason) =
        PermissionEngine::for_community(settings).evaluate(role, Action::CreatePublication, &ctx)
    {
        tracing::warn!(
            author = %draft.author_id,
            community = %settings.id,
            reason = reason.code(),
            "publication denied"
        );
        return Err(VotingError::Denied(reason));
    }

    let tx = merit_db::begin_write(conn)?;
    let plan = resolver::resolve_post_fee(&tx, settings, &draft.author_id, role, now)?;

    publications::insert(&tx, draft, now)?;
    quota::consume(
        &tx,
        settings,
        &draft.author_id,
        role,
        plan.quota_amount,
        UsageType::Publication,
        &draft.id,
        now,
    )?;

    let burn = Account::burn(&settings.id);
    let posting = Posting::new(TxKind::PostFee, &draft.id)
        .with_currency_label(&settings.currency_label)
        .transfer(
            Account::quota(&draft.author_id, &settings.id),
            burn.clone(),
            plan.quota_amount,
        )
        .transfer(
            Account::wallet(&draft.author_id, &plan.wallet_community_id),
            burn,
            plan.wallet_amount,
        );
    wallet::commit(&tx, &posting, now)?;

    let publication = publications::get(&tx, &draft.id)?;
    tx.commit()?;

    tracing::info!(
        publication = %publication.id,
        author = %publication.author_id,
        community = %settings.id,
        fee_quota = %plan.quota_amount,
        fee_wallet = %plan.wallet_amount,
        fee_wallet_community = %plan.wallet_community_id,
        "publication created"
    );

    Ok(PublicationReceipt {
        publication,
        fee_from_quota: plan.quota_amount,
        fee_from_wallet: plan.wallet_amount,
        fee_wallet_community_id: plan.wallet_community_id,
    })
}

fn validate_draft(settings: &CommunitySettings, draft: &PublicationDraft) -> Result<()> {
    if draft.id.is_empty() {
        return Err(VotingError::InvalidRequest("publication id is empty".to_string()));
    }
    if draft.community_id != settings.id {
        return Err(VotingError::InvalidRequest(format!(
            "draft targets community {}, settings are for {}",
            draft.community_id, settings.id
        )));
    }
    if draft.investor_share_percent > 100 {
        return Err(VotingError::InvalidRequest(format!(
            "investor share {}% exceeds 100%",
            draft.investor_share_percent
        )));
    }
    Ok(())
}
