//! Rule matching.
//!
//! For a `(role, action)` pair:
//!
//! 1. No rule at all: deny (`NoMatchingRule`).
//! 2. Rules whose conditions are not all satisfied are skipped, they do not
//!    deny. If none remain: deny (`NoApplicableRule`).
//! 3. Among the applicable rules the one with the most conditions wins. If
//!    equally specific rules disagree, deny.

use merit_types::identity::Role;
use merit_types::permission::{
    Action, Condition, Decision, DenialReason, PermissionContext, PermissionRule,
};

use crate::{PermissionError, Result};

/// Whether a single condition holds for `ctx`.
pub fn condition_holds(condition: &Condition, ctx: &PermissionContext) -> bool {
    match condition {
        Condition::IsAuthor => ctx.is_author,
        Condition::NotAuthor => !ctx.is_author,
        Condition::IsEffectiveBeneficiary => ctx.is_effective_beneficiary,
        Condition::TeamOnly => ctx.is_team_member,
        Condition::OnlyTeamLead => ctx.is_team_lead,
        Condition::NoVotes => !ctx.has_votes,
        Condition::NoComments => !ctx.has_comments,
        Condition::CanEditAfterMinutes(0) => true,
        Condition::CanEditAfterMinutes(limit) => ctx
            .minutes_since_creation
            .is_some_and(|minutes| minutes <= u64::from(*limit)),
        Condition::ParticipantsCannotVoteForLead => ctx.author_role != Some(Role::Lead),
        Condition::AuthorRole(role) => ctx.author_role == Some(*role),
    }
}

/// Whether every condition of `rule` holds (conjunction).
pub fn rule_applies(rule: &PermissionRule, ctx: &PermissionContext) -> bool {
    rule.conditions.iter().all(|c| condition_holds(c, ctx))
}

/// Evaluate the rule table for `(role, action)`.
pub fn evaluate_rules(
    rules: &[PermissionRule],
    role: Role,
    action: Action,
    ctx: &PermissionContext,
) -> Decision {
    let mut matched = false;
    let mut best: Option<(usize, bool)> = None;

    for rule in rules.iter().filter(|r| r.role == role && r.action == action) {
        matched = true;
        if !rule_applies(rule, ctx) {
            continue;
        }
        let specificity = rule.conditions.len();
        best = match best {
            None => Some((specificity, rule.allowed)),
            Some((current, _)) if specificity > current => Some((specificity, rule.allowed)),
            Some((current, allowed)) if specificity == current => {
                Some((current, allowed && rule.allowed))
            }
            keep => keep,
        };
    }

    match (matched, best) {
        (false, _) => Decision::Denied(DenialReason::NoMatchingRule),
        (true, None) => Decision::Denied(DenialReason::NoApplicableRule),
        (true, Some((_, true))) => Decision::Allowed,
        (true, Some((specificity, false))) => Decision::Denied(DenialReason::RuleDenied {
            conditions_matched: specificity,
        }),
    }
}

/// Reject rule tables that contain rules which can never apply, or equally
/// specific rules with identical conditions and opposite outcomes.
pub fn validate_rules(rules: &[PermissionRule]) -> Result<()> {
    for rule in rules {
        let has = |c: Condition| rule.conditions.contains(&c);
        if has(Condition::IsAuthor) && has(Condition::NotAuthor) {
            return Err(PermissionError::ContradictoryConditions {
                role: rule.role.as_str(),
                action: rule.action.as_str(),
                detail: "is_author and not_author".to_string(),
            });
        }
        let author_roles: Vec<Role> = rule
            .conditions
            .iter()
            .filter_map(|c| match c {
                Condition::AuthorRole(role) => Some(*role),
                _ => None,
            })
            .collect();
        if author_roles.windows(2).any(|pair| pair[0] != pair[1]) {
            return Err(PermissionError::ContradictoryConditions {
                role: rule.role.as_str(),
                action: rule.action.as_str(),
                detail: "multiple author roles".to_string(),
            });
        }
    }

    for (i, a) in rules.iter().enumerate() {
        for b in &rules[i + 1..] {
            if a.role == b.role
                && a.action == b.action
                && a.allowed != b.allowed
                && same_conditions(&a.conditions, &b.conditions)
            {
                return Err(PermissionError::ConflictingRules {
                    role: a.role.as_str(),
                    action: a.action.as_str(),
                });
            }
        }
    }
    Ok(())
}

fn same_conditions(a: &[Condition], b: &[Condition]) -> bool {
    a.len() == b.len() && a.iter().all(|c| b.contains(c)) && b.iter().all(|c| a.contains(c))
}
