//! Permission rule data.
//!
//! Rules are read-only community configuration. Evaluation lives in
//! `merit-permissions`; this module only defines the shapes that travel
//! through configuration files and the request layer.

use serde::{Deserialize, Serialize};

use crate::identity::Role;

/// Action a member attempts inside a community.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreatePublication,
    EditPublication,
    DeletePublication,
    Comment,
    Vote,
    Withdraw,
    Invest,
    PlayTappalka,
    ViewCommunity,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::CreatePublication => "create_publication",
            Action::EditPublication => "edit_publication",
            Action::DeletePublication => "delete_publication",
            Action::Comment => "comment",
            Action::Vote => "vote",
            Action::Withdraw => "withdraw",
            Action::Invest => "invest",
            Action::PlayTappalka => "play_tappalka",
            Action::ViewCommunity => "view_community",
        }
    }
}

/// Named predicate over a [`PermissionContext`].
///
/// The set is closed so evaluation stays total and side-effect-free.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Actor authored the target resource.
    IsAuthor,
    /// Actor did not author the target resource.
    NotAuthor,
    /// Actor receives the target's withdrawals.
    IsEffectiveBeneficiary,
    /// Actor is a member of the resource's team.
    TeamOnly,
    /// Actor leads the resource's team.
    OnlyTeamLead,
    /// Target has no votes yet.
    NoVotes,
    /// Target has no comments yet.
    NoComments,
    /// Target was created at most this many minutes ago.
    CanEditAfterMinutes(u32),
    /// Target's author is not a lead.
    ParticipantsCannotVoteForLead,
    /// Target's author holds the given role.
    AuthorRole(Role),
}

/// Resource-derived facts pre-computed by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionContext {
    pub is_author: bool,
    pub is_effective_beneficiary: bool,
    pub is_team_member: bool,
    pub is_team_lead: bool,
    pub has_votes: bool,
    pub has_comments: bool,
    /// `None` when the action has no target resource.
    pub minutes_since_creation: Option<u64>,
    pub author_role: Option<Role>,
}

/// One `(role, action) -> allowed` rule, optionally narrowed by conditions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub role: Role,
    pub action: Action,
    pub allowed: bool,
    /// Conjunction. Empty = unconditional.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl PermissionRule {
    pub fn allow(role: Role, action: Action) -> Self {
        Self {
            role,
            action,
            allowed: true,
            conditions: Vec::new(),
        }
    }

    pub fn deny(role: Role, action: Action) -> Self {
        Self {
            role,
            action,
            allowed: false,
            conditions: Vec::new(),
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// Why an action was refused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum DenialReason {
    /// No rule exists for the role and action.
    NoMatchingRule,
    /// Rules exist but none has all of its conditions satisfied.
    NoApplicableRule,
    /// The most specific applicable rule denies.
    RuleDenied { conditions_matched: usize },
    /// The publication edit window has closed.
    EditWindowExpired { window_minutes: u32 },
    /// The publication already has votes or comments.
    HasInteractions,
    /// Editing by non-authors is disabled for the community.
    EditByOthersDisabled,
    /// Acting on one's own resource where that is structurally forbidden.
    SelfAction,
    /// Only the effective beneficiary may perform the action.
    NotBeneficiary,
    /// Community feature switched off (e.g. tappalka disabled).
    FeatureDisabled,
}

impl DenialReason {
    /// Stable machine-checkable code.
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::NoMatchingRule => "NO_MATCHING_RULE",
            DenialReason::NoApplicableRule => "NO_APPLICABLE_RULE",
            DenialReason::RuleDenied { .. } => "RULE_DENIED",
            DenialReason::EditWindowExpired { .. } => "EDIT_WINDOW_EXPIRED",
            DenialReason::HasInteractions => "HAS_INTERACTIONS",
            DenialReason::EditByOthersDisabled => "EDIT_BY_OTHERS_DISABLED",
            DenialReason::SelfAction => "SELF_ACTION",
            DenialReason::NotBeneficiary => "NOT_BENEFICIARY",
            DenialReason::FeatureDisabled => "FEATURE_DISABLED",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FORBIDDEN: {}", self.code())
    }
}

/// Outcome of a permission evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    Denied(DenialReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    /// Convert into a `Result` so callers can use `?`.
    pub fn into_result(self) -> Result<(), DenialReason> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Denied(reason) => Err(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_builder() {
        let rule = PermissionRule::allow(Role::Participant, Action::Vote)
            .when(Condition::NotAuthor)
            .when(Condition::ParticipantsCannotVoteForLead);
        assert!(rule.allowed);
        assert_eq!(rule.conditions.len(), 2);
    }

    #[test]
    fn test_rule_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            rules: Vec<PermissionRule>,
        }
        let parsed: Wrapper = toml::from_str(
            r#"
            [[rules]]
            role = "participant"
            action = "edit_publication"
            allowed = true
            conditions = ["is_author", { can_edit_after_minutes = 30 }]
            "#,
        )
        .expect("parse rules");
        assert_eq!(
            parsed.rules[0].conditions,
            vec![Condition::IsAuthor, Condition::CanEditAfterMinutes(30)]
        );
    }

    #[test]
    fn test_decision_into_result() {
        assert!(Decision::Allowed.into_result().is_ok());
        let denied = Decision::Denied(DenialReason::SelfAction);
        assert_eq!(denied.into_result(), Err(DenialReason::SelfAction));
        assert_eq!(DenialReason::SelfAction.to_string(), "FORBIDDEN: SELF_ACTION");
    }
}
