//! Per-community permission entry point.

use merit_types::community::{CommunitySettings, PostSettings};
use merit_types::identity::Role;
use merit_types::permission::{Action, Decision, PermissionContext, PermissionRule};

use crate::{edit, rules};

/// Evaluates actions against one community's rule table.
#[derive(Clone, Copy, Debug)]
pub struct PermissionEngine<'a> {
    community_id: &'a str,
    rules: &'a [PermissionRule],
    posts: &'a PostSettings,
}

impl<'a> PermissionEngine<'a> {
    pub fn new(community_id: &'a str, rules: &'a [PermissionRule], posts: &'a PostSettings) -> Self {
        Self {
            community_id,
            rules,
            posts,
        }
    }

    pub fn for_community(settings: &'a CommunitySettings) -> Self {
        Self::new(&settings.id, &settings.permission_rules, &settings.posts)
    }

    /// Decide whether `role` may perform `action` given `ctx`.
    pub fn evaluate(&self, role: Role, action: Action, ctx: &PermissionContext) -> Decision {
        let mut decision = rules::evaluate_rules(self.rules, role, action, ctx);
        if decision.is_allowed()
            && matches!(action, Action::EditPublication | Action::DeletePublication)
        {
            decision = edit::check_publication_change(self.posts, role, action, ctx);
        }

        match &decision {
            Decision::Allowed => tracing::debug!(
                community = self.community_id,
                role = role.as_str(),
                action = action.as_str(),
                "permission granted"
            ),
            Decision::Denied(reason) => tracing::debug!(
                community = self.community_id,
                role = role.as_str(),
                action = action.as_str(),
                reason = reason.code(),
                "permission denied"
            ),
        }
        decision
    }
}
