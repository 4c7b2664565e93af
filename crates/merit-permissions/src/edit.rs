//! Time-boxed publication changes.
//!
//! Applied on top of an allowing rule for `edit_publication` or
//! `delete_publication`:
//!
//! - Leads and superadmins bypass the window and the interaction check.
//! - Everyone else needs a publication with no votes and no comments,
//!   within `edit_window_minutes` of creation (0 = unlimited).
//! - Non-authors additionally need `allow_edit_by_others`, for deletes as
//!   well as edits.

use merit_types::community::PostSettings;
use merit_types::identity::Role;
use merit_types::permission::{Action, Decision, DenialReason, PermissionContext};

/// Whether the edit window is still open for `ctx`.
///
/// A missing creation age counts as outside a bounded window.
pub fn within_window(posts: &PostSettings, ctx: &PermissionContext) -> bool {
    if posts.edit_window_minutes == 0 {
        return true;
    }
    ctx.minutes_since_creation
        .is_some_and(|minutes| minutes <= u64::from(posts.edit_window_minutes))
}

/// Apply the publication change rule to an action the rule table allowed.
pub fn check_publication_change(
    posts: &PostSettings,
    role: Role,
    action: Action,
    ctx: &PermissionContext,
) -> Decision {
    if role.is_elevated() {
        return Decision::Allowed;
    }

    debug_assert!(matches!(
        action,
        Action::EditPublication | Action::DeletePublication
    ));
    if !ctx.is_author && !posts.allow_edit_by_others {
        return Decision::Denied(DenialReason::EditByOthersDisabled);
    }

    if !within_window(posts, ctx) {
        return Decision::Denied(DenialReason::EditWindowExpired {
            window_minutes: posts.edit_window_minutes,
        });
    }

    if ctx.has_votes || ctx.has_comments {
        return Decision::Denied(DenialReason::HasInteractions);
    }

    Decision::Allowed
}
