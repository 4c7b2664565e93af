//! Member roles within a community.

use serde::{Deserialize, Serialize};

/// Role of a user inside a community.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Superadmin,
    Lead,
    Participant,
    Viewer,
}

impl Role {
    /// Elevated roles bypass the publication edit window and the
    /// no-interaction requirement.
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Superadmin | Role::Lead)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Lead => "lead",
            Role::Participant => "participant",
            Role::Viewer => "viewer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevated_roles() {
        assert!(Role::Superadmin.is_elevated());
        assert!(Role::Lead.is_elevated());
        assert!(!Role::Participant.is_elevated());
        assert!(!Role::Viewer.is_elevated());
    }

    #[test]
    fn test_role_serde() {
        let json = serde_json::to_string(&Role::Superadmin).expect("serialize");
        assert_eq!(json, "\"superadmin\"");
        let role: Role = serde_json::from_str("\"participant\"").expect("parse");
        assert_eq!(role, Role::Participant);
    }
}
