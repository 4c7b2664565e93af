//! Community configuration.
//!
//! Everything here is a read-only input to the engine: community admins
//! change it through community settings, the engine never writes it.

use serde::{Deserialize, Serialize};

use crate::amount::{merits_f64, Amount};
use crate::identity::Role;
use crate::permission::{Action, Condition, PermissionRule};
use crate::tappalka::TappalkaSettings;
use crate::{CommunityId, GLOBAL_COMMUNITY_ID};

/// Community type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunityType {
    Custom,
    Team,
    MarathonOfGood,
    FutureVision,
    Support,
    Global,
}

impl CommunityType {
    /// Priority communities spend global merits instead of a local currency.
    pub fn is_priority(self) -> bool {
        matches!(
            self,
            CommunityType::MarathonOfGood | CommunityType::FutureVision | CommunityType::Support
        )
    }
}

/// Which of a user's wallets funds an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletRoute {
    Global,
    Local,
}

/// Per-action wallet routing.
///
/// Kept as data rather than hard-coded per community type because the
/// global/local split has changed over the platform's history. Withdrawals
/// (always global) and tappalka rewards (always local) are business rules
/// and deliberately absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRouting {
    pub vote: WalletRoute,
    pub post_fee: WalletRoute,
    pub invest: WalletRoute,
}

impl CurrencyRouting {
    /// Default routing: priority communities use global merits throughout.
    pub fn for_type(community_type: CommunityType) -> Self {
        let route = if community_type.is_priority() || community_type == CommunityType::Global {
            WalletRoute::Global
        } else {
            WalletRoute::Local
        };
        Self {
            vote: route,
            post_fee: route,
            invest: route,
        }
    }
}

/// How the free daily allowance resets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaReset {
    /// Resets at 00:00 UTC.
    #[default]
    Calendar,
    /// Counts usage in the 24 hours ending now.
    Rolling,
}

/// Daily quota configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSettings {
    #[serde(with = "merits_f64", default = "default_daily_quota")]
    pub daily_quota: Amount,
    /// Roles that receive a daily quota. Others get zero.
    #[serde(default = "default_quota_recipients")]
    pub recipients: Vec<Role>,
    #[serde(default)]
    pub reset: QuotaReset,
}

/// Publication settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSettings {
    #[serde(with = "merits_f64", default = "default_post_cost")]
    pub post_cost: Amount,
    #[serde(default)]
    pub can_pay_post_from_quota: bool,
    /// 0 = unlimited.
    #[serde(default = "default_edit_window")]
    pub edit_window_minutes: u32,
    #[serde(default)]
    pub allow_edit_by_others: bool,
}

/// Complete settings for one community.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommunitySettings {
    pub id: CommunityId,
    pub community_type: CommunityType,
    #[serde(default = "default_currency_label")]
    pub currency_label: String,
    /// Overrides the type-derived routing when present.
    #[serde(default)]
    pub routing: Option<CurrencyRouting>,
    #[serde(default)]
    pub quota: QuotaSettings,
    #[serde(default)]
    pub posts: PostSettings,
    #[serde(default)]
    pub tappalka: TappalkaSettings,
    #[serde(default = "default_permission_rules")]
    pub permission_rules: Vec<PermissionRule>,
}

impl CommunitySettings {
    /// Settings with defaults for everything but id and type.
    pub fn new(id: impl Into<CommunityId>, community_type: CommunityType) -> Self {
        Self {
            id: id.into(),
            community_type,
            currency_label: default_currency_label(),
            routing: None,
            quota: QuotaSettings::default(),
            posts: PostSettings::default(),
            tappalka: TappalkaSettings::default(),
            permission_rules: default_permission_rules(),
        }
    }

    pub fn is_priority(&self) -> bool {
        self.community_type.is_priority()
    }

    /// Effective routing: explicit override or type default.
    pub fn routing(&self) -> CurrencyRouting {
        self.routing
            .unwrap_or_else(|| CurrencyRouting::for_type(self.community_type))
    }

    /// Resolve a route to the community id of the wallet it names.
    pub fn wallet_community(&self, route: WalletRoute) -> CommunityId {
        match route {
            WalletRoute::Global => GLOBAL_COMMUNITY_ID.to_string(),
            WalletRoute::Local => self.id.clone(),
        }
    }

    /// Daily quota for a role, zero for roles outside `quota.recipients`.
    pub fn daily_quota_for(&self, role: Role) -> Amount {
        if self.quota.recipients.contains(&role) {
            self.quota.daily_quota
        } else {
            Amount::ZERO
        }
    }
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            daily_quota: default_daily_quota(),
            recipients: default_quota_recipients(),
            reset: QuotaReset::default(),
        }
    }
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            post_cost: default_post_cost(),
            can_pay_post_from_quota: false,
            edit_window_minutes: default_edit_window(),
            allow_edit_by_others: false,
        }
    }
}

// Default value functions

fn default_daily_quota() -> Amount {
    Amount::from_merits(10)
}

fn default_quota_recipients() -> Vec<Role> {
    vec![Role::Superadmin, Role::Lead, Role::Participant]
}

fn default_post_cost() -> Amount {
    Amount::from_merits(1)
}

fn default_edit_window() -> u32 {
    30
}

fn default_currency_label() -> String {
    "merits".to_string()
}

/// Baseline rule table used when a community configures none.
pub fn default_permission_rules() -> Vec<PermissionRule> {
    let mut rules = Vec::new();
    for role in [Role::Superadmin, Role::Lead, Role::Participant, Role::Viewer] {
        rules.push(PermissionRule::allow(role, Action::ViewCommunity));
    }
    for role in [Role::Superadmin, Role::Lead, Role::Participant] {
        rules.push(PermissionRule::allow(role, Action::CreatePublication));
        rules.push(PermissionRule::allow(role, Action::Comment));
        rules.push(PermissionRule::allow(role, Action::EditPublication));
        rules.push(PermissionRule::allow(role, Action::PlayTappalka));
        rules.push(PermissionRule::allow(role, Action::Vote).when(Condition::NotAuthor));
        rules.push(PermissionRule::allow(role, Action::Invest).when(Condition::NotAuthor));
        rules.push(
            PermissionRule::allow(role, Action::Withdraw).when(Condition::IsEffectiveBeneficiary),
        );
    }
    rules.push(PermissionRule::allow(Role::Superadmin, Action::DeletePublication));
    rules.push(PermissionRule::allow(Role::Lead, Action::DeletePublication));
    rules.push(
        PermissionRule::allow(Role::Participant, Action::DeletePublication)
            .when(Condition::IsAuthor),
    );
    rules
}
