use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "payments.review").
/// The wildcard permission `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));
    pub const ACCOUNTS_WRITE: Permission = Permission(Cow::Borrowed("accounts.write"));
    pub const REGIONS_WRITE: Permission = Permission(Cow::Borrowed("regions.write"));
    pub const EVENTS_WRITE: Permission = Permission(Cow::Borrowed("events.write"));
    pub const INSCRIPTIONS_MANAGE: Permission = Permission(Cow::Borrowed("inscriptions.manage"));
    pub const PAYMENTS_CREATE: Permission = Permission(Cow::Borrowed("payments.create"));
    pub const PAYMENTS_REVIEW: Permission = Permission(Cow::Borrowed("payments.review"));
    pub const TICKETS_SELL: Permission = Permission(Cow::Borrowed("tickets.sell"));
    pub const FINANCE_READ: Permission = Permission(Cow::Borrowed("finance.read"));
    pub const FINANCE_WRITE: Permission = Permission(Cow::Borrowed("finance.write"));
    pub const REPORTS_READ: Permission = Permission(Cow::Borrowed("reports.read"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role → permission policy.
pub fn permissions_for_role(role: Role) -> Vec<Permission> {
    match role {
        Role::Super | Role::Admin => vec![Permission::WILDCARD],
        Role::Manager => vec![
            Permission::EVENTS_WRITE,
            Permission::INSCRIPTIONS_MANAGE,
            Permission::PAYMENTS_CREATE,
            Permission::PAYMENTS_REVIEW,
            Permission::TICKETS_SELL,
            Permission::FINANCE_READ,
            Permission::FINANCE_WRITE,
            Permission::REPORTS_READ,
        ],
        Role::User => vec![Permission::PAYMENTS_CREATE],
    }
}
