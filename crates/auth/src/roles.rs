use serde::{Deserialize, Serialize};

/// Role carried in the access token.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Super,
    Admin,
    Manager,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Super => "super",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }

    /// Staff roles act on other accounts' records (review payments, list inscriptions).
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::User)
    }

    /// Staff roles whose reach is limited to their own region.
    pub fn is_region_scoped(&self) -> bool {
        matches!(self, Role::Manager)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Role {
    type Err = regdesk_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "super" => Ok(Role::Super),
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "user" => Ok(Role::User),
            other => Err(regdesk_core::DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}
