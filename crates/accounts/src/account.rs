use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use regdesk_auth::Role;
use regdesk_core::{AccountId, DomainError, DomainResult, RegionId, require_text};

/// Input for [`Account::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub region_id: Option<RegionId>,
}

/// Persisted shape of an account (used for rehydration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub region_id: Option<RegionId>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// An account: the owner of participants, inscriptions and payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    username: String,
    name: String,
    email: Option<String>,
    role: Role,
    region_id: Option<RegionId>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl Account {
    pub fn create(input: NewAccount, now: DateTime<Utc>) -> DomainResult<Self> {
        let username = validate_username(&input.username)?;
        let name = require_text("name", &input.name)?;
        let email = input.email.as_deref().map(validate_email).transpose()?;

        if input.role.is_region_scoped() && input.region_id.is_none() {
            return Err(DomainError::validation("managers must belong to a region"));
        }

        Ok(Self {
            id: AccountId::new(),
            username,
            name,
            email,
            role: input.role,
            region_id: input.region_id,
            active: true,
            created_at: now,
        })
    }

    pub fn with(record: AccountRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            name: record.name,
            email: record.email,
            role: record.role,
            region_id: record.region_id,
            active: record.active,
            created_at: record.created_at,
        }
    }

    pub fn id_typed(&self) -> AccountId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn region_id(&self) -> Option<RegionId> {
        self.region_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn rename(&mut self, name: &str) -> DomainResult<()> {
        self.name = require_text("name", name)?;
        Ok(())
    }

    pub fn deactivate(&mut self) -> DomainResult<()> {
        if !self.active {
            return Err(DomainError::conflict("account is already inactive"));
        }
        self.active = false;
        Ok(())
    }
}

fn validate_username(raw: &str) -> DomainResult<String> {
    let username = raw.trim().to_lowercase();
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(DomainError::validation("username must have between 3 and 50 characters"));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("username cannot contain whitespace"));
    }
    Ok(username)
}

fn validate_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(DomainError::validation("email is invalid")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewAccount {
        NewAccount {
            username: "Maria.Silva".to_string(),
            name: "Maria Silva".to_string(),
            email: Some("Maria@Example.com".to_string()),
            role: Role::User,
            region_id: None,
        }
    }

    #[test]
    fn create_normalizes_username_and_email() {
        let account = Account::create(input(), Utc::now()).unwrap();
        assert_eq!(account.username(), "maria.silva");
        assert_eq!(account.email(), Some("maria@example.com"));
        assert!(account.is_active());
    }

    #[test]
    fn short_username_is_rejected() {
        let mut i = input();
        i.username = "ab".to_string();
        assert!(Account::create(i, Utc::now()).is_err());
    }

    #[test]
    fn username_with_spaces_is_rejected() {
        let mut i = input();
        i.username = "maria silva".to_string();
        assert!(Account::create(i, Utc::now()).is_err());
    }

    #[test]
    fn invalid_email_is_rejected() {
        let mut i = input();
        i.email = Some("maria@localhost".to_string());
        assert!(Account::create(i, Utc::now()).is_err());
    }

    #[test]
    fn manager_requires_region() {
        let mut i = input();
        i.role = Role::Manager;
        assert!(Account::create(i.clone(), Utc::now()).is_err());
        i.region_id = Some(RegionId::new());
        assert!(Account::create(i, Utc::now()).is_ok());
    }

    #[test]
    fn deactivate_twice_conflicts() {
        let mut account = Account::create(input(), Utc::now()).unwrap();
        account.deactivate().unwrap();
        assert!(matches!(account.deactivate(), Err(DomainError::Conflict(_))));
    }
}
