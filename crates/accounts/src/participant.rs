use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use regdesk_core::{AccountId, DomainError, DomainResult, define_id, require_text};

define_id!(
    /// Identifier of a reusable participant profile.
    AccountParticipantId,
    "AccountParticipantId"
);

/// Participant gender as collected on registration forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl core::str::FromStr for Gender {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "m" | "male" | "masculino" => Ok(Gender::Male),
            "f" | "female" | "feminino" => Ok(Gender::Female),
            other => Err(DomainError::validation(format!("unknown gender '{other}'"))),
        }
    }
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccountParticipant {
    pub name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub document: Option<String>,
    pub phone: Option<String>,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAccountParticipant {
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub document: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountParticipantRecord {
    pub id: AccountParticipantId,
    pub account_id: AccountId,
    pub name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub document: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A member profile belonging to an account, reusable across events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountParticipant {
    id: AccountParticipantId,
    account_id: AccountId,
    name: String,
    birth_date: NaiveDate,
    gender: Gender,
    document: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl AccountParticipant {
    pub fn create(account_id: AccountId, input: NewAccountParticipant, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = require_text("name", &input.name)?;
        ensure_birth_date(input.birth_date, now.date_naive())?;

        Ok(Self {
            id: AccountParticipantId::new(),
            account_id,
            name,
            birth_date: input.birth_date,
            gender: input.gender,
            document: normalize_optional(input.document),
            phone: normalize_optional(input.phone),
            created_at: now,
        })
    }

    pub fn with(record: AccountParticipantRecord) -> Self {
        Self {
            id: record.id,
            account_id: record.account_id,
            name: record.name,
            birth_date: record.birth_date,
            gender: record.gender,
            document: record.document,
            phone: record.phone,
            created_at: record.created_at,
        }
    }

    pub fn update(&mut self, changes: UpdateAccountParticipant, today: NaiveDate) -> DomainResult<()> {
        let name = match changes.name {
            Some(n) => require_text("name", &n)?,
            None => self.name.clone(),
        };
        let birth_date = changes.birth_date.unwrap_or(self.birth_date);
        ensure_birth_date(birth_date, today)?;

        self.name = name;
        self.birth_date = birth_date;
        if let Some(g) = changes.gender {
            self.gender = g;
        }
        if changes.document.is_some() {
            self.document = normalize_optional(changes.document);
        }
        if changes.phone.is_some() {
            self.phone = normalize_optional(changes.phone);
        }
        Ok(())
    }

    /// Completed years of age on `date`.
    pub fn age_on(&self, date: NaiveDate) -> u32 {
        age_on(self.birth_date, date)
    }

    pub fn id_typed(&self) -> AccountParticipantId {
        self.id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn birth_date(&self) -> NaiveDate {
        self.birth_date
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Completed years between `birth_date` and `date` (0 if `date` precedes it).
pub fn age_on(birth_date: NaiveDate, date: NaiveDate) -> u32 {
    if date < birth_date {
        return 0;
    }
    let mut years = date.year() - birth_date.year();
    if (date.month(), date.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

fn ensure_birth_date(birth_date: NaiveDate, today: NaiveDate) -> DomainResult<()> {
    if birth_date > today {
        return Err(DomainError::validation("birth date cannot be in the future"));
    }
    Ok(())
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input() -> NewAccountParticipant {
        NewAccountParticipant {
            name: "João".to_string(),
            birth_date: date(2010, 6, 15),
            gender: Gender::Male,
            document: Some("  ".to_string()),
            phone: Some(" 11 99999-0000 ".to_string()),
        }
    }

    #[test]
    fn create_trims_optional_fields() {
        let p = AccountParticipant::create(AccountId::new(), input(), Utc::now()).unwrap();
        assert_eq!(p.document(), None);
        assert_eq!(p.phone(), Some("11 99999-0000"));
    }

    #[test]
    fn future_birth_date_is_rejected() {
        let mut i = input();
        i.birth_date = Utc::now().date_naive() + chrono::Duration::days(1);
        assert!(AccountParticipant::create(AccountId::new(), i, Utc::now()).is_err());
    }

    #[test]
    fn update_keeps_unspecified_fields() {
        let mut p = AccountParticipant::create(AccountId::new(), input(), Utc::now()).unwrap();
        p.update(
            UpdateAccountParticipant {
                gender: Some(Gender::Female),
                ..Default::default()
            },
            Utc::now().date_naive(),
        )
        .unwrap();
        assert_eq!(p.name(), "João");
        assert_eq!(p.gender(), Gender::Female);
    }

    #[test]
    fn update_rejects_blank_name() {
        let mut p = AccountParticipant::create(AccountId::new(), input(), Utc::now()).unwrap();
        let err = p.update(
            UpdateAccountParticipant {
                name: Some(" ".to_string()),
                ..Default::default()
            },
            Utc::now().date_naive(),
        );
        assert!(err.is_err());
        assert_eq!(p.name(), "João");
    }

    #[test]
    fn age_counts_completed_years() {
        assert_eq!(age_on(date(2010, 6, 15), date(2020, 6, 14)), 9);
        assert_eq!(age_on(date(2010, 6, 15), date(2020, 6, 15)), 10);
        assert_eq!(age_on(date(2010, 6, 15), date(2001, 1, 1)), 0);
    }

    #[test]
    fn gender_accepts_portuguese_and_short_forms() {
        assert_eq!("F".parse::<Gender>().unwrap(), Gender::Female);
        assert_eq!("masculino".parse::<Gender>().unwrap(), Gender::Male);
        assert!("x".parse::<Gender>().is_err());
    }

    proptest! {
        #[test]
        fn age_never_exceeds_year_difference(y in 1950i32..2020, m in 1u32..13, d in 1u32..29, later in 0i64..30_000) {
            let birth = date(y, m, d);
            let on = birth + chrono::Duration::days(later);
            let age = age_on(birth, on);
            prop_assert!(age as i32 <= on.year() - birth.year());
        }
    }
}
