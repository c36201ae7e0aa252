use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use regdesk_core::{DomainError, DomainResult, Money, RegionId, define_id, require_text};

define_id!(
    /// Event identifier.
    EventId,
    "EventId"
);

/// Event status lifecycle.
///
/// `Open` ⇄ `Closed` → `Finalized` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Open,
    Closed,
    Finalized,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Open => "open",
            EventStatus::Closed => "closed",
            EventStatus::Finalized => "finalized",
        }
    }
}

impl core::str::FromStr for EventStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(EventStatus::Open),
            "closed" => Ok(EventStatus::Closed),
            "finalized" => Ok(EventStatus::Finalized),
            other => Err(DomainError::validation(format!("unknown event status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub region_id: RegionId,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub max_participants: Option<u32>,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub max_participants: Option<u32>,
    pub ticket_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub region_id: RegionId,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub status: EventStatus,
    pub payment_enabled: bool,
    pub ticket_enabled: bool,
    pub max_participants: Option<u32>,
    pub participants_count: u32,
    pub amount_collected: Money,
    pub created_at: DateTime<Utc>,
}

/// An event people register (inscribe) into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    region_id: RegionId,
    name: String,
    description: Option<String>,
    location: Option<String>,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
    status: EventStatus,
    payment_enabled: bool,
    ticket_enabled: bool,
    max_participants: Option<u32>,
    participants_count: u32,
    amount_collected: Money,
    created_at: DateTime<Utc>,
}

impl Event {
    pub fn create(input: NewEvent, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = require_text("name", &input.name)?;
        ensure_dates(input.starts_on, input.ends_on)?;
        if input.max_participants == Some(0) {
            return Err(DomainError::validation("max participants must be positive"));
        }

        Ok(Self {
            id: EventId::new(),
            region_id: input.region_id,
            name,
            description: input.description,
            location: input.location,
            starts_on: input.starts_on,
            ends_on: input.ends_on,
            status: EventStatus::Open,
            payment_enabled: false,
            ticket_enabled: false,
            max_participants: input.max_participants,
            participants_count: 0,
            amount_collected: Money::zero(),
            created_at: now,
        })
    }

    pub fn with(record: EventRecord) -> Self {
        Self {
            id: record.id,
            region_id: record.region_id,
            name: record.name,
            description: record.description,
            location: record.location,
            starts_on: record.starts_on,
            ends_on: record.ends_on,
            status: record.status,
            payment_enabled: record.payment_enabled,
            ticket_enabled: record.ticket_enabled,
            max_participants: record.max_participants,
            participants_count: record.participants_count,
            amount_collected: record.amount_collected,
            created_at: record.created_at,
        }
    }

    pub fn update(&mut self, changes: UpdateEvent) -> DomainResult<()> {
        self.ensure_not_finalized()?;

        let name = match changes.name {
            Some(n) => require_text("name", &n)?,
            None => self.name.clone(),
        };
        let starts_on = changes.starts_on.unwrap_or(self.starts_on);
        let ends_on = changes.ends_on.unwrap_or(self.ends_on);
        ensure_dates(starts_on, ends_on)?;

        if let Some(max) = changes.max_participants {
            if max == 0 {
                return Err(DomainError::validation("max participants must be positive"));
            }
            if max < self.participants_count {
                return Err(DomainError::conflict(format!(
                    "max participants ({max}) below current participants ({})",
                    self.participants_count
                )));
            }
            self.max_participants = Some(max);
        }

        self.name = name;
        self.starts_on = starts_on;
        self.ends_on = ends_on;
        if changes.description.is_some() {
            self.description = changes.description;
        }
        if changes.location.is_some() {
            self.location = changes.location;
        }
        if let Some(enabled) = changes.ticket_enabled {
            self.ticket_enabled = enabled;
        }
        Ok(())
    }

    /// Toggle whether the event accepts payments.
    pub fn set_payment_enabled(&mut self, enabled: bool) -> DomainResult<()> {
        self.ensure_not_finalized()?;
        self.payment_enabled = enabled;
        Ok(())
    }

    pub fn change_status(&mut self, status: EventStatus) -> DomainResult<()> {
        match (self.status, status) {
            (EventStatus::Finalized, _) => Err(DomainError::invariant("event is finalized")),
            (from, to) if from == to => Err(DomainError::conflict(format!("event is already {}", to.as_str()))),
            (_, EventStatus::Finalized) => {
                self.status = EventStatus::Finalized;
                self.payment_enabled = false;
                self.ticket_enabled = false;
                Ok(())
            }
            (_, to) => {
                self.status = to;
                Ok(())
            }
        }
    }

    /// Whether new inscriptions may be staged/confirmed on `today`.
    pub fn accepts_inscriptions(&self, today: NaiveDate) -> bool {
        self.status == EventStatus::Open && today <= self.ends_on
    }

    pub fn remaining_spots(&self) -> Option<u32> {
        self.max_participants
            .map(|max| max.saturating_sub(self.participants_count))
    }

    /// Reserve `n` participant spots; fails when capacity would be exceeded.
    pub fn reserve_spots(&mut self, n: u32) -> DomainResult<()> {
        if let Some(remaining) = self.remaining_spots() {
            if n > remaining {
                return Err(DomainError::conflict(format!(
                    "event has {remaining} spot(s) left, {n} requested"
                )));
            }
        }
        self.participants_count += n;
        Ok(())
    }

    /// Release `n` spots (saturating at zero).
    pub fn release_spots(&mut self, n: u32) {
        self.participants_count = self.participants_count.saturating_sub(n);
    }

    pub fn add_collected(&mut self, value: Money) -> DomainResult<()> {
        value.ensure_positive("collected value")?;
        self.amount_collected = self.amount_collected.checked_add(value)?;
        Ok(())
    }

    pub fn subtract_collected(&mut self, value: Money) -> DomainResult<()> {
        value.ensure_positive("collected value")?;
        if value > self.amount_collected {
            return Err(DomainError::invariant("collected amount cannot go negative"));
        }
        self.amount_collected = self.amount_collected.checked_sub(value)?;
        Ok(())
    }

    fn ensure_not_finalized(&self) -> DomainResult<()> {
        if self.status == EventStatus::Finalized {
            return Err(DomainError::invariant("event is finalized"));
        }
        Ok(())
    }

    pub fn id_typed(&self) -> EventId {
        self.id
    }

    pub fn region_id(&self) -> RegionId {
        self.region_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn starts_on(&self) -> NaiveDate {
        self.starts_on
    }

    pub fn ends_on(&self) -> NaiveDate {
        self.ends_on
    }

    pub fn status(&self) -> EventStatus {
        self.status
    }

    pub fn payment_enabled(&self) -> bool {
        self.payment_enabled
    }

    pub fn ticket_enabled(&self) -> bool {
        self.ticket_enabled
    }

    pub fn max_participants(&self) -> Option<u32> {
        self.max_participants
    }

    pub fn participants_count(&self) -> u32 {
        self.participants_count
    }

    pub fn amount_collected(&self) -> Money {
        self.amount_collected
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn ensure_dates(starts_on: NaiveDate, ends_on: NaiveDate) -> DomainResult<()> {
    if ends_on < starts_on {
        return Err(DomainError::validation("event cannot end before it starts"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_event(max: Option<u32>) -> Event {
        Event::create(
            NewEvent {
                region_id: RegionId::new(),
                name: "Retiro de Carnaval".to_string(),
                description: None,
                location: Some("Sítio".to_string()),
                starts_on: date(2026, 2, 14),
                ends_on: date(2026, 2, 17),
                max_participants: max,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn new_event_is_open_with_payments_disabled() {
        let e = new_event(None);
        assert_eq!(e.status(), EventStatus::Open);
        assert!(!e.payment_enabled());
        assert_eq!(e.amount_collected(), Money::zero());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let err = Event::create(
            NewEvent {
                region_id: RegionId::new(),
                name: "x".to_string(),
                description: None,
                location: None,
                starts_on: date(2026, 2, 14),
                ends_on: date(2026, 2, 13),
                max_participants: None,
            },
            Utc::now(),
        );
        assert!(matches!(err, Err(DomainError::Validation(_))));
    }

    #[test]
    fn accepts_inscriptions_until_last_day_while_open() {
        let mut e = new_event(None);
        assert!(e.accepts_inscriptions(date(2026, 2, 17)));
        assert!(!e.accepts_inscriptions(date(2026, 2, 18)));
        e.change_status(EventStatus::Closed).unwrap();
        assert!(!e.accepts_inscriptions(date(2026, 2, 1)));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut e = new_event(Some(3));
        e.reserve_spots(2).unwrap();
        assert!(matches!(e.reserve_spots(2), Err(DomainError::Conflict(_))));
        e.reserve_spots(1).unwrap();
        assert_eq!(e.remaining_spots(), Some(0));
        e.release_spots(5);
        assert_eq!(e.participants_count(), 0);
    }

    #[test]
    fn finalized_event_is_terminal() {
        let mut e = new_event(None);
        e.set_payment_enabled(true).unwrap();
        e.change_status(EventStatus::Finalized).unwrap();
        assert!(!e.payment_enabled());
        assert!(e.change_status(EventStatus::Open).is_err());
        assert!(e.set_payment_enabled(true).is_err());
        assert!(e.update(UpdateEvent::default()).is_err());
    }

    #[test]
    fn same_status_change_conflicts() {
        let mut e = new_event(None);
        assert!(matches!(e.change_status(EventStatus::Open), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn update_cannot_shrink_below_current_participants() {
        let mut e = new_event(Some(10));
        e.reserve_spots(5).unwrap();
        let err = e.update(UpdateEvent {
            max_participants: Some(4),
            ..Default::default()
        });
        assert!(matches!(err, Err(DomainError::Conflict(_))));
        assert_eq!(e.max_participants(), Some(10));
    }

    #[test]
    fn collected_amount_never_negative() {
        let mut e = new_event(None);
        e.add_collected(Money::from_cents(1_000)).unwrap();
        assert!(e.subtract_collected(Money::from_cents(1_001)).is_err());
        e.subtract_collected(Money::from_cents(1_000)).unwrap();
        assert!(e.amount_collected().is_zero());
    }

    proptest! {
        #[test]
        fn reserved_spots_never_exceed_capacity(max in 1u32..200, requests in prop::collection::vec(1u32..20, 1..30)) {
            let mut e = new_event(Some(max));
            for r in requests {
                let _ = e.reserve_spots(r);
                prop_assert!(e.participants_count() <= max);
            }
        }
    }
}
