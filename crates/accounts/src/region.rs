use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use regdesk_core::{DomainResult, RegionId, require_text};

/// Organizational region; events and cash registers belong to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    id: RegionId,
    name: String,
    created_at: DateTime<Utc>,
}

impl Region {
    pub fn create(name: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: RegionId::new(),
            name: require_text("name", name)?,
            created_at: now,
        })
    }

    pub fn with(id: RegionId, name: String, created_at: DateTime<Utc>) -> Self {
        Self { id, name, created_at }
    }

    pub fn id_typed(&self) -> RegionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
