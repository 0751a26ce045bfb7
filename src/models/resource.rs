use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::time::hhmm;

pub type EventId = i64;
pub type FacilityId = i64;

/// Ссылка на бронируемый ресурс. Событие и площадка живут в разных
/// пространствах id, поэтому голый `i64` здесь не годится.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ResourceRef {
    Event(EventId),
    Facility(FacilityId),
}

impl ResourceRef {
    pub fn id(&self) -> i64 {
        match self {
            ResourceRef::Event(id) | ResourceRef::Facility(id) => *id,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Event(id) => write!(f, "event:{}", id),
            ResourceRef::Facility(id) => write!(f, "facility:{}", id),
        }
    }
}

/// Событие с квотой мест.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResource {
    pub id: EventId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    // None = сервер не прислал квоту, это битый ресурс
    #[serde(default)]
    pub total_spots: Option<u32>,
}

impl EventResource {
    /// Событие доступно для записи, пока его дата не прошла.
    pub fn is_bookable_on(&self, today: NaiveDate) -> bool {
        self.date >= today
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FacilityStatus {
    Active,
    Inactive,
    Maintenance,
}

impl FacilityStatus {
    pub fn is_bookable(&self) -> bool {
        match self {
            FacilityStatus::Active => true,
            FacilityStatus::Inactive | FacilityStatus::Maintenance => false,
        }
    }
}

/// Площадка с часами работы; бронируется интервалами времени.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityResource {
    pub id: FacilityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: FacilityStatus,
    #[serde(with = "hhmm")]
    pub open_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub close_time: NaiveTime,
    pub max_duration_minutes: u32,
}
