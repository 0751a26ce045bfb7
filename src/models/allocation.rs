use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::member::{DependentId, MemberId};
use super::resource::{EventId, FacilityId, ResourceRef};
use super::time::TimeRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStatus {
    Active,
    Cancelled,
}

impl AllocationStatus {
    pub fn is_active(&self) -> bool {
        match self {
            AllocationStatus::Active => true,
            AllocationStatus::Cancelled => false,
        }
    }
}

/// Запись на событие: участник и/или его иждивенцы.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRegistration {
    pub id: Uuid,
    pub event_id: EventId,
    pub member_id: MemberId,
    pub quantity: u32,
    #[serde(default)]
    pub dependent_ids: Vec<DependentId>,
    pub status: AllocationStatus,
}

impl EventRegistration {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Бронь площадки. Всегда ровно одно "место" на интервал.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityReservation {
    pub id: Uuid,
    pub facility_id: FacilityId,
    pub member_id: MemberId,
    #[serde(flatten)]
    pub interval: TimeRange,
    pub status: AllocationStatus,
}

impl FacilityReservation {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn quantity(&self) -> u32 {
        1
    }
}

/// Копия брони, как её видит клиент (только для чтения).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Allocation {
    Registration(EventRegistration),
    Reservation(FacilityReservation),
}

impl Allocation {
    pub fn id(&self) -> Uuid {
        match self {
            Allocation::Registration(r) => r.id,
            Allocation::Reservation(r) => r.id,
        }
    }

    pub fn resource_ref(&self) -> ResourceRef {
        match self {
            Allocation::Registration(r) => ResourceRef::Event(r.event_id),
            Allocation::Reservation(r) => ResourceRef::Facility(r.facility_id),
        }
    }

    pub fn member_id(&self) -> MemberId {
        match self {
            Allocation::Registration(r) => r.member_id,
            Allocation::Reservation(r) => r.member_id,
        }
    }

    pub fn status(&self) -> AllocationStatus {
        match self {
            Allocation::Registration(r) => r.status,
            Allocation::Reservation(r) => r.status,
        }
    }

    pub fn quantity(&self) -> u32 {
        match self {
            Allocation::Registration(r) => r.quantity,
            Allocation::Reservation(r) => r.quantity(),
        }
    }
}

/// Бронь, подтверждённая сервером в ответ на коммит.
///
/// Создаётся только шлюзом: клиентская арифметика вместимости
/// (`DisplayAvailability`) не может превратиться в этот тип.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoritativeAllocation(Allocation);

impl AuthoritativeAllocation {
    pub(crate) fn from_gateway(allocation: Allocation) -> Self {
        Self(allocation)
    }

    pub fn allocation(&self) -> &Allocation {
        &self.0
    }

    pub fn into_inner(self) -> Allocation {
        self.0
    }
}
