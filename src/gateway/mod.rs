//! Граница с внешним API бронирований.
//!
//! Конфликты решает только сервер. Всё, что здесь возвращает `Ok`,
//! авторитетно; посчитанное клиентом не авторитетно.

pub mod rest;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{
    AuthoritativeAllocation, DependentId, EventRegistration, EventResource, FacilityReservation,
    FacilityResource, MemberId, ResourceRef, TimeRange,
};

pub use rest::RestBookingGateway;

/// Таксономия ошибок, которую видит пользователь.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// 400/422: битый интервал, неположительное количество и т.п.
    #[error("validation failed: {0}")]
    Validation(String),
    /// 404: ресурс или участник исчез между загрузкой и коммитом.
    #[error("resource or requester not found")]
    NotFound,
    /// 409: сервер обнаружил пересечение/переполнение.
    #[error("capacity conflict: {0}")]
    Conflict(String),
    /// 401: сессия истекла, обрабатывается глобально.
    #[error("session expired")]
    Unauthorized,
    /// 5xx.
    #[error("server error: {0}")]
    Server(String),
    /// Сеть недоступна или таймаут транспорта.
    #[error("network error: {0}")]
    Network(String),
}

impl BookingError {
    /// Текст тоста для пользователя.
    pub fn user_message(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "Проверьте введённые данные",
            BookingError::NotFound => "Ресурс или участник больше не найден, данные обновлены",
            BookingError::Conflict(_) => "Выбранное место или время уже занято, данные обновлены",
            BookingError::Unauthorized => "Сессия истекла, войдите снова",
            BookingError::Server(_) | BookingError::Network(_) => {
                "Не удалось выполнить операцию, попробуйте позже"
            }
        }
    }
}

impl From<ValidationErrors> for BookingError {
    fn from(errors: ValidationErrors) -> Self {
        BookingError::Validation(errors.to_string())
    }
}

/// Текущее состояние ресурса вместе с его бронями.
///
/// Копия только для чтения: устаревает сразу после загрузки.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSnapshot {
    Event {
        resource: EventResource,
        registrations: Vec<EventRegistration>,
    },
    Facility {
        resource: FacilityResource,
        date: NaiveDate,
        reservations: Vec<FacilityReservation>,
    },
}

impl ResourceSnapshot {
    pub fn resource_ref(&self) -> ResourceRef {
        match self {
            ResourceSnapshot::Event { resource, .. } => ResourceRef::Event(resource.id),
            ResourceSnapshot::Facility { resource, .. } => ResourceRef::Facility(resource.id),
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            ResourceSnapshot::Event { .. } => None,
            ResourceSnapshot::Facility { date, .. } => Some(*date),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceSnapshot::Event { resource, .. } => &resource.name,
            ResourceSnapshot::Facility { resource, .. } => &resource.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: u32,
    pub dependent_ids: Vec<DependentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPayload {
    #[serde(flatten)]
    #[validate(custom(function = "validate_reservation_interval"))]
    pub interval: TimeRange,
}

fn validate_reservation_interval(interval: &TimeRange) -> Result<(), ValidationError> {
    if !interval.is_minute_aligned() {
        return Err(ValidationError::new("interval_not_minute_aligned"));
    }
    Ok(())
}

/// Тело коммита create/update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationPayload {
    Registration(RegistrationPayload),
    Reservation(ReservationPayload),
}

impl AllocationPayload {
    /// Проверка до отправки: сервер не должен видеть заведомо битых запросов.
    pub fn validate(&self) -> Result<(), BookingError> {
        match self {
            AllocationPayload::Registration(p) => p.validate()?,
            AllocationPayload::Reservation(p) => p.validate()?,
        }
        Ok(())
    }

    pub fn matches(&self, resource: ResourceRef) -> bool {
        matches!(
            (self, resource),
            (AllocationPayload::Registration(_), ResourceRef::Event(_))
                | (AllocationPayload::Reservation(_), ResourceRef::Facility(_))
        )
    }
}

#[async_trait]
pub trait BookingGateway: Send + Sync {
    /// `date` обязателен для площадок и игнорируется для событий.
    async fn fetch_resource_with_allocations(
        &self,
        resource: ResourceRef,
        date: Option<NaiveDate>,
    ) -> Result<ResourceSnapshot, BookingError>;

    async fn create_allocation(
        &self,
        resource: ResourceRef,
        requester: MemberId,
        payload: &AllocationPayload,
    ) -> Result<AuthoritativeAllocation, BookingError>;

    async fn update_allocation(
        &self,
        resource: ResourceRef,
        requester: MemberId,
        payload: &AllocationPayload,
    ) -> Result<AuthoritativeAllocation, BookingError>;

    /// Мягкая отмена (status = CANCELLED). Повторная отмена -> `NotFound`.
    async fn cancel_allocation(
        &self,
        resource: ResourceRef,
        requester: MemberId,
    ) -> Result<(), BookingError>;
}

/// Списки ресурсов для каталога.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_events(&self) -> Result<Vec<EventResource>, BookingError>;

    async fn list_facilities(&self) -> Result<Vec<FacilityResource>, BookingError>;
}
