//! capacity.rs
//!
//! Расчёт свободной вместимости для отображения и блокировки элементов UI.
//!
//! Модель не делает I/O и ничего не "разрешает": подтвердить бронь может
//! только ответ шлюза. Результаты здесь имеют тип `DisplayAvailability`, их нельзя
//! превратить в `AuthoritativeAllocation`.
//!
//! Бизнес-нарушения (нет мест, слот занят) возвращаются как сигналы
//! (`QuantityRejection`, `IntervalRejection`). Битые входные данные
//! (нет квоты, перевёрнутые часы работы) сразу дают `CapacityError`, без
//! молчаливого исправления.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use crate::models::{
    EventId, EventRegistration, EventResource, FacilityId, FacilityReservation, FacilityResource,
    LocalClock, TimeRange,
};

/// Некорректный ресурс. Это ошибка программы/данных, а не пользователя.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapacityError {
    #[error("event {0} has no total spots")]
    MissingTotalSpots(EventId),
    #[error("facility {id}: open time {open} is not before close time {close}")]
    InvertedHours {
        id: FacilityId,
        open: chrono::NaiveTime,
        close: chrono::NaiveTime,
    },
    #[error("facility {0}: max duration must be positive")]
    ZeroMaxDuration(FacilityId),
    #[error("registration belongs to event {actual}, expected {expected}")]
    ForeignAllocation { expected: EventId, actual: EventId },
}

/// Занятость события: `available` никогда не бывает отрицательным.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventAvailability {
    pub total: u32,
    pub occupied: u32,
    pub available: u32,
}

impl EventAvailability {
    pub fn is_full(&self) -> bool {
        self.available == 0
    }

    pub fn is_over_allocated(&self) -> bool {
        self.occupied > self.total
    }
}

/// Свободные интервалы площадки на дату.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilityAvailability {
    pub date: NaiveDate,
    pub window: TimeRange,
    pub max_duration_minutes: u32,
    pub slots: Vec<TimeRange>,
}

impl FacilityAvailability {
    pub fn slot_containing(&self, interval: &TimeRange) -> Option<&TimeRange> {
        self.slots.iter().find(|slot| slot.contains(interval))
    }
}

/// Производная картинка вместимости, только для показа и блокировок UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayAvailability {
    Event(EventAvailability),
    Facility(FacilityAvailability),
}

impl DisplayAvailability {
    pub fn as_event(&self) -> Option<&EventAvailability> {
        match self {
            DisplayAvailability::Event(a) => Some(a),
            DisplayAvailability::Facility(_) => None,
        }
    }

    pub fn as_facility(&self) -> Option<&FacilityAvailability> {
        match self {
            DisplayAvailability::Event(_) => None,
            DisplayAvailability::Facility(a) => Some(a),
        }
    }
}

/// Почему новое количество нельзя выставить.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantityRejection {
    #[error("количество должно быть не меньше 1")]
    Zero,
    #[error("в записи {dependents} иждивенцев, количество не может быть меньше")]
    BelowDependents { dependents: u32 },
    #[error("запрошено {requested}, доступно не более {max}")]
    ExceedsCapacity { requested: u32, max: u32 },
    #[error("отменённую запись нельзя изменить")]
    NotEditable,
    #[error(transparent)]
    Malformed(#[from] CapacityError),
}

/// Почему выбранный интервал площадки недопустим.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntervalRejection {
    #[error("интервал не выровнен по минутам")]
    NotMinuteAligned,
    #[error("интервал длиннее {max_minutes} минут")]
    TooLong { max_minutes: u32 },
    #[error("интервал не помещается в свободный слот")]
    OutsideOpenSlots,
    #[error(transparent)]
    Malformed(#[from] CapacityError),
}

/// Допустимые границы для степпера количества.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityBounds {
    pub min: u32,
    pub max: u32,
}

impl QuantityBounds {
    pub fn allows(&self, quantity: u32) -> bool {
        self.min <= quantity && quantity <= self.max
    }

    pub fn can_increment(&self, current: u32) -> bool {
        current < self.max
    }

    pub fn can_decrement(&self, current: u32) -> bool {
        current > self.min
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityModel {
    clock: LocalClock,
}

impl CapacityModel {
    pub fn new(clock: LocalClock) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &LocalClock {
        &self.clock
    }

    /// `occupied = Σ quantity` по активным записям, `available = max(0, total − occupied)`.
    pub fn compute_event_availability(
        resource: &EventResource,
        registrations: &[EventRegistration],
    ) -> Result<EventAvailability, CapacityError> {
        let total = resource.total_spots.ok_or(CapacityError::MissingTotalSpots(resource.id))?;

        let mut occupied: u32 = 0;
        for registration in registrations.iter().filter(|r| r.is_active()) {
            if registration.event_id != resource.id {
                return Err(CapacityError::ForeignAllocation {
                    expected: resource.id,
                    actual: registration.event_id,
                });
            }
            occupied = occupied.saturating_add(registration.quantity);
        }

        if occupied > total {
            // Сервер временно несогласован (например, квоту урезали вручную).
            // Показываем 0, но оставляем след в логах.
            warn!(
                "Event {} is over-allocated: {} occupied of {} spots",
                resource.id, occupied, total
            );
        }

        Ok(EventAvailability { total, occupied, available: total.saturating_sub(occupied) })
    }

    /// Вычитание активных броней из окна `[open, close)` на дату.
    ///
    /// Границы слотов совпадают с границами броней (никакой сетки),
    /// пустые слоты не возвращаются. Брони других дней и площадок, а также
    /// отменённые, не учитываются.
    pub fn compute_facility_slots(
        &self,
        resource: &FacilityResource,
        reservations: &[FacilityReservation],
        date: NaiveDate,
    ) -> Result<FacilityAvailability, CapacityError> {
        let window = self.operating_window(resource, date)?;

        let mut busy: Vec<TimeRange> = reservations
            .iter()
            .filter(|r| r.is_active() && r.facility_id == resource.id)
            .filter_map(|r| r.interval.clip(&window))
            .collect();
        busy.sort_by_key(|range| (range.start, range.end));

        let mut slots = Vec::new();
        let mut cursor = window.start;
        for range in busy {
            if let Some(gap) = TimeRange::new(cursor, range.start) {
                slots.push(gap);
            }
            cursor = cursor.max(range.end);
        }
        if let Some(tail) = TimeRange::new(cursor, window.end) {
            slots.push(tail);
        }

        Ok(FacilityAvailability {
            date,
            window,
            max_duration_minutes: resource.max_duration_minutes,
            slots,
        })
    }

    /// Окно работы площадки на дату. Проверяет инварианты ресурса.
    pub fn operating_window(
        &self,
        resource: &FacilityResource,
        date: NaiveDate,
    ) -> Result<TimeRange, CapacityError> {
        if resource.max_duration_minutes == 0 {
            return Err(CapacityError::ZeroMaxDuration(resource.id));
        }
        let inverted = CapacityError::InvertedHours {
            id: resource.id,
            open: resource.open_time,
            close: resource.close_time,
        };
        if resource.open_time >= resource.close_time {
            return Err(inverted);
        }
        self.clock
            .day_window(date, resource.open_time, resource.close_time)
            .ok_or(inverted)
    }

    /// Границы степпера при изменении записи.
    ///
    /// `available`: текущая свободная вместимость, в которой редактируемая
    /// запись ещё считается занятой. Сначала исключаем её из занятых:
    /// максимум = `available + old_quantity`. Минимум не ниже числа
    /// иждивенцев в записи: они остаются в брони.
    pub fn quantity_bounds(
        resource: &EventResource,
        allocation: &EventRegistration,
        available: u32,
    ) -> Result<QuantityBounds, QuantityRejection> {
        resource.total_spots.ok_or(CapacityError::MissingTotalSpots(resource.id))?;
        if allocation.event_id != resource.id {
            return Err(CapacityError::ForeignAllocation {
                expected: resource.id,
                actual: allocation.event_id,
            }
            .into());
        }
        if !allocation.is_active() {
            return Err(QuantityRejection::NotEditable);
        }
        let dependents = u32::try_from(allocation.dependent_ids.len()).unwrap_or(u32::MAX);
        Ok(QuantityBounds {
            min: dependents.max(1),
            max: available.saturating_add(allocation.quantity),
        })
    }

    pub fn validate_quantity_change(
        resource: &EventResource,
        allocation: &EventRegistration,
        new_quantity: u32,
        available: u32,
    ) -> Result<(), QuantityRejection> {
        let bounds = Self::quantity_bounds(resource, allocation, available)?;
        if new_quantity == 0 {
            return Err(QuantityRejection::Zero);
        }
        if new_quantity < bounds.min {
            return Err(QuantityRejection::BelowDependents { dependents: bounds.min });
        }
        if new_quantity > bounds.max {
            return Err(QuantityRejection::ExceedsCapacity {
                requested: new_quantity,
                max: bounds.max,
            });
        }
        Ok(())
    }

    /// Интервал должен лежать внутри одного свободного слота, быть
    /// выровнен по минутам и не длиннее `max_duration_minutes`.
    pub fn validate_interval(
        availability: &FacilityAvailability,
        interval: &TimeRange,
    ) -> Result<(), IntervalRejection> {
        if !interval.is_minute_aligned() {
            return Err(IntervalRejection::NotMinuteAligned);
        }
        if interval.duration_minutes() > i64::from(availability.max_duration_minutes) {
            return Err(IntervalRejection::TooLong { max_minutes: availability.max_duration_minutes });
        }
        if availability.slot_containing(interval).is_none() {
            return Err(IntervalRejection::OutsideOpenSlots);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AllocationStatus, FacilityStatus};
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn event(total: Option<u32>) -> EventResource {
        EventResource {
            id: 7,
            name: "Spring gala".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2030, 5, 1).unwrap(),
            total_spots: total,
        }
    }

    fn registration(quantity: u32, status: AllocationStatus) -> EventRegistration {
        EventRegistration {
            id: Uuid::new_v4(),
            event_id: 7,
            member_id: 1,
            quantity,
            dependent_ids: vec![],
            status,
        }
    }

    fn court(open: (u32, u32), close: (u32, u32)) -> FacilityResource {
        FacilityResource {
            id: 3,
            name: "Tennis court".into(),
            description: None,
            status: FacilityStatus::Active,
            open_time: NaiveTime::from_hms_opt(open.0, open.1, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(close.0, close.1, 0).unwrap(),
            max_duration_minutes: 120,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 5, 1).unwrap()
    }

    fn at(h: u32, m: u32) -> chrono::DateTime<chrono::Utc> {
        LocalClock::utc().to_absolute(day(), NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn reservation(from: (u32, u32), to: (u32, u32), status: AllocationStatus) -> FacilityReservation {
        FacilityReservation {
            id: Uuid::new_v4(),
            facility_id: 3,
            member_id: 1,
            interval: TimeRange::new(at(from.0, from.1), at(to.0, to.1)).unwrap(),
            status,
        }
    }

    #[test]
    fn event_availability_ignores_cancelled() {
        let regs = vec![
            registration(3, AllocationStatus::Active),
            registration(4, AllocationStatus::Cancelled),
        ];
        let a = CapacityModel::compute_event_availability(&event(Some(10)), &regs).unwrap();
        assert_eq!(a, EventAvailability { total: 10, occupied: 3, available: 7 });
    }

    #[test]
    fn full_event_reports_zero() {
        let regs = vec![registration(10, AllocationStatus::Active)];
        let a = CapacityModel::compute_event_availability(&event(Some(10)), &regs).unwrap();
        assert_eq!(a.available, 0);
        assert!(a.is_full());
    }

    #[test]
    fn over_allocation_is_clamped_to_zero() {
        let regs = vec![registration(8, AllocationStatus::Active), registration(5, AllocationStatus::Active)];
        let a = CapacityModel::compute_event_availability(&event(Some(10)), &regs).unwrap();
        assert_eq!(a.occupied, 13);
        assert_eq!(a.available, 0);
        assert!(a.is_over_allocated());
    }

    #[test]
    fn missing_total_spots_fails_fast() {
        let err = CapacityModel::compute_event_availability(&event(None), &[]).unwrap_err();
        assert_eq!(err, CapacityError::MissingTotalSpots(7));
    }

    #[test]
    fn slots_split_around_reservation() {
        let model = CapacityModel::new(LocalClock::utc());
        let reservations = vec![reservation((8, 30), (9, 0), AllocationStatus::Active)];
        let a = model.compute_facility_slots(&court((8, 0), (10, 0)), &reservations, day()).unwrap();
        assert_eq!(
            a.slots,
            vec![
                TimeRange::new(at(8, 0), at(8, 30)).unwrap(),
                TimeRange::new(at(9, 0), at(10, 0)).unwrap(),
            ]
        );
    }

    #[test]
    fn adjacent_reservations_leave_no_zero_length_slot() {
        let model = CapacityModel::new(LocalClock::utc());
        let reservations = vec![
            reservation((9, 0), (10, 0), AllocationStatus::Active),
            reservation((8, 0), (9, 0), AllocationStatus::Active),
            reservation((9, 30), (9, 45), AllocationStatus::Cancelled),
        ];
        let a = model.compute_facility_slots(&court((8, 0), (10, 0)), &reservations, day()).unwrap();
        assert!(a.slots.is_empty());
    }

    #[test]
    fn reservations_on_other_days_are_ignored() {
        let model = CapacityModel::new(LocalClock::utc());
        let mut other = reservation((8, 0), (9, 0), AllocationStatus::Active);
        other.interval = TimeRange::new(
            other.interval.start + chrono::Duration::days(1),
            other.interval.end + chrono::Duration::days(1),
        )
        .unwrap();
        let a = model.compute_facility_slots(&court((8, 0), (10, 0)), &[other], day()).unwrap();
        assert_eq!(a.slots, vec![a.window]);
    }

    #[test]
    fn inverted_hours_fail_fast() {
        let model = CapacityModel::new(LocalClock::utc());
        let err = model.compute_facility_slots(&court((10, 0), (8, 0)), &[], day()).unwrap_err();
        assert!(matches!(err, CapacityError::InvertedHours { id: 3, .. }));

        let mut zero = court((8, 0), (10, 0));
        zero.max_duration_minutes = 0;
        assert_eq!(
            model.compute_facility_slots(&zero, &[], day()).unwrap_err(),
            CapacityError::ZeroMaxDuration(3)
        );
    }

    #[test]
    fn quantity_change_adds_back_own_quantity() {
        let resource = event(Some(10));
        let own = registration(3, AllocationStatus::Active);
        let bounds = CapacityModel::quantity_bounds(&resource, &own, 2).unwrap();
        assert_eq!(bounds, QuantityBounds { min: 1, max: 5 });
        assert!(CapacityModel::validate_quantity_change(&resource, &own, 5, 2).is_ok());
        assert_eq!(
            CapacityModel::validate_quantity_change(&resource, &own, 6, 2),
            Err(QuantityRejection::ExceedsCapacity { requested: 6, max: 5 })
        );
        assert_eq!(
            CapacityModel::validate_quantity_change(&resource, &own, 0, 2),
            Err(QuantityRejection::Zero)
        );
    }

    #[test]
    fn quantity_cannot_drop_below_dependents() {
        let resource = event(Some(10));
        let mut own = registration(3, AllocationStatus::Active);
        own.dependent_ids = vec![11, 12];

        let bounds = CapacityModel::quantity_bounds(&resource, &own, 2).unwrap();
        assert_eq!(bounds, QuantityBounds { min: 2, max: 5 });
        assert!(CapacityModel::validate_quantity_change(&resource, &own, 2, 2).is_ok());
        assert_eq!(
            CapacityModel::validate_quantity_change(&resource, &own, 1, 2),
            Err(QuantityRejection::BelowDependents { dependents: 2 })
        );
        assert_eq!(
            CapacityModel::validate_quantity_change(&resource, &own, 0, 2),
            Err(QuantityRejection::Zero)
        );
    }

    #[test]
    fn cancelled_registration_is_not_editable() {
        let resource = event(Some(10));
        let own = registration(3, AllocationStatus::Cancelled);
        assert_eq!(
            CapacityModel::validate_quantity_change(&resource, &own, 2, 5),
            Err(QuantityRejection::NotEditable)
        );
    }

    #[test]
    fn interval_must_fit_slot_and_duration() {
        let model = CapacityModel::new(LocalClock::utc());
        let mut resource = court((8, 0), (12, 0));
        resource.max_duration_minutes = 60;
        let reservations = vec![reservation((9, 0), (10, 0), AllocationStatus::Active)];
        let a = model.compute_facility_slots(&resource, &reservations, day()).unwrap();

        let ok = TimeRange::new(at(8, 0), at(9, 0)).unwrap();
        assert!(CapacityModel::validate_interval(&a, &ok).is_ok());

        let crossing = TimeRange::new(at(8, 30), at(9, 30)).unwrap();
        assert_eq!(
            CapacityModel::validate_interval(&a, &crossing),
            Err(IntervalRejection::OutsideOpenSlots)
        );

        let long = TimeRange::new(at(10, 0), at(11, 30)).unwrap();
        assert_eq!(
            CapacityModel::validate_interval(&a, &long),
            Err(IntervalRejection::TooLong { max_minutes: 60 })
        );

        let ragged = TimeRange::new(at(10, 0) + chrono::Duration::seconds(5), at(10, 30)).unwrap();
        assert_eq!(
            CapacityModel::validate_interval(&a, &ragged),
            Err(IntervalRejection::NotMinuteAligned)
        );
    }
}
