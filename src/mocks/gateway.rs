use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use crate::gateway::{
    AllocationPayload, BookingError, BookingGateway, CatalogSource, RegistrationPayload,
    ResourceSnapshot,
};
use crate::models::{
    Allocation, AllocationStatus, AuthoritativeAllocation, EventId, EventRegistration,
    EventResource, FacilityId, FacilityReservation, FacilityResource, LocalClock, MemberId,
    ResourceRef, TimeRange,
};

/// Журнал обращений к шлюзу.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCall {
    ListEvents,
    ListFacilities,
    Fetch(ResourceRef),
    Create(ResourceRef, MemberId),
    Update(ResourceRef, MemberId),
    Cancel(ResourceRef, MemberId),
}

impl GatewayCall {
    pub fn is_commit(&self) -> bool {
        matches!(
            self,
            GatewayCall::Create(..) | GatewayCall::Update(..) | GatewayCall::Cancel(..)
        )
    }
}

#[derive(Debug, Default)]
struct Store {
    events: BTreeMap<EventId, EventResource>,
    facilities: BTreeMap<FacilityId, FacilityResource>,
    registrations: Vec<EventRegistration>,
    reservations: Vec<FacilityReservation>,
    calls: Vec<GatewayCall>,
    commit_failures: VecDeque<BookingError>,
    fetch_failures: VecDeque<BookingError>,
}

impl Store {
    fn event(&self, id: EventId) -> Result<&EventResource, BookingError> {
        self.events.get(&id).ok_or(BookingError::NotFound)
    }

    fn facility(&self, id: FacilityId) -> Result<&FacilityResource, BookingError> {
        self.facilities.get(&id).ok_or(BookingError::NotFound)
    }

    fn occupied(&self, event_id: EventId, except: Option<Uuid>) -> u32 {
        self.registrations
            .iter()
            .filter(|r| r.event_id == event_id && r.is_active() && Some(r.id) != except)
            .map(|r| r.quantity)
            .sum()
    }

    fn active_registration(&mut self, event_id: EventId, member_id: MemberId) -> Option<&mut EventRegistration> {
        self.registrations
            .iter_mut()
            .find(|r| r.event_id == event_id && r.member_id == member_id && r.is_active())
    }

    fn active_reservation(
        &mut self,
        facility_id: FacilityId,
        member_id: MemberId,
    ) -> Option<&mut FacilityReservation> {
        self.reservations
            .iter_mut()
            .find(|r| r.facility_id == facility_id && r.member_id == member_id && r.is_active())
    }

    fn check_registration(
        &self,
        event_id: EventId,
        payload: &RegistrationPayload,
        except: Option<Uuid>,
    ) -> Result<(), BookingError> {
        let event = self.event(event_id)?;
        let total = event
            .total_spots
            .ok_or_else(|| BookingError::Server(format!("event {} has no quota", event_id)))?;
        if payload.quantity == 0 {
            return Err(BookingError::Validation("quantity must be positive".to_string()));
        }
        if (payload.quantity as usize) < payload.dependent_ids.len() {
            return Err(BookingError::Validation(
                "quantity is less than the number of dependents".to_string(),
            ));
        }
        let occupied = self.occupied(event_id, except);
        if occupied.saturating_add(payload.quantity) > total {
            return Err(BookingError::Conflict(format!(
                "only {} spots left",
                total.saturating_sub(occupied)
            )));
        }
        Ok(())
    }

    fn check_interval(
        &self,
        clock: &LocalClock,
        facility_id: FacilityId,
        interval: &TimeRange,
        except: Option<Uuid>,
    ) -> Result<(), BookingError> {
        let facility = self.facility(facility_id)?;
        if !facility.status.is_bookable() {
            return Err(BookingError::Validation(format!("facility {} is closed", facility_id)));
        }
        if !interval.is_minute_aligned() {
            return Err(BookingError::Validation("interval must be minute aligned".to_string()));
        }
        if interval.duration_minutes() > i64::from(facility.max_duration_minutes) {
            return Err(BookingError::Validation(format!(
                "interval longer than {} minutes",
                facility.max_duration_minutes
            )));
        }
        let date = clock.local_date(interval.start);
        let within_hours = clock
            .day_window(date, facility.open_time, facility.close_time)
            .is_some_and(|window| window.contains(interval));
        if !within_hours {
            return Err(BookingError::Validation("interval outside opening hours".to_string()));
        }
        let overlapping = self.reservations.iter().any(|r| {
            r.facility_id == facility_id
                && r.is_active()
                && Some(r.id) != except
                && r.interval.overlaps(interval)
        });
        if overlapping {
            return Err(BookingError::Conflict(format!("{} is already taken", interval)));
        }
        Ok(())
    }
}

/// Сервер бронирований в памяти.
///
/// Одна активная бронь на участника и ресурс: именно по паре
/// (ресурс, участник) адресуются изменение и отмена.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookingGateway {
    store: Arc<Mutex<Store>>,
    clock: LocalClock,
}

impl InMemoryBookingGateway {
    pub fn new(clock: LocalClock) -> Self {
        Self { store: Arc::default(), clock }
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_event(&self, event: EventResource) {
        self.store().events.insert(event.id, event);
    }

    pub fn add_facility(&self, facility: FacilityResource) {
        self.store().facilities.insert(facility.id, facility);
    }

    pub fn remove_event(&self, id: EventId) {
        self.store().events.remove(&id);
    }

    pub fn remove_facility(&self, id: FacilityId) {
        self.store().facilities.remove(&id);
    }

    /// Бронь, сделанная "кем-то ещё" в обход проверок.
    pub fn seed_registration(
        &self,
        event_id: EventId,
        member_id: MemberId,
        quantity: u32,
    ) -> EventRegistration {
        let registration = EventRegistration {
            id: Uuid::new_v4(),
            event_id,
            member_id,
            quantity,
            dependent_ids: Vec::new(),
            status: AllocationStatus::Active,
        };
        self.store().registrations.push(registration.clone());
        registration
    }

    pub fn seed_reservation(
        &self,
        facility_id: FacilityId,
        member_id: MemberId,
        interval: TimeRange,
    ) -> FacilityReservation {
        let reservation = FacilityReservation {
            id: Uuid::new_v4(),
            facility_id,
            member_id,
            interval,
            status: AllocationStatus::Active,
        };
        self.store().reservations.push(reservation.clone());
        reservation
    }

    /// Отменить бронь в обход клиента (конкурирующий оператор).
    pub fn cancel_behind_the_scenes(&self, id: Uuid) {
        let mut store = self.store();
        for registration in store.registrations.iter_mut().filter(|r| r.id == id) {
            registration.status = AllocationStatus::Cancelled;
        }
        for reservation in store.reservations.iter_mut().filter(|r| r.id == id) {
            reservation.status = AllocationStatus::Cancelled;
        }
    }

    /// Следующий create/update/cancel вернёт эту ошибку.
    pub fn fail_next_commit(&self, error: BookingError) {
        self.store().commit_failures.push_back(error);
    }

    /// Следующая загрузка снимка вернёт эту ошибку.
    pub fn fail_next_fetch(&self, error: BookingError) {
        self.store().fetch_failures.push_back(error);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.store().calls.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.store().calls.iter().filter(|c| c.is_commit()).count()
    }

    pub fn registrations(&self, event_id: EventId) -> Vec<EventRegistration> {
        self.store().registrations.iter().filter(|r| r.event_id == event_id).cloned().collect()
    }

    pub fn reservations(&self, facility_id: FacilityId) -> Vec<FacilityReservation> {
        self.store()
            .reservations
            .iter()
            .filter(|r| r.facility_id == facility_id)
            .cloned()
            .collect()
    }

    fn begin_commit(&self, call: GatewayCall) -> Result<MutexGuard<'_, Store>, BookingError> {
        let mut store = self.store();
        store.calls.push(call);
        debug!("In-memory gateway: {:?}", call);
        match store.commit_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(store),
        }
    }

    fn mismatch(resource: ResourceRef) -> BookingError {
        BookingError::Validation(format!("payload does not match resource {}", resource))
    }
}

#[async_trait]
impl BookingGateway for InMemoryBookingGateway {
    async fn fetch_resource_with_allocations(
        &self,
        resource: ResourceRef,
        date: Option<NaiveDate>,
    ) -> Result<ResourceSnapshot, BookingError> {
        let mut store = self.store();
        store.calls.push(GatewayCall::Fetch(resource));
        if let Some(error) = store.fetch_failures.pop_front() {
            return Err(error);
        }

        match resource {
            ResourceRef::Event(id) => {
                let event = store.event(id)?.clone();
                let registrations =
                    store.registrations.iter().filter(|r| r.event_id == id).cloned().collect();
                Ok(ResourceSnapshot::Event { resource: event, registrations })
            }
            ResourceRef::Facility(id) => {
                let date = date.ok_or_else(|| {
                    BookingError::Validation("date is required for facility availability".to_string())
                })?;
                let facility = store.facility(id)?.clone();
                let reservations = store
                    .reservations
                    .iter()
                    .filter(|r| r.facility_id == id && self.clock.local_date(r.interval.start) == date)
                    .cloned()
                    .collect();
                Ok(ResourceSnapshot::Facility { resource: facility, date, reservations })
            }
        }
    }

    async fn create_allocation(
        &self,
        resource: ResourceRef,
        requester: MemberId,
        payload: &AllocationPayload,
    ) -> Result<AuthoritativeAllocation, BookingError> {
        let mut store = self.begin_commit(GatewayCall::Create(resource, requester))?;
        payload.validate()?;

        let allocation = match (resource, payload) {
            (ResourceRef::Event(event_id), AllocationPayload::Registration(p)) => {
                store.event(event_id)?;
                if store.active_registration(event_id, requester).is_some() {
                    return Err(BookingError::Conflict("member is already registered".to_string()));
                }
                store.check_registration(event_id, p, None)?;
                let registration = EventRegistration {
                    id: Uuid::new_v4(),
                    event_id,
                    member_id: requester,
                    quantity: p.quantity,
                    dependent_ids: p.dependent_ids.clone(),
                    status: AllocationStatus::Active,
                };
                store.registrations.push(registration.clone());
                Allocation::Registration(registration)
            }
            (ResourceRef::Facility(facility_id), AllocationPayload::Reservation(p)) => {
                store.facility(facility_id)?;
                if store.active_reservation(facility_id, requester).is_some() {
                    return Err(BookingError::Conflict("member already holds a reservation".to_string()));
                }
                store.check_interval(&self.clock, facility_id, &p.interval, None)?;
                let reservation = FacilityReservation {
                    id: Uuid::new_v4(),
                    facility_id,
                    member_id: requester,
                    interval: p.interval,
                    status: AllocationStatus::Active,
                };
                store.reservations.push(reservation.clone());
                Allocation::Reservation(reservation)
            }
            _ => return Err(Self::mismatch(resource)),
        };

        Ok(AuthoritativeAllocation::from_gateway(allocation))
    }

    async fn update_allocation(
        &self,
        resource: ResourceRef,
        requester: MemberId,
        payload: &AllocationPayload,
    ) -> Result<AuthoritativeAllocation, BookingError> {
        let mut store = self.begin_commit(GatewayCall::Update(resource, requester))?;
        payload.validate()?;

        let allocation = match (resource, payload) {
            (ResourceRef::Event(event_id), AllocationPayload::Registration(p)) => {
                let id = store
                    .active_registration(event_id, requester)
                    .map(|r| r.id)
                    .ok_or(BookingError::NotFound)?;
                store.check_registration(event_id, p, Some(id))?;
                let registration =
                    store.active_registration(event_id, requester).ok_or(BookingError::NotFound)?;
                registration.quantity = p.quantity;
                registration.dependent_ids = p.dependent_ids.clone();
                Allocation::Registration(registration.clone())
            }
            (ResourceRef::Facility(facility_id), AllocationPayload::Reservation(p)) => {
                let id = store
                    .active_reservation(facility_id, requester)
                    .map(|r| r.id)
                    .ok_or(BookingError::NotFound)?;
                store.check_interval(&self.clock, facility_id, &p.interval, Some(id))?;
                let reservation =
                    store.active_reservation(facility_id, requester).ok_or(BookingError::NotFound)?;
                reservation.interval = p.interval;
                Allocation::Reservation(reservation.clone())
            }
            _ => return Err(Self::mismatch(resource)),
        };

        Ok(AuthoritativeAllocation::from_gateway(allocation))
    }

    async fn cancel_allocation(
        &self,
        resource: ResourceRef,
        requester: MemberId,
    ) -> Result<(), BookingError> {
        let mut store = self.begin_commit(GatewayCall::Cancel(resource, requester))?;
        match resource {
            ResourceRef::Event(event_id) => {
                let registration =
                    store.active_registration(event_id, requester).ok_or(BookingError::NotFound)?;
                registration.status = AllocationStatus::Cancelled;
            }
            ResourceRef::Facility(facility_id) => {
                let reservation =
                    store.active_reservation(facility_id, requester).ok_or(BookingError::NotFound)?;
                reservation.status = AllocationStatus::Cancelled;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for InMemoryBookingGateway {
    async fn list_events(&self) -> Result<Vec<EventResource>, BookingError> {
        let mut store = self.store();
        store.calls.push(GatewayCall::ListEvents);
        Ok(store.events.values().cloned().collect())
    }

    async fn list_facilities(&self) -> Result<Vec<FacilityResource>, BookingError> {
        let mut store = self.store();
        store.calls.push(GatewayCall::ListFacilities);
        Ok(store.facilities.values().cloned().collect())
    }
}
