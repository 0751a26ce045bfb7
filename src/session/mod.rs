//! Сессия бронирования: один ресурс, одна попытка.
//!
//! Browsing -> SlotOrQuantitySelection -> RequesterSelection -> Confirming
//! -> Committing -> Settled. Клиентская арифметика только включает и
//! выключает кнопки; решение принимает шлюз.
//!
//! Ошибка коммита, после которой можно продолжить, возвращает сессию на
//! предыдущий шаг с сохранённым вводом. Терминальные исходы: успех,
//! истёкшая авторизация, исчезнувший ресурс.

pub mod desk;
pub mod registry;
pub mod selection;
pub mod state;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::ResourceCatalog;
use crate::directory::DirectoryError;
use crate::gateway::{
    AllocationPayload, BookingError, BookingGateway, RegistrationPayload, ReservationPayload,
    ResourceSnapshot,
};
use crate::models::{
    Allocation, AuthoritativeAllocation, DependentId, EventRegistration, FacilityReservation,
    Member, MemberDetails, MemberId, ResourceRef, TimeRange,
};
use crate::notify::{AuthExpiryHandler, NotificationSink, Severity};
use crate::services::capacity::{
    CapacityError, CapacityModel, DisplayAvailability, QuantityBounds,
};
use crate::services::member_finder::{Expansion, MemberFinder};

pub use desk::BookingDesk;
pub use registry::{SessionLease, SessionRegistry};
pub use selection::{Disabled, RequesterSelection};
pub use state::{BookingIntent, CommitKind, CommitReceipt, SessionState, Settlement};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("another booking session is already open")]
    AlreadyOpen,
    #[error("{0} is not bookable: {1}")]
    NotBookable(ResourceRef, String),
    #[error("action is not available in state {0}")]
    InvalidTransition(&'static str),
    #[error("action does not apply to this booking: {0}")]
    NotApplicable(&'static str),
    #[error(transparent)]
    Disabled(#[from] Disabled),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Зависимости, которые сессия получает от `BookingDesk`.
#[derive(Clone)]
pub(crate) struct SessionDeps {
    pub(crate) gateway: Arc<dyn BookingGateway>,
    pub(crate) notifier: Arc<dyn NotificationSink>,
    pub(crate) auth_expiry: Arc<dyn AuthExpiryHandler>,
    pub(crate) catalog: Option<Arc<ResourceCatalog>>,
    pub(crate) capacity: CapacityModel,
}

/// Готовый к отправке коммит.
enum CommitCommand {
    Create { requester: MemberId, payload: AllocationPayload },
    Update { requester: MemberId, payload: AllocationPayload },
    Cancel { requester: MemberId },
}

impl CommitCommand {
    fn kind(&self) -> CommitKind {
        match self {
            CommitCommand::Create { .. } => CommitKind::Created,
            CommitCommand::Update { .. } => CommitKind::Updated,
            CommitCommand::Cancel { .. } => CommitKind::Cancelled,
        }
    }

    fn payload(&self) -> Option<&AllocationPayload> {
        match self {
            CommitCommand::Create { payload, .. } | CommitCommand::Update { payload, .. } => {
                Some(payload)
            }
            CommitCommand::Cancel { .. } => None,
        }
    }
}

pub struct BookingSession {
    deps: SessionDeps,
    intent: BookingIntent,
    state: SessionState,
    snapshot: ResourceSnapshot,
    availability: DisplayAvailability,
    selection: RequesterSelection,
    chosen_slot: Option<TimeRange>,
    quantity: Option<u32>,
    finder: MemberFinder,
    last_settlement: Option<Settlement>,
    _lease: SessionLease,
}

impl BookingSession {
    pub(crate) fn start(
        deps: SessionDeps,
        finder: MemberFinder,
        lease: SessionLease,
        intent: BookingIntent,
        snapshot: ResourceSnapshot,
    ) -> Result<Self, SessionError> {
        let availability = compute_availability(&deps.capacity, &snapshot, &intent)?;
        let state = match (&intent, &snapshot) {
            (BookingIntent::Create, ResourceSnapshot::Event { .. }) => SessionState::RequesterSelection,
            (BookingIntent::Create, ResourceSnapshot::Facility { .. }) => {
                SessionState::SlotOrQuantitySelection
            }
            (BookingIntent::Update { .. } | BookingIntent::Cancel { .. }, _) => SessionState::Browsing,
        };
        info!(
            "Booking session opened for {} ({}) in state {}",
            snapshot.resource_ref(),
            snapshot.name(),
            state.name()
        );

        Ok(Self {
            deps,
            intent,
            state,
            snapshot,
            availability,
            selection: RequesterSelection::default(),
            chosen_slot: None,
            quantity: None,
            finder,
            last_settlement: None,
            _lease: lease,
        })
    }

    // --- Чтение ---

    pub fn resource_ref(&self) -> ResourceRef {
        self.snapshot.resource_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn intent(&self) -> &BookingIntent {
        &self.intent
    }

    pub fn snapshot(&self) -> &ResourceSnapshot {
        &self.snapshot
    }

    /// Клиентская оценка свободной вместимости. Только для отображения.
    pub fn availability(&self) -> &DisplayAvailability {
        &self.availability
    }

    pub fn selection(&self) -> &RequesterSelection {
        &self.selection
    }

    pub fn chosen_slot(&self) -> Option<&TimeRange> {
        self.chosen_slot.as_ref()
    }

    /// Количество в степпере (только изменение записи на событие).
    pub fn quantity(&self) -> Option<u32> {
        self.quantity
    }

    pub fn requested_quantity(&self) -> u32 {
        if self.is_facility() {
            return u32::from(self.selection.selected_member().is_some());
        }
        self.selection.requested_quantity()
    }

    pub fn last_settlement(&self) -> Option<&Settlement> {
        self.last_settlement.as_ref()
    }

    pub fn search_results(&self) -> Vec<Member> {
        self.finder.results()
    }

    pub fn expanded_member(&self) -> Option<MemberDetails> {
        self.finder.expanded()
    }

    /// Текущая копия редактируемой брони из последнего снимка.
    pub fn current_original(&self) -> Option<Allocation> {
        let original = self.intent.original()?;
        match &self.snapshot {
            ResourceSnapshot::Event { registrations, .. } => registrations
                .iter()
                .find(|r| r.id == original.id())
                .cloned()
                .map(Allocation::Registration),
            ResourceSnapshot::Facility { reservations, .. } => reservations
                .iter()
                .find(|r| r.id == original.id())
                .cloned()
                .map(Allocation::Reservation),
        }
    }

    fn is_facility(&self) -> bool {
        matches!(self.snapshot, ResourceSnapshot::Facility { .. })
    }

    fn event_available(&self) -> Option<u32> {
        self.availability.as_event().map(|a| a.available)
    }

    fn expect_state(&self, expected: &SessionState) -> Result<(), SessionError> {
        if &self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition(self.state.name()))
        }
    }

    // --- Поиск и выбор заявителя ---

    pub fn search(&mut self, term: &str) -> Result<u64, SessionError> {
        self.ensure_directory_session()?;
        self.expect_state(&SessionState::RequesterSelection)?;
        Ok(self.finder.search(term))
    }

    /// Дождаться применения отложенных поисков.
    ///
    /// Если справочник сбросил карточку (ошибка поиска), выбор заявителя
    /// сбрасывается вместе с ней.
    pub async fn settle_search(&mut self) -> Result<(), SessionError> {
        self.finder.wait_idle().await;
        self.ensure_directory_session()?;
        if self.finder.expanded().is_none() && !self.selection.is_empty() {
            debug!("Member card was cleared, dropping requester selection");
            self.selection.clear();
        }
        Ok(())
    }

    /// 401 из справочника завершает сессию так же, как 401 из шлюза.
    fn ensure_directory_session(&mut self) -> Result<(), SessionError> {
        if !self.finder.is_expired() {
            return Ok(());
        }
        if !self.state.is_settled() {
            self.abort_unauthorized(BookingError::Unauthorized);
        }
        Err(BookingError::Unauthorized.into())
    }

    /// Клик по участнику в результатах поиска.
    ///
    /// Раскрытие нового участника сбрасывает выбор предыдущего; повторный
    /// клик сворачивает и очищает выбор.
    pub async fn select_member(&mut self, member_id: MemberId) -> Result<Expansion, SessionError> {
        self.ensure_directory_session()?;
        self.expect_state(&SessionState::RequesterSelection)?;

        let expansion = self.finder.toggle(member_id).await;
        match &expansion {
            Expansion::Expanded(details) => {
                debug!("Member {} selected as requester", details.member.id);
                self.selection.select(details.clone());
            }
            Expansion::Collapsed => self.selection.clear(),
            Expansion::Failed(DirectoryError::Unauthorized) => {
                self.selection.clear();
                self.abort_unauthorized(BookingError::Unauthorized);
                return Err(BookingError::Unauthorized.into());
            }
            Expansion::Failed(_) => self.selection.clear(),
        }
        Ok(expansion)
    }

    /// Отметить/снять самого участника. Добавление блокируется при нулевом остатке.
    pub fn set_member_included(&mut self, included: bool) -> Result<(), SessionError> {
        self.expect_state(&SessionState::RequesterSelection)?;
        if self.is_facility() {
            return Err(SessionError::NotApplicable("facility reservations have a single requester"));
        }
        if self.selection.is_empty() {
            return Err(Disabled::NoMemberSelected.into());
        }
        if included && !self.selection.member_included() {
            self.ensure_room_for_one_more()?;
        }
        self.selection.set_member_included(included);
        Ok(())
    }

    /// Переключить иждивенца. Возвращает, отмечен ли он теперь.
    pub fn toggle_dependent(&mut self, id: DependentId) -> Result<bool, SessionError> {
        self.expect_state(&SessionState::RequesterSelection)?;
        if self.is_facility() {
            return Err(SessionError::NotApplicable("facility reservations have a single requester"));
        }
        if self.selection.remove_dependent(id) {
            return Ok(false);
        }
        if self.selection.is_empty() {
            return Err(Disabled::NoMemberSelected.into());
        }
        self.ensure_room_for_one_more()?;
        self.selection.insert_dependent(id)?;
        Ok(true)
    }

    /// Можно ли отметить ещё одного человека.
    pub fn can_add_requester(&self) -> bool {
        !self.selection.is_empty() && self.ensure_room_for_one_more().is_ok()
    }

    fn ensure_room_for_one_more(&self) -> Result<(), Disabled> {
        let available = self.event_available().unwrap_or(0);
        if self.selection.requested_quantity() >= available {
            return Err(Disabled::CapacityReached { available });
        }
        Ok(())
    }

    // --- Слоты (площадки) ---

    /// Выбрать интервал внутри свободного слота.
    pub fn choose_slot(&mut self, interval: TimeRange) -> Result<(), SessionError> {
        self.expect_state(&SessionState::SlotOrQuantitySelection)?;
        let availability = self
            .availability
            .as_facility()
            .ok_or(SessionError::NotApplicable("events have no slots"))?;
        CapacityModel::validate_interval(availability, &interval).map_err(Disabled::from)?;

        self.chosen_slot = Some(interval);
        if matches!(self.intent, BookingIntent::Create) {
            self.state = SessionState::RequesterSelection;
        }
        debug!("Slot {} chosen for {}", interval, self.resource_ref());
        Ok(())
    }

    /// Вернуться к выбору слота, не теряя выбранного участника.
    pub fn reselect_slot(&mut self) -> Result<(), SessionError> {
        self.expect_state(&SessionState::RequesterSelection)?;
        if !self.is_facility() {
            return Err(SessionError::NotApplicable("events have no slots"));
        }
        self.chosen_slot = None;
        self.state = SessionState::SlotOrQuantitySelection;
        Ok(())
    }

    // --- Изменение записи ---

    /// Начать редактирование существующей брони.
    pub fn begin_edit(&mut self) -> Result<(), SessionError> {
        self.expect_state(&SessionState::Browsing)?;
        if !matches!(self.intent, BookingIntent::Update { .. }) {
            return Err(SessionError::NotApplicable("only updates can be edited"));
        }
        match self.current_original() {
            Some(Allocation::Registration(r)) if r.is_active() => self.quantity = Some(r.quantity),
            Some(Allocation::Reservation(r)) if r.is_active() => self.chosen_slot = Some(r.interval),
            _ => return Err(Disabled::AlreadyCancelled.into()),
        }
        self.state = SessionState::SlotOrQuantitySelection;
        Ok(())
    }

    fn current_registration(&self) -> Result<EventRegistration, SessionError> {
        match self.current_original() {
            Some(Allocation::Registration(r)) => Ok(r),
            Some(Allocation::Reservation(_)) => {
                Err(SessionError::NotApplicable("facility reservations have no quantity"))
            }
            None => Err(Disabled::AlreadyCancelled.into()),
        }
    }

    fn current_reservation(&self) -> Result<FacilityReservation, SessionError> {
        match self.current_original() {
            Some(Allocation::Reservation(r)) => Ok(r),
            Some(Allocation::Registration(_)) => {
                Err(SessionError::NotApplicable("event registrations have no slot"))
            }
            None => Err(Disabled::AlreadyCancelled.into()),
        }
    }

    /// Границы степпера; `None`, если степпер сейчас не показан.
    pub fn quantity_bounds(&self) -> Option<QuantityBounds> {
        if self.state != SessionState::SlotOrQuantitySelection {
            return None;
        }
        let ResourceSnapshot::Event { resource, .. } = &self.snapshot else {
            return None;
        };
        let registration = self.current_registration().ok()?;
        CapacityModel::quantity_bounds(resource, &registration, self.event_available()?).ok()
    }

    pub fn can_increment(&self) -> bool {
        match (self.quantity_bounds(), self.quantity) {
            (Some(bounds), Some(current)) => bounds.can_increment(current),
            _ => false,
        }
    }

    pub fn can_decrement(&self) -> bool {
        match (self.quantity_bounds(), self.quantity) {
            (Some(bounds), Some(current)) => bounds.can_decrement(current),
            _ => false,
        }
    }

    pub fn increment_quantity(&mut self) -> Result<u32, SessionError> {
        let current = self.quantity.ok_or(SessionError::InvalidTransition(self.state.name()))?;
        self.set_quantity(current.saturating_add(1))
    }

    pub fn decrement_quantity(&mut self) -> Result<u32, SessionError> {
        let current = self.quantity.ok_or(SessionError::InvalidTransition(self.state.name()))?;
        self.set_quantity(current.saturating_sub(1))
    }

    /// Значение вне границ не зажимается, а отклоняется.
    pub fn set_quantity(&mut self, quantity: u32) -> Result<u32, SessionError> {
        self.expect_state(&SessionState::SlotOrQuantitySelection)?;
        let ResourceSnapshot::Event { resource, .. } = &self.snapshot else {
            return Err(SessionError::NotApplicable("facility reservations have no quantity"));
        };
        let registration = self.current_registration()?;
        let available = self.event_available().unwrap_or(0);
        CapacityModel::validate_quantity_change(resource, &registration, quantity, available)
            .map_err(Disabled::from)?;
        self.quantity = Some(quantity);
        Ok(quantity)
    }

    // --- Подтверждение ---

    /// Почему кнопка подтверждения сейчас недоступна.
    pub fn confirmation_blocker(&self) -> Option<SessionError> {
        self.check_ready().err()
    }

    pub fn can_request_confirmation(&self) -> bool {
        self.check_ready().is_ok()
    }

    fn check_ready(&self) -> Result<(), SessionError> {
        match (&self.intent, &self.state) {
            (_, SessionState::Committing) => Err(Disabled::Committing.into()),
            (BookingIntent::Create, SessionState::RequesterSelection) => {
                if self.selection.is_empty() {
                    return Err(Disabled::NoMemberSelected.into());
                }
                match &self.availability {
                    DisplayAvailability::Event(availability) => {
                        let requested = self.selection.requested_quantity();
                        if requested == 0 {
                            return Err(Disabled::NothingSelected.into());
                        }
                        if requested > availability.available {
                            return Err(Disabled::CapacityReached {
                                available: availability.available,
                            }
                            .into());
                        }
                    }
                    DisplayAvailability::Facility(availability) => {
                        let slot = self.chosen_slot.ok_or(Disabled::NoSlotChosen)?;
                        CapacityModel::validate_interval(availability, &slot)
                            .map_err(Disabled::from)?;
                    }
                }
                Ok(())
            }
            (BookingIntent::Update { .. }, SessionState::SlotOrQuantitySelection) => {
                match (&self.snapshot, &self.availability) {
                    (ResourceSnapshot::Event { resource, .. }, DisplayAvailability::Event(a)) => {
                        let registration = self.current_registration()?;
                        let quantity = self.quantity.ok_or(Disabled::NothingSelected)?;
                        if quantity == registration.quantity {
                            return Err(Disabled::Unchanged.into());
                        }
                        CapacityModel::validate_quantity_change(
                            resource,
                            &registration,
                            quantity,
                            a.available,
                        )
                        .map_err(Disabled::from)?;
                    }
                    (ResourceSnapshot::Facility { .. }, DisplayAvailability::Facility(a)) => {
                        let reservation = self.current_reservation()?;
                        if !reservation.is_active() {
                            return Err(Disabled::AlreadyCancelled.into());
                        }
                        let slot = self.chosen_slot.ok_or(Disabled::NoSlotChosen)?;
                        if slot == reservation.interval {
                            return Err(Disabled::Unchanged.into());
                        }
                        CapacityModel::validate_interval(a, &slot).map_err(Disabled::from)?;
                    }
                    _ => return Err(SessionError::InvalidTransition(self.state.name())),
                }
                Ok(())
            }
            (BookingIntent::Cancel { .. }, SessionState::Browsing) => {
                match self.current_original() {
                    Some(original) if original.status().is_active() => Ok(()),
                    _ => Err(Disabled::AlreadyCancelled.into()),
                }
            }
            (_, state) => Err(SessionError::InvalidTransition(state.name())),
        }
    }

    /// Открыть модальное подтверждение.
    pub fn request_confirmation(&mut self) -> Result<(), SessionError> {
        self.check_ready()?;
        self.state = SessionState::Confirming;
        Ok(())
    }

    /// Закрыть подтверждение без отправки; ввод сохраняется.
    pub fn cancel_confirmation(&mut self) -> Result<(), SessionError> {
        self.expect_state(&SessionState::Confirming)?;
        self.state = self.return_step();
        Ok(())
    }

    fn return_step(&self) -> SessionState {
        match self.intent {
            BookingIntent::Create => SessionState::RequesterSelection,
            BookingIntent::Update { .. } => SessionState::SlotOrQuantitySelection,
            BookingIntent::Cancel { .. } => SessionState::Browsing,
        }
    }

    fn build_command(&self) -> Result<CommitCommand, SessionError> {
        match &self.intent {
            BookingIntent::Create => {
                let member = self.selection.selected_member().ok_or(Disabled::NoMemberSelected)?;
                let requester = member.member.id;
                let payload = if self.is_facility() {
                    let interval = self.chosen_slot.ok_or(Disabled::NoSlotChosen)?;
                    AllocationPayload::Reservation(ReservationPayload { interval })
                } else {
                    AllocationPayload::Registration(RegistrationPayload {
                        quantity: self.selection.requested_quantity(),
                        dependent_ids: self.selection.dependent_ids(),
                    })
                };
                Ok(CommitCommand::Create { requester, payload })
            }
            BookingIntent::Update { original } => {
                let payload = match self.current_original() {
                    Some(Allocation::Registration(r)) => {
                        AllocationPayload::Registration(RegistrationPayload {
                            quantity: self.quantity.ok_or(Disabled::NothingSelected)?,
                            dependent_ids: r.dependent_ids,
                        })
                    }
                    Some(Allocation::Reservation(_)) => {
                        let interval = self.chosen_slot.ok_or(Disabled::NoSlotChosen)?;
                        AllocationPayload::Reservation(ReservationPayload { interval })
                    }
                    None => return Err(Disabled::AlreadyCancelled.into()),
                };
                Ok(CommitCommand::Update { requester: original.member_id(), payload })
            }
            BookingIntent::Cancel { original } => {
                Ok(CommitCommand::Cancel { requester: original.member_id() })
            }
        }
    }

    /// Отправить коммит в шлюз.
    ///
    /// Пока запрос в полёте, сессия в `Committing` и повторная отправка
    /// отклоняется.
    pub async fn confirm(&mut self) -> Result<CommitReceipt, SessionError> {
        match &self.state {
            SessionState::Confirming => {}
            SessionState::Committing => return Err(Disabled::Committing.into()),
            other => return Err(SessionError::InvalidTransition(other.name())),
        }

        let command = self.build_command()?;
        let resource = self.resource_ref();

        if let Some(Err(err)) = command.payload().map(AllocationPayload::validate) {
            return Err(self.settle_failure(err).await);
        }

        self.state = SessionState::Committing;
        info!("Committing {:?} on {}", command.kind(), resource);

        let gateway = Arc::clone(&self.deps.gateway);
        let result = match &command {
            CommitCommand::Create { requester, payload } => {
                gateway.create_allocation(resource, *requester, payload).await.map(Some)
            }
            CommitCommand::Update { requester, payload } => {
                gateway.update_allocation(resource, *requester, payload).await.map(Some)
            }
            CommitCommand::Cancel { requester } => {
                gateway.cancel_allocation(resource, *requester).await.map(|()| None)
            }
        };

        match result {
            Ok(allocation) => Ok(self.settle_success(command.kind(), allocation).await),
            Err(err) => Err(self.settle_failure(err).await),
        }
    }

    async fn settle_success(
        &mut self,
        kind: CommitKind,
        allocation: Option<AuthoritativeAllocation>,
    ) -> CommitReceipt {
        let resource = self.resource_ref();
        info!("{:?} committed on {}", kind, resource);

        self.selection.clear();
        self.finder.collapse();
        self.chosen_slot = None;
        self.quantity = None;

        if let Some(catalog) = &self.deps.catalog {
            catalog.invalidate(resource).await;
        }
        let mut expired = false;
        let availability = match self.reload().await {
            Ok(()) => Some(self.availability.clone()),
            Err(SessionError::Booking(BookingError::Unauthorized)) => {
                expired = true;
                None
            }
            Err(e) => {
                warn!("Failed to reload {} after commit: {}", resource, e);
                None
            }
        };

        let receipt = CommitReceipt { kind, allocation, availability };
        self.last_settlement = Some(Settlement::Succeeded(receipt.clone()));
        self.state = SessionState::Settled(Settlement::Succeeded(receipt.clone()));

        let message = match kind {
            CommitKind::Created => "Бронирование создано",
            CommitKind::Updated => "Бронирование изменено",
            CommitKind::Cancelled => "Бронирование отменено",
        };
        self.deps.notifier.log(&format!("{} ({}, {:?})", message, resource, kind));
        self.deps.notifier.toast(message, Severity::Success);

        // коммит уже принят сервером: исход остаётся успешным, но сессия
        // дальше не живёт
        if expired {
            warn!("Session expired while reloading {} after commit", resource);
            self.deps.auth_expiry.session_expired();
        }
        receipt
    }

    async fn settle_failure(&mut self, err: BookingError) -> SessionError {
        let resource = self.resource_ref();
        warn!("Commit on {} failed: {}", resource, err);
        self.last_settlement = Some(Settlement::Failed(err.clone()));
        if err != BookingError::Unauthorized {
            self.deps.notifier.log(&format!("Commit on {} failed: {}", resource, err));
        }

        match &err {
            BookingError::Unauthorized => {
                self.abort_unauthorized(BookingError::Unauthorized);
                return SessionError::Booking(BookingError::Unauthorized);
            }
            BookingError::Validation(_) => {
                self.deps.notifier.toast(err.user_message(), Severity::Warning);
                self.state = self.return_step();
            }
            BookingError::Server(_) | BookingError::Network(_) => {
                self.deps.notifier.toast(err.user_message(), Severity::Error);
                self.state = self.return_step();
            }
            BookingError::NotFound => {
                self.deps.notifier.toast(err.user_message(), Severity::Warning);
                if let Some(catalog) = &self.deps.catalog {
                    catalog.invalidate_all().await;
                }
                match self.reload().await {
                    Ok(()) => self.state = self.return_step(),
                    Err(SessionError::Booking(BookingError::NotFound)) => {
                        info!("{} no longer exists, closing booking flow", resource);
                        self.state = SessionState::Settled(Settlement::Failed(err.clone()));
                    }
                    Err(SessionError::Booking(BookingError::Unauthorized)) => {
                        self.abort_unauthorized(BookingError::Unauthorized);
                    }
                    Err(e) => {
                        warn!("Failed to reload {} after not-found: {}", resource, e);
                        self.state = self.return_step();
                    }
                }
            }
            BookingError::Conflict(_) => {
                self.deps.notifier.toast(err.user_message(), Severity::Warning);
                if let Some(catalog) = &self.deps.catalog {
                    catalog.invalidate(resource).await;
                }
                self.state = self.return_step();
                match self.reload().await {
                    Ok(()) => self.drop_stale_slot(),
                    Err(SessionError::Booking(BookingError::Unauthorized)) => {
                        self.abort_unauthorized(BookingError::Unauthorized);
                    }
                    Err(e) => warn!("Failed to reload {} after conflict: {}", resource, e),
                }
            }
        }
        err.into()
    }

    /// После конфликта выбранный интервал мог исчезнуть: сбросить его и
    /// вернуть пользователя к выбору слота.
    fn drop_stale_slot(&mut self) {
        let (Some(slot), Some(availability)) = (self.chosen_slot, self.availability.as_facility())
        else {
            return;
        };
        if CapacityModel::validate_interval(availability, &slot).is_ok() {
            return;
        }
        debug!("Chosen slot {} is no longer free", slot);
        self.chosen_slot = None;
        self.state = SessionState::SlotOrQuantitySelection;
    }

    fn abort_unauthorized(&mut self, err: BookingError) {
        warn!("Booking flow on {} aborted: session expired", self.resource_ref());
        self.last_settlement = Some(Settlement::Failed(err.clone()));
        self.state = SessionState::Settled(Settlement::Failed(err));
        self.deps.auth_expiry.session_expired();
    }

    // --- Обновление данных ---

    /// Перечитать ресурс. Выбор пользователя не трогается.
    pub async fn refresh_availability(&mut self) -> Result<&DisplayAvailability, SessionError> {
        if self.state == SessionState::Committing {
            return Err(Disabled::Committing.into());
        }
        match self.reload().await {
            Ok(()) => Ok(&self.availability),
            Err(SessionError::Booking(BookingError::Unauthorized)) => {
                if !self.state.is_settled() {
                    self.abort_unauthorized(BookingError::Unauthorized);
                }
                Err(BookingError::Unauthorized.into())
            }
            Err(e) => Err(e),
        }
    }

    async fn reload(&mut self) -> Result<(), SessionError> {
        let resource = self.resource_ref();
        let snapshot = self
            .deps
            .gateway
            .fetch_resource_with_allocations(resource, self.snapshot.date())
            .await?;
        let availability = compute_availability(&self.deps.capacity, &snapshot, &self.intent)?;
        debug!("Reloaded {}: {:?}", resource, availability);
        self.snapshot = snapshot;
        self.availability = availability;
        Ok(())
    }

    /// Закрыть сессию. Лиз освобождается, отложенные поиски снимаются.
    pub fn close(self) {
        info!(
            "Booking session for {} closed in state {}",
            self.resource_ref(),
            self.state.name()
        );
    }
}

/// Доступность для показа. При изменении брони площадки её собственный
/// интервал считается свободным, чтобы его можно было сдвинуть.
fn compute_availability(
    capacity: &CapacityModel,
    snapshot: &ResourceSnapshot,
    intent: &BookingIntent,
) -> Result<DisplayAvailability, CapacityError> {
    match snapshot {
        ResourceSnapshot::Event { resource, registrations } => Ok(DisplayAvailability::Event(
            CapacityModel::compute_event_availability(resource, registrations)?,
        )),
        ResourceSnapshot::Facility { resource, date, reservations } => {
            let editing = match intent {
                BookingIntent::Update { original: Allocation::Reservation(r) } => Some(r.id),
                _ => None,
            };
            let others: Vec<FacilityReservation> = reservations
                .iter()
                .filter(|r| Some(r.id) != editing)
                .cloned()
                .collect();
            Ok(DisplayAvailability::Facility(capacity.compute_facility_slots(
                resource, &others, *date,
            )?))
        }
    }
}
