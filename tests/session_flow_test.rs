mod common;

use booking_console::directory::DirectoryError;
use booking_console::gateway::BookingError;
use booking_console::models::{Allocation, AllocationStatus, EventResource, FacilityStatus};
use booking_console::notify::Severity;
use booking_console::services::capacity::{DisplayAvailability, IntervalRejection, QuantityRejection};
use booking_console::services::member_finder::Expansion;
use booking_console::session::{
    BookingSession, CommitKind, Disabled, SessionError, SessionState, Settlement,
};

use common::*;

fn available(session: &BookingSession) -> u32 {
    session.availability().as_event().map(|a| a.available).unwrap()
}

async fn open_event_with_anna(h: &Harness) -> BookingSession {
    let mut session = h.desk.open_event_registration(EVENT_ID).await.unwrap();
    let expansion = session.select_member(ANNA).await.unwrap();
    assert!(matches!(expansion, Expansion::Expanded(ref d) if d.member.id == ANNA));
    session
}

// --- События ---

#[tokio::test]
async fn event_registration_commits_and_refetches_availability() {
    let h = harness();
    h.gateway.add_event(event(5));
    h.gateway.seed_registration(EVENT_ID, 99, 2);

    let mut session = open_event_with_anna(&h).await;
    assert_eq!(session.state(), &SessionState::RequesterSelection);
    assert_eq!(available(&session), 3);

    session.set_member_included(true).unwrap();
    assert!(session.toggle_dependent(11).unwrap());
    assert_eq!(session.requested_quantity(), 2);

    session.request_confirmation().unwrap();
    assert_eq!(session.state(), &SessionState::Confirming);
    let receipt = session.confirm().await.unwrap();

    assert_eq!(receipt.kind, CommitKind::Created);
    let allocation = receipt.allocation.clone().unwrap().into_inner();
    assert_eq!(allocation.quantity(), 2);
    assert_eq!(allocation.member_id(), ANNA);
    match receipt.availability {
        Some(DisplayAvailability::Event(a)) => assert_eq!(a.available, 1),
        other => panic!("unexpected availability {:?}", other),
    }
    assert!(matches!(session.state(), SessionState::Settled(Settlement::Succeeded(_))));
    assert!(session.selection().is_empty());
    assert_eq!(h.notifier.last_toast().map(|(_, s)| s), Some(Severity::Success));
}

#[tokio::test]
async fn adding_requesters_stops_at_available_capacity() {
    let h = harness();
    h.gateway.add_event(event(2));
    h.gateway.seed_registration(EVENT_ID, 99, 1);

    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();

    assert!(!session.can_add_requester());
    let err = session.toggle_dependent(11).unwrap_err();
    assert!(matches!(err, SessionError::Disabled(Disabled::CapacityReached { available: 1 })));
    assert_eq!(session.requested_quantity(), 1);

    // снять участника и отметить иждивенца вместо него можно
    session.set_member_included(false).unwrap();
    assert!(session.toggle_dependent(11).unwrap());
    assert_eq!(session.requested_quantity(), 1);
}

#[tokio::test]
async fn full_event_disables_every_requester() {
    let h = harness();
    h.gateway.add_event(event(2));
    h.gateway.seed_registration(EVENT_ID, 99, 2);

    let mut session = open_event_with_anna(&h).await;
    assert!(session.set_member_included(true).is_err());
    assert!(session.toggle_dependent(12).is_err());
    assert!(!session.can_request_confirmation());
}

#[tokio::test]
async fn zero_quantity_cannot_be_confirmed() {
    let h = harness();
    h.gateway.add_event(event(5));

    let mut session = open_event_with_anna(&h).await;
    let err = session.request_confirmation().unwrap_err();
    assert!(matches!(err, SessionError::Disabled(Disabled::NothingSelected)));
    assert_eq!(session.state(), &SessionState::RequesterSelection);
    assert_eq!(h.gateway.commit_count(), 0);
}

#[tokio::test]
async fn confirming_without_member_is_disabled() {
    let h = harness();
    h.gateway.add_event(event(5));

    let session = h.desk.open_event_registration(EVENT_ID).await.unwrap();
    assert!(matches!(
        session.confirmation_blocker(),
        Some(SessionError::Disabled(Disabled::NoMemberSelected))
    ));
}

#[tokio::test]
async fn choosing_another_member_resets_selection() {
    let h = harness();
    h.gateway.add_event(event(5));

    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();
    session.toggle_dependent(12).unwrap();

    session.select_member(BORIS).await.unwrap();
    assert_eq!(session.selection().selected_member().map(|d| d.member.id), Some(BORIS));
    assert_eq!(session.requested_quantity(), 0);

    // чужого иждивенца отметить нельзя
    let err = session.toggle_dependent(11).unwrap_err();
    assert!(matches!(err, SessionError::Disabled(Disabled::UnknownDependent)));

    // повторный клик сворачивает и очищает выбор
    assert_eq!(session.select_member(BORIS).await.unwrap(), Expansion::Collapsed);
    assert!(session.selection().is_empty());
}

#[tokio::test]
async fn closing_the_confirmation_keeps_the_selection() {
    let h = harness();
    h.gateway.add_event(event(5));

    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();
    session.request_confirmation().unwrap();
    session.cancel_confirmation().unwrap();

    assert_eq!(session.state(), &SessionState::RequesterSelection);
    assert_eq!(session.requested_quantity(), 1);
    assert!(session.can_request_confirmation());
}

#[tokio::test]
async fn conflict_refreshes_capacity_and_keeps_input() {
    let h = harness();
    h.gateway.add_event(event(5));
    h.gateway.seed_registration(EVENT_ID, 99, 2);

    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();
    session.toggle_dependent(11).unwrap();
    session.request_confirmation().unwrap();

    // кто-то успел раньше
    h.gateway.seed_registration(EVENT_ID, 98, 2);

    let err = session.confirm().await.unwrap_err();
    assert!(matches!(err, SessionError::Booking(BookingError::Conflict(_))));
    assert_eq!(session.state(), &SessionState::RequesterSelection);
    assert_eq!(session.requested_quantity(), 2);
    assert_eq!(available(&session), 1);
    assert!(matches!(
        session.confirmation_blocker(),
        Some(SessionError::Disabled(Disabled::CapacityReached { available: 1 }))
    ));
    assert_eq!(h.notifier.count(Severity::Warning), 1);

    // пользователь уменьшает выбор и успешно отправляет
    session.toggle_dependent(11).unwrap();
    session.request_confirmation().unwrap();
    assert_eq!(session.confirm().await.unwrap().kind, CommitKind::Created);
}

#[tokio::test]
async fn server_error_returns_to_previous_step() {
    let h = harness();
    h.gateway.add_event(event(5));

    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();
    session.request_confirmation().unwrap();

    h.gateway.fail_next_commit(BookingError::Server("database is down".into()));
    let err = session.confirm().await.unwrap_err();
    assert!(matches!(err, SessionError::Booking(BookingError::Server(_))));
    assert_eq!(session.state(), &SessionState::RequesterSelection);
    assert_eq!(session.requested_quantity(), 1);
    assert_eq!(h.notifier.count(Severity::Error), 1);
    assert!(matches!(
        session.last_settlement(),
        Some(Settlement::Failed(BookingError::Server(_)))
    ));

    session.request_confirmation().unwrap();
    session.confirm().await.unwrap();
    assert_eq!(h.gateway.commit_count(), 2);
}

#[tokio::test]
async fn unauthorized_aborts_and_hands_off() {
    let h = harness();
    h.gateway.add_event(event(5));

    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();
    session.request_confirmation().unwrap();

    h.gateway.fail_next_commit(BookingError::Unauthorized);
    let err = session.confirm().await.unwrap_err();

    assert!(matches!(err, SessionError::Booking(BookingError::Unauthorized)));
    assert_eq!(
        session.state(),
        &SessionState::Settled(Settlement::Failed(BookingError::Unauthorized))
    );
    assert_eq!(h.auth.expirations(), 1);
    assert_eq!(h.notifier.count(Severity::Error), 0);
}

#[tokio::test]
async fn settled_session_rejects_second_submit() {
    let h = harness();
    h.gateway.add_event(event(5));

    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();
    session.request_confirmation().unwrap();
    session.confirm().await.unwrap();

    let err = session.confirm().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidTransition(_)));
    assert!(session.request_confirmation().is_err());
    assert_eq!(h.gateway.commit_count(), 1);
}

#[tokio::test]
async fn vanished_event_settles_with_not_found() {
    let h = harness();
    h.gateway.add_event(event(5));

    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();
    session.request_confirmation().unwrap();

    h.gateway.remove_event(EVENT_ID);
    let err = session.confirm().await.unwrap_err();

    assert!(matches!(err, SessionError::Booking(BookingError::NotFound)));
    assert_eq!(
        session.state(),
        &SessionState::Settled(Settlement::Failed(BookingError::NotFound))
    );
}

// --- Изменение и отмена ---

#[tokio::test]
async fn quantity_stepper_is_bounded_by_free_capacity() {
    let h = harness();
    h.gateway.add_event(event(4));
    h.gateway.seed_registration(EVENT_ID, 99, 1);
    let own = h.gateway.seed_registration(EVENT_ID, ANNA, 2);

    let mut session = h.desk.open_update(Allocation::Registration(own)).await.unwrap();
    assert_eq!(session.state(), &SessionState::Browsing);
    session.begin_edit().unwrap();
    assert_eq!(session.quantity(), Some(2));
    assert!(matches!(
        session.confirmation_blocker(),
        Some(SessionError::Disabled(Disabled::Unchanged))
    ));

    let bounds = session.quantity_bounds().unwrap();
    assert_eq!((bounds.min, bounds.max), (1, 3));

    assert_eq!(session.increment_quantity().unwrap(), 3);
    assert!(!session.can_increment());
    let err = session.increment_quantity().unwrap_err();
    assert!(matches!(
        err,
        SessionError::Disabled(Disabled::Quantity(QuantityRejection::ExceedsCapacity {
            requested: 4,
            max: 3
        }))
    ));
    assert_eq!(session.quantity(), Some(3));

    let err = session.set_quantity(0).unwrap_err();
    assert!(matches!(err, SessionError::Disabled(Disabled::Quantity(QuantityRejection::Zero))));

    session.request_confirmation().unwrap();
    let receipt = session.confirm().await.unwrap();
    assert_eq!(receipt.kind, CommitKind::Updated);

    let stored = h.gateway.registrations(EVENT_ID);
    let anna = stored.iter().find(|r| r.member_id == ANNA).unwrap();
    assert_eq!(anna.quantity, 3);
}

#[tokio::test]
async fn decrement_stops_at_one() {
    let h = harness();
    h.gateway.add_event(event(4));
    let own = h.gateway.seed_registration(EVENT_ID, ANNA, 1);

    let mut session = h.desk.open_update(Allocation::Registration(own)).await.unwrap();
    session.begin_edit().unwrap();
    assert!(!session.can_decrement());
    assert!(session.decrement_quantity().is_err());
    assert_eq!(session.quantity(), Some(1));
}

#[tokio::test]
async fn decrement_keeps_room_for_registered_dependents() {
    let h = harness();
    h.gateway.add_event(event(5));

    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();
    session.toggle_dependent(11).unwrap();
    session.toggle_dependent(12).unwrap();
    session.request_confirmation().unwrap();
    let own = session.confirm().await.unwrap().allocation.unwrap().into_inner();
    session.close();

    let mut session = h.desk.open_update(own).await.unwrap();
    session.begin_edit().unwrap();
    assert_eq!(session.quantity(), Some(3));
    assert_eq!(session.quantity_bounds().unwrap().min, 2);

    assert_eq!(session.decrement_quantity().unwrap(), 2);
    assert!(!session.can_decrement());
    let err = session.decrement_quantity().unwrap_err();
    assert!(matches!(
        err,
        SessionError::Disabled(Disabled::Quantity(QuantityRejection::BelowDependents {
            dependents: 2
        }))
    ));
    assert_eq!(session.quantity(), Some(2));

    session.request_confirmation().unwrap();
    session.confirm().await.unwrap();
    let stored = h.gateway.registrations(EVENT_ID);
    let anna = stored.iter().find(|r| r.member_id == ANNA).unwrap();
    assert_eq!(anna.quantity, 2);
    assert_eq!(anna.dependent_ids, vec![11, 12]);
}

#[tokio::test]
async fn cancel_frees_capacity_and_keeps_history() {
    let h = harness();
    h.gateway.add_event(event(4));
    let own = h.gateway.seed_registration(EVENT_ID, ANNA, 3);

    let mut session = h.desk.open_cancel(Allocation::Registration(own)).await.unwrap();
    assert_eq!(available(&session), 1);
    session.request_confirmation().unwrap();
    let receipt = session.confirm().await.unwrap();

    assert_eq!(receipt.kind, CommitKind::Cancelled);
    assert!(receipt.allocation.is_none());
    match receipt.availability {
        Some(DisplayAvailability::Event(a)) => assert_eq!(a.available, 4),
        other => panic!("unexpected availability {:?}", other),
    }
    let stored = h.gateway.registrations(EVENT_ID);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, AllocationStatus::Cancelled);
}

#[tokio::test]
async fn cancel_race_reports_not_found_and_disables_retry() {
    let h = harness();
    h.gateway.add_event(event(4));
    let own = h.gateway.seed_registration(EVENT_ID, ANNA, 2);

    let mut session = h.desk.open_cancel(Allocation::Registration(own.clone())).await.unwrap();
    session.request_confirmation().unwrap();

    // другой оператор отменил запись раньше
    h.gateway.cancel_behind_the_scenes(own.id);

    let err = session.confirm().await.unwrap_err();
    assert!(matches!(err, SessionError::Booking(BookingError::NotFound)));
    assert_eq!(session.state(), &SessionState::Browsing);
    assert!(matches!(
        session.confirmation_blocker(),
        Some(SessionError::Disabled(Disabled::AlreadyCancelled))
    ));
    assert_eq!(available(&session), 4);
}

// --- Площадки ---

#[tokio::test]
async fn facility_reservation_books_a_free_interval() {
    let h = harness();
    h.gateway.add_facility(facility(8, 12, 120));
    h.gateway.seed_reservation(FACILITY_ID, 99, range((9, 0), (10, 0)));

    let mut session = h.desk.open_facility_reservation(FACILITY_ID, booking_date()).await.unwrap();
    assert_eq!(session.state(), &SessionState::SlotOrQuantitySelection);
    let slots = session.availability().as_facility().unwrap().slots.clone();
    assert_eq!(slots, vec![range((8, 0), (9, 0)), range((10, 0), (12, 0))]);

    let err = session.choose_slot(range((9, 30), (10, 30))).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Disabled(Disabled::Interval(IntervalRejection::OutsideOpenSlots))
    ));

    session.choose_slot(range((10, 0), (11, 30))).unwrap();
    assert_eq!(session.state(), &SessionState::RequesterSelection);
    assert!(matches!(
        session.confirmation_blocker(),
        Some(SessionError::Disabled(Disabled::NoMemberSelected))
    ));

    session.select_member(ANNA).await.unwrap();
    assert_eq!(session.requested_quantity(), 1);
    session.request_confirmation().unwrap();
    let receipt = session.confirm().await.unwrap();

    let slots = receipt.availability.unwrap().as_facility().unwrap().slots.clone();
    assert_eq!(slots, vec![range((8, 0), (9, 0)), range((11, 30), (12, 0))]);
}

#[tokio::test]
async fn facility_interval_longer_than_limit_is_rejected() {
    let h = harness();
    h.gateway.add_facility(facility(8, 12, 90));

    let mut session = h.desk.open_facility_reservation(FACILITY_ID, booking_date()).await.unwrap();
    let err = session.choose_slot(range((8, 0), (10, 0))).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Disabled(Disabled::Interval(IntervalRejection::TooLong { max_minutes: 90 }))
    ));
    assert!(session.choose_slot(range((8, 0), (9, 30))).is_ok());
}

#[tokio::test]
async fn facility_sessions_have_no_dependents() {
    let h = harness();
    h.gateway.add_facility(facility(8, 12, 120));

    let mut session = h.desk.open_facility_reservation(FACILITY_ID, booking_date()).await.unwrap();
    session.choose_slot(range((8, 0), (9, 0))).unwrap();
    session.select_member(ANNA).await.unwrap();
    assert!(matches!(session.toggle_dependent(11), Err(SessionError::NotApplicable(_))));
}

#[tokio::test]
async fn taken_slot_sends_user_back_to_slot_selection() {
    let h = harness();
    h.gateway.add_facility(facility(8, 12, 120));

    let mut session = h.desk.open_facility_reservation(FACILITY_ID, booking_date()).await.unwrap();
    session.choose_slot(range((10, 0), (11, 0))).unwrap();
    session.select_member(ANNA).await.unwrap();
    session.request_confirmation().unwrap();

    h.gateway.seed_reservation(FACILITY_ID, 98, range((10, 30), (11, 30)));

    let err = session.confirm().await.unwrap_err();
    assert!(matches!(err, SessionError::Booking(BookingError::Conflict(_))));
    assert_eq!(session.state(), &SessionState::SlotOrQuantitySelection);
    assert!(session.chosen_slot().is_none());
    assert_eq!(session.selection().selected_member().map(|d| d.member.id), Some(ANNA));

    let slots = session.availability().as_facility().unwrap().slots.clone();
    assert_eq!(slots, vec![range((8, 0), (10, 30)), range((11, 30), (12, 0))]);

    session.choose_slot(range((9, 0), (10, 0))).unwrap();
    session.request_confirmation().unwrap();
    session.confirm().await.unwrap();
}

#[tokio::test]
async fn facility_update_may_overlap_its_own_interval() {
    let h = harness();
    h.gateway.add_facility(facility(8, 12, 120));
    let own = h.gateway.seed_reservation(FACILITY_ID, ANNA, range((10, 0), (11, 0)));
    h.gateway.seed_reservation(FACILITY_ID, 99, range((11, 30), (12, 0)));

    let mut session = h.desk.open_update(Allocation::Reservation(own)).await.unwrap();
    session.begin_edit().unwrap();
    assert_eq!(session.chosen_slot(), Some(&range((10, 0), (11, 0))));

    session.choose_slot(range((10, 30), (11, 30))).unwrap();
    assert_eq!(session.state(), &SessionState::SlotOrQuantitySelection);
    session.request_confirmation().unwrap();
    let receipt = session.confirm().await.unwrap();
    assert_eq!(receipt.kind, CommitKind::Updated);

    let stored = h.gateway.reservations(FACILITY_ID);
    let anna = stored.iter().find(|r| r.member_id == ANNA).unwrap();
    assert_eq!(anna.interval, range((10, 30), (11, 30)));
}

// --- Открытие сессий ---

#[tokio::test]
async fn only_one_session_at_a_time() {
    let h = harness();
    h.gateway.add_event(event(5));

    let first = h.desk.open_event_registration(EVENT_ID).await.unwrap();
    assert!(matches!(
        h.desk.open_event_registration(EVENT_ID).await,
        Err(SessionError::AlreadyOpen)
    ));

    first.close();
    assert!(!h.desk.registry().is_busy());
    assert!(h.desk.open_event_registration(EVENT_ID).await.is_ok());
}

#[tokio::test]
async fn past_events_and_closed_facilities_are_not_bookable() {
    let h = harness();
    h.gateway.add_event(EventResource {
        date: chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        ..event(5)
    });
    let mut closed = facility(8, 12, 60);
    closed.status = FacilityStatus::Maintenance;
    h.gateway.add_facility(closed);

    assert!(matches!(
        h.desk.open_event_registration(EVENT_ID).await,
        Err(SessionError::NotBookable(..))
    ));
    assert!(matches!(
        h.desk.open_facility_reservation(FACILITY_ID, booking_date()).await,
        Err(SessionError::NotBookable(..))
    ));
    assert!(!h.desk.registry().is_busy());
}

#[tokio::test]
async fn closing_mid_flow_has_no_side_effects() {
    let h = harness();
    h.gateway.add_event(event(5));

    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();
    session.request_confirmation().unwrap();
    session.close();

    assert_eq!(h.gateway.commit_count(), 0);
    assert!(h.gateway.registrations(EVENT_ID).is_empty());
    assert!(!h.desk.registry().is_busy());
}

#[tokio::test]
async fn unauthorized_load_hands_off_without_toast() {
    let h = harness();
    h.gateway.add_event(event(5));
    h.gateway.fail_next_fetch(BookingError::Unauthorized);

    assert!(matches!(
        h.desk.open_event_registration(EVENT_ID).await,
        Err(SessionError::Booking(BookingError::Unauthorized))
    ));
    assert_eq!(h.auth.expirations(), 1);
    assert!(h.notifier.toasts().is_empty());
}

// --- Истёкшая авторизация вне коммита ---

fn expired() -> SessionState {
    SessionState::Settled(Settlement::Failed(BookingError::Unauthorized))
}

#[tokio::test(start_paused = true)]
async fn unauthorized_member_search_ends_the_session() {
    let h = harness();
    h.gateway.add_event(event(5));
    let mut session = h.desk.open_event_registration(EVENT_ID).await.unwrap();

    h.directory.fail_with(Some(DirectoryError::Unauthorized));
    session.search("an").unwrap();
    let err = session.settle_search().await.unwrap_err();

    assert!(matches!(err, SessionError::Booking(BookingError::Unauthorized)));
    assert_eq!(session.state(), &expired());
    assert_eq!(h.auth.expirations(), 1);
    assert!(h.notifier.toasts().is_empty());

    // дальнейшие действия отклоняются, повторной передачи нет
    assert!(session.search("ann").is_err());
    assert!(session.select_member(ANNA).await.is_err());
    assert_eq!(h.auth.expirations(), 1);
}

#[tokio::test]
async fn unauthorized_member_lookup_ends_the_session() {
    let h = harness();
    h.gateway.add_event(event(5));
    let mut session = h.desk.open_event_registration(EVENT_ID).await.unwrap();

    h.directory.fail_with(Some(DirectoryError::Unauthorized));
    let err = session.select_member(ANNA).await.unwrap_err();

    assert!(matches!(err, SessionError::Booking(BookingError::Unauthorized)));
    assert_eq!(session.state(), &expired());
    assert_eq!(h.auth.expirations(), 1);
    assert!(h.notifier.toasts().is_empty());
}

#[tokio::test]
async fn expiry_after_an_accepted_commit_keeps_the_success() {
    let h = harness();
    h.gateway.add_event(event(5));
    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();
    session.request_confirmation().unwrap();

    h.gateway.fail_next_fetch(BookingError::Unauthorized);
    let receipt = session.confirm().await.unwrap();

    assert!(receipt.availability.is_none());
    assert!(matches!(session.state(), SessionState::Settled(Settlement::Succeeded(_))));
    assert_eq!(h.auth.expirations(), 1);
    assert_eq!(h.gateway.registrations(EVENT_ID).len(), 1);
    assert!(h.notifier.logs().iter().any(|l| l.starts_with("Бронирование создано")));
}

#[tokio::test]
async fn unauthorized_refresh_ends_the_session() {
    let h = harness();
    h.gateway.add_event(event(5));
    let mut session = open_event_with_anna(&h).await;

    h.gateway.fail_next_fetch(BookingError::Unauthorized);
    assert!(matches!(
        session.refresh_availability().await,
        Err(SessionError::Booking(BookingError::Unauthorized))
    ));
    assert_eq!(session.state(), &expired());
    assert_eq!(h.auth.expirations(), 1);
}

// --- Карточка участника и новые результаты поиска ---

#[tokio::test(start_paused = true)]
async fn new_results_keep_the_selected_member_card() {
    let h = harness();
    h.gateway.add_event(event(5));
    let mut session = open_event_with_anna(&h).await;
    session.toggle_dependent(11).unwrap();

    session.search("nobody-matches-this").unwrap();
    session.settle_search().await.unwrap();

    assert!(session.search_results().is_empty());
    assert_eq!(session.expanded_member().map(|d| d.member.id), Some(ANNA));
    assert_eq!(session.selection().selected_member().map(|d| d.member.id), Some(ANNA));
    assert_eq!(session.requested_quantity(), 1);

    // повторный клик сворачивает, а не раскрывает заново
    assert_eq!(session.select_member(ANNA).await.unwrap(), Expansion::Collapsed);
    assert!(session.selection().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_search_drops_the_requester_with_the_card() {
    let h = harness();
    h.gateway.add_event(event(5));
    let mut session = open_event_with_anna(&h).await;
    session.set_member_included(true).unwrap();

    h.directory.fail_with(Some(DirectoryError::Unavailable("directory offline".into())));
    session.search("ann").unwrap();
    session.settle_search().await.unwrap();

    assert!(session.expanded_member().is_none());
    assert!(session.selection().is_empty());
    assert_eq!(session.state(), &SessionState::RequesterSelection);
    assert_eq!(h.notifier.count(Severity::Error), 1);
    assert_eq!(h.auth.expirations(), 0);
}
