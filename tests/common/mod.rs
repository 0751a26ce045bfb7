#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;

use booking_console::catalog::ResourceCatalog;
use booking_console::mocks::{
    InMemoryBookingGateway, MockMemberDirectory, RecordingAuthExpiry, RecordingNotifier,
};
use booking_console::models::{
    Dependent, EventResource, FacilityResource, FacilityStatus, LocalClock, Member, MemberDetails,
    MemberId, TimeRange,
};
use booking_console::services::capacity::CapacityModel;
use booking_console::session::BookingDesk;

pub const EVENT_ID: i64 = 7;
pub const FACILITY_ID: i64 = 3;
pub const ANNA: MemberId = 1;
pub const BORIS: MemberId = 2;

pub fn booking_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 6, 1).unwrap()
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&booking_date().and_hms_opt(hour, minute, 0).unwrap())
}

pub fn range(from: (u32, u32), to: (u32, u32)) -> TimeRange {
    TimeRange::new(at(from.0, from.1), at(to.0, to.1)).unwrap()
}

pub fn event(total_spots: u32) -> EventResource {
    EventResource {
        id: EVENT_ID,
        name: "Летний турнир".into(),
        description: Some("Открытый турнир клуба".into()),
        date: booking_date(),
        total_spots: Some(total_spots),
    }
}

pub fn facility(open: u32, close: u32, max_duration_minutes: u32) -> FacilityResource {
    FacilityResource {
        id: FACILITY_ID,
        name: "Корт 1".into(),
        description: None,
        status: FacilityStatus::Active,
        open_time: NaiveTime::from_hms_opt(open, 0, 0).unwrap(),
        close_time: NaiveTime::from_hms_opt(close, 0, 0).unwrap(),
        max_duration_minutes,
    }
}

pub fn member(id: MemberId, first: &str, last: &str, dependents: &[i64]) -> MemberDetails {
    MemberDetails {
        member: Member {
            id,
            first_name: first.into(),
            last_name: last.into(),
            code: Some(format!("M-{:04}", id)),
        },
        dependents: dependents
            .iter()
            .map(|&dep| Dependent {
                id: dep,
                first_name: FirstName().fake(),
                last_name: last.into(),
                relation: Some("child".into()),
            })
            .collect(),
    }
}

/// Участник со случайным именем, когда имя в тесте не важно.
pub fn random_member(id: MemberId, dependents: &[i64]) -> MemberDetails {
    let first: String = FirstName().fake();
    let last: String = LastName().fake();
    member(id, &first, &last, dependents)
}

pub struct Harness {
    pub gateway: InMemoryBookingGateway,
    pub directory: MockMemberDirectory,
    pub notifier: RecordingNotifier,
    pub auth: RecordingAuthExpiry,
    pub catalog: Arc<ResourceCatalog>,
    pub desk: BookingDesk,
}

pub fn harness() -> Harness {
    let clock = LocalClock::utc();
    let capacity = CapacityModel::new(clock);
    let gateway = InMemoryBookingGateway::new(clock);
    let directory = MockMemberDirectory::new()
        .with_member(member(ANNA, "Anna", "Petrova", &[11, 12]))
        .with_member(random_member(BORIS, &[]));
    let notifier = RecordingNotifier::new();
    let auth = RecordingAuthExpiry::new();

    let catalog = Arc::new(ResourceCatalog::new(
        Arc::new(gateway.clone()),
        Arc::new(gateway.clone()),
        capacity,
        booking_console::cache::DEFAULT_TTL,
    ));
    let desk = BookingDesk::new(
        Arc::new(gateway.clone()),
        Arc::new(directory.clone()),
        Arc::new(notifier.clone()),
        Arc::new(auth.clone()),
        capacity,
    )
    .with_catalog(Arc::clone(&catalog));

    Harness { gateway, directory, notifier, auth, catalog, desk }
}
