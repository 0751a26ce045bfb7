use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use proptest::prelude::*;
use proptest::test_runner::Config;
use uuid::Uuid;

use booking_console::models::{
    AllocationStatus, EventRegistration, EventResource, FacilityReservation, FacilityResource,
    FacilityStatus, TimeRange,
};
use booking_console::services::capacity::CapacityModel;

const OPEN_HOUR: u32 = 8;
const WINDOW_MINUTES: i64 = 14 * 60;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2031, 3, 14).unwrap()
}

fn facility() -> FacilityResource {
    FacilityResource {
        id: 1,
        name: "Бассейн".into(),
        description: None,
        status: FacilityStatus::Active,
        open_time: NaiveTime::from_hms_opt(OPEN_HOUR, 0, 0).unwrap(),
        close_time: NaiveTime::from_hms_opt(OPEN_HOUR + 14, 0, 0).unwrap(),
        max_duration_minutes: 120,
    }
}

fn status(active: bool) -> AllocationStatus {
    if active {
        AllocationStatus::Active
    } else {
        AllocationStatus::Cancelled
    }
}

proptest! {
    #![proptest_config(Config::with_cases(128))]

    #[test]
    fn event_availability_is_total_minus_active(
        total in 0_u32..200,
        allocations in prop::collection::vec((1_u32..20, any::<bool>()), 0..30)
    ) {
        let event = EventResource {
            id: 5,
            name: "Лекция".into(),
            description: None,
            date: date(),
            total_spots: Some(total),
        };
        let registrations: Vec<EventRegistration> = allocations
            .iter()
            .enumerate()
            .map(|(i, &(quantity, active))| EventRegistration {
                id: Uuid::new_v4(),
                event_id: 5,
                member_id: i as i64,
                quantity,
                dependent_ids: Vec::new(),
                status: status(active),
            })
            .collect();

        let occupied: u32 = allocations.iter().filter(|(_, a)| *a).map(|(q, _)| q).sum();
        let availability = CapacityModel::compute_event_availability(&event, &registrations).unwrap();

        prop_assert_eq!(availability.occupied, occupied);
        prop_assert_eq!(availability.available, total.saturating_sub(occupied));
        prop_assert_eq!(availability.is_full(), occupied >= total);
    }

    #[test]
    fn facility_slots_partition_the_window(
        reservations in prop::collection::vec(
            (-60_i64..WINDOW_MINUTES + 60, 1_i64..180, any::<bool>()),
            0..12
        )
    ) {
        let open = Utc.from_utc_datetime(&date().and_hms_opt(OPEN_HOUR, 0, 0).unwrap());
        let reservations: Vec<FacilityReservation> = reservations
            .iter()
            .enumerate()
            .map(|(i, &(offset, len, active))| FacilityReservation {
                id: Uuid::new_v4(),
                facility_id: 1,
                member_id: i as i64,
                interval: TimeRange::new(
                    open + Duration::minutes(offset),
                    open + Duration::minutes(offset + len),
                )
                .unwrap(),
                status: status(active),
            })
            .collect();

        let availability = CapacityModel::default()
            .compute_facility_slots(&facility(), &reservations, date())
            .unwrap();

        for pair in availability.slots.windows(2) {
            prop_assert!(pair[0].end < pair[1].start, "slots must be sorted and separated");
        }

        // каждая минута окна либо свободна, либо занята активной бронью
        for minute in 0..WINDOW_MINUTES {
            let one_minute = TimeRange::new(
                open + Duration::minutes(minute),
                open + Duration::minutes(minute + 1),
            )
            .unwrap();
            let busy = reservations
                .iter()
                .any(|r| r.is_active() && r.interval.overlaps(&one_minute));
            let free = availability.slots.iter().any(|s| s.contains(&one_minute));
            prop_assert!(busy != free, "minute {} busy={} free={}", minute, busy, free);
        }

        for slot in &availability.slots {
            prop_assert!(availability.window.contains(slot));
        }
    }
}
