// Read-path integration tests: duration resolution, slot generation, staff
// filtering, and availability flags against a seeded in-memory store.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use scheduling_cell::models::{GenderPreference, SchedulingError, SlotQuery};
use scheduling_cell::services::availability::AvailabilityService;
use shared_database::rows::fmt_dt;
use shared_database::Db;
use shared_utils::test_utils::{
    assign_service, seed_employee, seed_schedule, seed_break, seed_service, SeedSchedule,
};

// 2026-09-01 is a Tuesday; all timestamps in these tests hang off it so the
// suite is independent of the wall clock.
fn base_now() -> DateTime<Utc> {
    "2026-09-01T08:00:00Z".parse().unwrap()
}

fn tuesday() -> NaiveDate {
    "2026-09-01".parse().unwrap()
}

fn t(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

fn slot_query(service_id: Uuid, date: NaiveDate) -> SlotQuery {
    SlotQuery {
        date,
        service_id,
        pricing_tier_id: None,
        extras: Vec::new(),
        gender_preference: GenderPreference::NoPreference,
        exclude_booking_id: None,
    }
}

fn insert_booking(db: &Db, employee_id: Uuid, service_id: Uuid, start: DateTime<Utc>, status: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.conn()
        .execute(
            "INSERT INTO bookings
                 (id, customer_id, service_id, employee_id, appointment_start,
                  duration_minutes, total_amount, status, payment_status,
                  gender_preference, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 60, 800.0, ?6, 'paid', 'no_preference', ?7, ?7)",
            rusqlite::params![
                id.to_string(),
                Uuid::new_v4().to_string(),
                service_id.to_string(),
                employee_id.to_string(),
                fmt_dt(start),
                status,
                fmt_dt(base_now()),
            ],
        )
        .unwrap();
    id
}

struct Fixture {
    db: Db,
    service_id: Uuid,
}

fn fixture() -> Fixture {
    let db = Db::open_in_memory().unwrap();
    let service_id = seed_service(&db, "Home nursing visit", 60, 800.0);
    seed_schedule(
        &db,
        SeedSchedule {
            min_advance_hours: 0,
            max_advance_days: 30,
            ..Default::default()
        },
    );
    Fixture { db, service_id }
}

fn availability(db: &Db) -> AvailabilityService {
    AvailabilityService::new(db.clone(), 5)
}

#[test]
fn full_day_grid_for_sixty_minute_service() {
    let f = fixture();
    let employee = seed_employee(&f.db, "Anna", "female");
    assign_service(&f.db, employee, f.service_id);

    let listing = availability(&f.db)
        .get_available_slots(&slot_query(f.service_id, tuesday()), base_now())
        .unwrap();

    assert_eq!(listing.duration_minutes, 60);
    assert_eq!(listing.slots.first().unwrap().start, t("09:00"));
    assert_eq!(listing.slots.last().unwrap().start, t("17:00"));
    assert!(listing.slots.iter().all(|s| s.available));

    // Consecutive starts are exactly one buffer apart.
    for pair in listing.slots.windows(2) {
        assert_eq!((pair[1].start - pair[0].start).num_minutes(), 15);
    }
}

#[test]
fn booked_interval_blocks_slots_with_buffer_padding() {
    let f = fixture();
    let employee = seed_employee(&f.db, "Anna", "female");
    assign_service(&f.db, employee, f.service_id);

    // Existing job 10:00-11:00; padded by the 15-minute buffer it blocks
    // [09:45, 11:15).
    insert_booking(
        &f.db,
        employee,
        f.service_id,
        tuesday().and_time(t("10:00")).and_utc(),
        "confirmed",
    );

    let listing = availability(&f.db)
        .get_available_slots(&slot_query(f.service_id, tuesday()), base_now())
        .unwrap();
    let available: Vec<NaiveTime> = listing
        .slots
        .iter()
        .filter(|s| s.available)
        .map(|s| s.start)
        .collect();
    let unavailable: Vec<NaiveTime> = listing
        .slots
        .iter()
        .filter(|s| !s.available)
        .map(|s| s.start)
        .collect();

    // A 60-minute job starting 09:00 would still be running at 09:45.
    assert!(unavailable.contains(&t("09:00")));
    assert!(unavailable.contains(&t("10:00")));
    assert!(unavailable.contains(&t("11:00")));
    // First start clear of the padded interval.
    assert!(available.contains(&t("11:15")));
    // Unavailable candidates are returned, not dropped.
    assert_eq!(listing.slots.len(), 33);
}

#[test]
fn second_employee_keeps_slot_available() {
    let f = fixture();
    let anna = seed_employee(&f.db, "Anna", "female");
    let boris = seed_employee(&f.db, "Boris", "male");
    assign_service(&f.db, anna, f.service_id);
    assign_service(&f.db, boris, f.service_id);

    insert_booking(
        &f.db,
        anna,
        f.service_id,
        tuesday().and_time(t("10:00")).and_utc(),
        "confirmed",
    );

    let listing = availability(&f.db)
        .get_available_slots(&slot_query(f.service_id, tuesday()), base_now())
        .unwrap();
    // Boris is free, so every slot stays bookable.
    assert!(listing.slots.iter().all(|s| s.available));

    // A female-only request narrows the pool back to Anna.
    let mut query = slot_query(f.service_id, tuesday());
    query.gender_preference = GenderPreference::Female;
    let listing = availability(&f.db)
        .get_available_slots(&query, base_now())
        .unwrap();
    assert!(!listing.slots.iter().find(|s| s.start == t("10:00")).unwrap().available);
}

#[test]
fn cancelled_bookings_free_their_slot_but_no_show_does_not() {
    let f = fixture();
    let employee = seed_employee(&f.db, "Anna", "female");
    assign_service(&f.db, employee, f.service_id);

    insert_booking(
        &f.db,
        employee,
        f.service_id,
        tuesday().and_time(t("10:00")).and_utc(),
        "cancelled",
    );
    let listing = availability(&f.db)
        .get_available_slots(&slot_query(f.service_id, tuesday()), base_now())
        .unwrap();
    assert!(listing.slots.iter().all(|s| s.available));

    insert_booking(
        &f.db,
        employee,
        f.service_id,
        tuesday().and_time(t("14:00")).and_utc(),
        "no_show",
    );
    let listing = availability(&f.db)
        .get_available_slots(&slot_query(f.service_id, tuesday()), base_now())
        .unwrap();
    assert!(!listing.slots.iter().find(|s| s.start == t("14:00")).unwrap().available);
}

#[test]
fn no_matching_gender_distinguishes_from_fully_booked() {
    let f = fixture();
    let anna = seed_employee(&f.db, "Anna", "female");
    assign_service(&f.db, anna, f.service_id);

    let mut query = slot_query(f.service_id, tuesday());
    query.gender_preference = GenderPreference::Male;

    let result = availability(&f.db).get_available_slots(&query, base_now());
    assert!(matches!(result, Err(SchedulingError::NoEligibleStaff)));
}

#[test]
fn excluded_booking_frees_its_own_slot() {
    let f = fixture();
    let employee = seed_employee(&f.db, "Anna", "female");
    assign_service(&f.db, employee, f.service_id);

    let booking_id = insert_booking(
        &f.db,
        employee,
        f.service_id,
        tuesday().and_time(t("10:00")).and_utc(),
        "confirmed",
    );

    let mut query = slot_query(f.service_id, tuesday());
    query.exclude_booking_id = Some(booking_id);

    let listing = availability(&f.db)
        .get_available_slots(&query, base_now())
        .unwrap();
    assert!(listing.slots.iter().find(|s| s.start == t("10:00")).unwrap().available);
}

#[test]
fn break_windows_punch_holes_in_the_grid() {
    let db = Db::open_in_memory().unwrap();
    let service_id = seed_service(&db, "Home nursing visit", 60, 800.0);
    let schedule_id = seed_schedule(
        &db,
        SeedSchedule {
            min_advance_hours: 0,
            max_advance_days: 30,
            ..Default::default()
        },
    );
    seed_break(&db, schedule_id, "13:00", "14:00");
    let employee = seed_employee(&db, "Anna", "female");
    assign_service(&db, employee, service_id);

    let listing = availability(&db)
        .get_available_slots(&slot_query(service_id, tuesday()), base_now())
        .unwrap();
    let starts: Vec<NaiveTime> = listing.slots.iter().map(|s| s.start).collect();

    assert!(starts.contains(&t("12:00")));
    assert!(!starts.contains(&t("12:30")));
    assert!(!starts.contains(&t("13:00")));
    assert!(starts.contains(&t("14:00")));
}

#[test]
fn tier_and_extras_stretch_the_required_window() {
    let f = fixture();
    let employee = seed_employee(&f.db, "Anna", "female");
    assign_service(&f.db, employee, f.service_id);
    let extra_id = shared_utils::test_utils::seed_extra(&f.db, "Physio", 0, 30, 400.0, 2);

    let mut query = slot_query(f.service_id, tuesday());
    query.extras = vec![scheduling_cell::models::ExtraSelection {
        extra_id,
        quantity: 2,
    }];

    let listing = availability(&f.db)
        .get_available_slots(&query, base_now())
        .unwrap();
    // 60 + 2x30 minutes: the last start leaving room before 18:00 is 16:00.
    assert_eq!(listing.duration_minutes, 120);
    assert_eq!(listing.slots.last().unwrap().start, t("16:00"));
}
