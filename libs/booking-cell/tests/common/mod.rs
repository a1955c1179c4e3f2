// Shared fixture for the booking-cell integration suites: an in-memory
// store seeded with one service, staff, a default schedule, and a policy,
// all pinned to a fixed clock.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use booking_cell::models::CreateBookingRequest;
use scheduling_cell::models::GenderPreference;
use shared_database::rows::fmt_dt;
use shared_database::Db;
use shared_models::auth::User;
use shared_models::state::AppState;
use shared_utils::test_utils::{
    assign_service, seed_employee, seed_policy, seed_schedule, seed_service, test_config,
    SeedPolicy, SeedSchedule,
};

// 2026-09-01 is a Tuesday.
pub fn base_now() -> DateTime<Utc> {
    "2026-09-01T08:00:00Z".parse().unwrap()
}

pub fn wednesday() -> NaiveDate {
    "2026-09-02".parse().unwrap()
}

pub fn t(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

pub struct TestEnv {
    pub state: Arc<AppState>,
    pub db: Db,
    pub service_id: Uuid,
    pub employee_id: Uuid,
    pub policy_id: Uuid,
}

pub fn setup() -> TestEnv {
    setup_with_policy(SeedPolicy::default())
}

pub fn setup_with_policy(policy: SeedPolicy) -> TestEnv {
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
    let employee_id = seed_employee(&db, "Anna", "female");
    assign_service(&db, employee_id, service_id);
    let policy_id = seed_policy(&db, policy);

    let state = Arc::new(AppState::new(test_config(), db.clone()));
    TestEnv {
        state,
        db,
        service_id,
        employee_id,
        policy_id,
    }
}

pub fn customer() -> User {
    User {
        id: Uuid::new_v4().to_string(),
        phone: Some("+15550100".to_string()),
        role: Some("customer".to_string()),
        phone_verified: true,
        created_at: None,
    }
}

pub fn admin() -> User {
    User {
        id: Uuid::new_v4().to_string(),
        phone: None,
        role: Some("admin".to_string()),
        phone_verified: true,
        created_at: None,
    }
}

pub fn create_request(service_id: Uuid, date: NaiveDate, start: NaiveTime) -> CreateBookingRequest {
    CreateBookingRequest {
        service_id,
        pricing_tier_id: None,
        extras: Vec::new(),
        date,
        start,
        gender_preference: GenderPreference::NoPreference,
        coupon_code: None,
    }
}

pub struct BookingRow {
    pub employee_id: Uuid,
    pub service_id: Uuid,
    pub policy_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub start: DateTime<Utc>,
    pub status: &'static str,
    pub total: f64,
    pub attempts: i64,
}

pub fn insert_booking_row(db: &Db, row: BookingRow) -> Uuid {
    let id = Uuid::new_v4();
    db.conn()
        .execute(
            "INSERT INTO bookings
                 (id, customer_id, service_id, employee_id, appointment_start,
                  duration_minutes, total_amount, status, payment_status,
                  gender_preference, reschedule_attempts, policy_id,
                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 60, ?6, ?7, 'paid', 'no_preference', ?8, ?9, ?10, ?10)",
            rusqlite::params![
                id.to_string(),
                row.customer_id.to_string(),
                row.service_id.to_string(),
                row.employee_id.to_string(),
                fmt_dt(row.start),
                row.total,
                row.status,
                row.attempts,
                row.policy_id.map(|p| p.to_string()),
                fmt_dt(base_now()),
            ],
        )
        .unwrap();
    id
}

pub fn booking_column<T: rusqlite::types::FromSql>(db: &Db, booking_id: Uuid, column: &str) -> T {
    db.conn()
        .query_row(
            &format!("SELECT {} FROM bookings WHERE id = ?1", column),
            rusqlite::params![booking_id.to_string()],
            |row| row.get(0),
        )
        .unwrap()
}

pub fn count_rows(db: &Db, table: &str) -> i64 {
    db.conn()
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}
