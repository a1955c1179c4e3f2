//! Shared fixtures for cell test suites: token minting and database seeding.

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, NaiveTime, Utc};
use hmac::{Hmac, Mac};
use rusqlite::params;
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::schema::DT_FORMAT;
use shared_database::Db;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_path: ":memory:".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        payment_gateway_url: String::new(),
        payment_key_id: "test-key".to_string(),
        payment_key_secret: "test-key-secret".to_string(),
        notification_webhook_url: String::new(),
        credit_ledger_url: String::new(),
        gender_preference_fee: 100.0,
        max_extras_per_booking: 5,
        no_show_sweep_interval_secs: 300,
    }
}

pub struct TestUser {
    pub id: String,
    pub phone: String,
    pub role: String,
    pub phone_verified: bool,
}

impl TestUser {
    pub fn new(role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            phone: "+15550100".to_string(),
            role: role.to_string(),
            phone_verified: true,
        }
    }

    pub fn customer() -> Self {
        Self::new("customer")
    }

    pub fn admin() -> Self {
        Self::new("admin")
    }

    pub fn unverified_customer() -> Self {
        let mut user = Self::new("customer");
        user.phone_verified = false;
        user
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "phone": user.phone,
            "role": user.role,
            "phone_verified": user.phone_verified,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }
}

// ── Database seeding ──

pub fn seed_service(db: &Db, name: &str, duration_minutes: i64, base_price: f64) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now().format(DT_FORMAT).to_string();
    db.conn()
        .execute(
            "INSERT INTO services (id, name, duration_minutes, base_price, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
            params![id.to_string(), name, duration_minutes, base_price, now],
        )
        .expect("failed to seed service");
    id
}

pub fn seed_pricing_tier(
    db: &Db,
    service_id: Uuid,
    name: &str,
    duration_minutes: i64,
    price: f64,
) -> Uuid {
    let id = Uuid::new_v4();
    db.conn()
        .execute(
            "INSERT INTO pricing_tiers (id, service_id, name, duration_minutes, price, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![id.to_string(), service_id.to_string(), name, duration_minutes, price],
        )
        .expect("failed to seed pricing tier");
    id
}

pub fn seed_extra(
    db: &Db,
    name: &str,
    duration_hours: i64,
    duration_minutes: i64,
    price: f64,
    max_quantity: i64,
) -> Uuid {
    let id = Uuid::new_v4();
    db.conn()
        .execute(
            "INSERT INTO extras (id, name, duration_hours, duration_minutes, price, max_quantity, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
            params![id.to_string(), name, duration_hours, duration_minutes, price, max_quantity],
        )
        .expect("failed to seed extra");
    id
}

pub fn seed_employee(db: &Db, full_name: &str, gender: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.conn()
        .execute(
            "INSERT INTO employees (id, full_name, gender, is_active) VALUES (?1, ?2, ?3, 1)",
            params![id.to_string(), full_name, gender],
        )
        .expect("failed to seed employee");
    id
}

pub fn assign_service(db: &Db, employee_id: Uuid, service_id: Uuid) {
    db.conn()
        .execute(
            "INSERT INTO employee_services (employee_id, service_id, is_active) VALUES (?1, ?2, 1)",
            params![employee_id.to_string(), service_id.to_string()],
        )
        .expect("failed to seed employee-service assignment");
}

pub struct SeedSchedule<'a> {
    pub start_time: &'a str,
    pub end_time: &'a str,
    pub buffer_time_minutes: i64,
    pub working_days: &'a [u8],
    pub min_advance_hours: i64,
    pub max_advance_days: i64,
}

impl Default for SeedSchedule<'_> {
    fn default() -> Self {
        Self {
            start_time: "09:00",
            end_time: "18:00",
            buffer_time_minutes: 15,
            working_days: &[1, 2, 3, 4, 5],
            min_advance_hours: 0,
            max_advance_days: 30,
        }
    }
}

pub fn seed_schedule(db: &Db, schedule: SeedSchedule<'_>) -> Uuid {
    let id = Uuid::new_v4();
    let days = schedule
        .working_days
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",");
    db.conn()
        .execute(
            "INSERT INTO schedule_configs
                 (id, name, min_advance_hours, max_advance_days, buffer_time_minutes,
                  start_time, end_time, working_days, is_default)
             VALUES (?1, 'Standard hours', ?2, ?3, ?4, ?5, ?6, ?7, 1)",
            params![
                id.to_string(),
                schedule.min_advance_hours,
                schedule.max_advance_days,
                schedule.buffer_time_minutes,
                normalize_time(schedule.start_time),
                normalize_time(schedule.end_time),
                days,
            ],
        )
        .expect("failed to seed schedule config");
    id
}

pub fn seed_break(db: &Db, schedule_id: Uuid, start_time: &str, end_time: &str) {
    db.conn()
        .execute(
            "INSERT INTO schedule_breaks (id, schedule_id, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                Uuid::new_v4().to_string(),
                schedule_id.to_string(),
                normalize_time(start_time),
                normalize_time(end_time),
            ],
        )
        .expect("failed to seed break window");
}

pub struct SeedPolicy {
    pub cancellation_policy: &'static str,
    pub cancellation_window_hours: i64,
    pub late_cancellation_fee: f64,
    pub reschedule_window_hours: i64,
    pub reschedule_fee: f64,
    pub max_reschedule_attempts: i64,
    pub reschedule_advance_notice_hours: i64,
    pub no_show_minutes: i64,
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            cancellation_policy: "windowed_fee",
            cancellation_window_hours: 24,
            late_cancellation_fee: 200.0,
            reschedule_window_hours: 2,
            reschedule_fee: 0.0,
            max_reschedule_attempts: 3,
            reschedule_advance_notice_hours: 1,
            no_show_minutes: 30,
        }
    }
}

pub fn seed_policy(db: &Db, policy: SeedPolicy) -> Uuid {
    let id = Uuid::new_v4();
    db.conn()
        .execute(
            "INSERT INTO booking_policies
                 (id, name, cancellation_policy, cancellation_window_hours, late_cancellation_fee,
                  reschedule_window_hours, reschedule_fee, max_reschedule_attempts,
                  reschedule_advance_notice_hours, no_show_minutes,
                  notify_on_cancellation, notify_on_reschedule, admin_override_refund, is_active)
             VALUES (?1, 'Standard policy', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, 1, 'formula', 1)",
            params![
                id.to_string(),
                policy.cancellation_policy,
                policy.cancellation_window_hours,
                policy.late_cancellation_fee,
                policy.reschedule_window_hours,
                policy.reschedule_fee,
                policy.max_reschedule_attempts,
                policy.reschedule_advance_notice_hours,
                policy.no_show_minutes,
            ],
        )
        .expect("failed to seed booking policy");
    id
}

pub struct SeedCoupon<'a> {
    pub code: &'a str,
    pub discount_type: &'a str,
    pub value: f64,
    pub minimum_amount: f64,
    pub maximum_discount: Option<f64>,
    pub usage_limit: Option<i64>,
    pub per_user_limit: Option<i64>,
    pub applicable_services: Option<String>,
    /// Validity window center; defaults to the wall clock so ad-hoc tests
    /// work, while fixed-clock tests pass their own base.
    pub valid_around: Option<chrono::DateTime<Utc>>,
}

impl Default for SeedCoupon<'_> {
    fn default() -> Self {
        Self {
            code: "WELCOME10",
            discount_type: "percentage",
            value: 10.0,
            minimum_amount: 0.0,
            maximum_discount: None,
            usage_limit: None,
            per_user_limit: None,
            applicable_services: None,
            valid_around: None,
        }
    }
}

pub fn seed_coupon(db: &Db, coupon: SeedCoupon<'_>) {
    let base = coupon.valid_around.unwrap_or_else(Utc::now);
    let valid_from = (base - Duration::days(1)).format(DT_FORMAT).to_string();
    let valid_until = (base + Duration::days(30)).format(DT_FORMAT).to_string();
    db.conn()
        .execute(
            "INSERT INTO coupons
                 (code, discount_type, value, minimum_amount, maximum_discount,
                  usage_limit, per_user_limit, used_count, valid_from, valid_until,
                  applicable_services, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?10, 1)",
            params![
                coupon.code,
                coupon.discount_type,
                coupon.value,
                coupon.minimum_amount,
                coupon.maximum_discount,
                coupon.usage_limit,
                coupon.per_user_limit,
                valid_from,
                valid_until,
                coupon.applicable_services,
            ],
        )
        .expect("failed to seed coupon");
}

fn normalize_time(value: &str) -> String {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .expect("invalid time literal in test seed")
        .format("%H:%M:%S")
        .to_string()
}
