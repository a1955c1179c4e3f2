use anyhow::Context;
use rusqlite::Connection;

/// Wall-clock storage format for all datetime columns. Values are written in
/// the single operating timezone (UTC) so lexicographic comparison matches
/// chronological order in SQL.
pub const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS services (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    base_price REAL NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pricing_tiers (
    id TEXT PRIMARY KEY,
    service_id TEXT NOT NULL REFERENCES services(id),
    name TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    price REAL NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS extras (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    duration_hours INTEGER NOT NULL DEFAULT 0,
    duration_minutes INTEGER NOT NULL DEFAULT 0,
    price REAL NOT NULL,
    max_quantity INTEGER NOT NULL DEFAULT 1,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS employees (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    gender TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS employee_services (
    employee_id TEXT NOT NULL REFERENCES employees(id),
    service_id TEXT NOT NULL REFERENCES services(id),
    is_active INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (employee_id, service_id)
);

CREATE TABLE IF NOT EXISTS schedule_configs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    min_advance_hours INTEGER NOT NULL,
    max_advance_days INTEGER NOT NULL,
    buffer_time_minutes INTEGER NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    working_days TEXT NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS schedule_breaks (
    id TEXT PRIMARY KEY,
    schedule_id TEXT NOT NULL REFERENCES schedule_configs(id),
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schedule_service_overrides (
    schedule_id TEXT NOT NULL REFERENCES schedule_configs(id),
    service_id TEXT NOT NULL REFERENCES services(id),
    min_advance_hours INTEGER,
    max_advance_days INTEGER,
    buffer_time_minutes INTEGER,
    start_time TEXT,
    end_time TEXT,
    working_days TEXT,
    PRIMARY KEY (schedule_id, service_id)
);

CREATE TABLE IF NOT EXISTS booking_policies (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    cancellation_policy TEXT NOT NULL,
    cancellation_window_hours INTEGER NOT NULL,
    late_cancellation_fee REAL NOT NULL,
    reschedule_window_hours INTEGER NOT NULL,
    reschedule_fee REAL NOT NULL,
    max_reschedule_attempts INTEGER NOT NULL,
    reschedule_advance_notice_hours INTEGER NOT NULL,
    no_show_minutes INTEGER NOT NULL,
    notify_on_cancellation INTEGER NOT NULL DEFAULT 1,
    notify_on_reschedule INTEGER NOT NULL DEFAULT 1,
    admin_override_refund TEXT NOT NULL DEFAULT 'formula',
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS coupons (
    code TEXT PRIMARY KEY,
    discount_type TEXT NOT NULL,
    value REAL NOT NULL,
    minimum_amount REAL NOT NULL DEFAULT 0,
    maximum_discount REAL,
    usage_limit INTEGER,
    per_user_limit INTEGER,
    used_count INTEGER NOT NULL DEFAULT 0,
    valid_from TEXT NOT NULL,
    valid_until TEXT NOT NULL,
    applicable_services TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS coupon_redemptions (
    id TEXT PRIMARY KEY,
    coupon_code TEXT NOT NULL REFERENCES coupons(code),
    customer_id TEXT NOT NULL,
    booking_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bookings (
    id TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL,
    service_id TEXT NOT NULL REFERENCES services(id),
    pricing_tier_id TEXT REFERENCES pricing_tiers(id),
    employee_id TEXT NOT NULL REFERENCES employees(id),
    appointment_start TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    total_amount REAL NOT NULL,
    status TEXT NOT NULL,
    payment_status TEXT NOT NULL,
    gender_preference TEXT NOT NULL,
    reschedule_attempts INTEGER NOT NULL DEFAULT 0,
    reschedule_payment_status TEXT NOT NULL DEFAULT 'not_required',
    proposed_reschedule_start TEXT,
    policy_id TEXT REFERENCES booking_policies(id),
    coupon_code TEXT,
    cancellation_reason TEXT,
    cancelled_by TEXT,
    cancelled_at TEXT,
    cancellation_fee REAL,
    refund_amount REAL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bookings_employee_start
    ON bookings(employee_id, appointment_start);
CREATE INDEX IF NOT EXISTS idx_bookings_customer ON bookings(customer_id);

CREATE TABLE IF NOT EXISTS booking_extras (
    booking_id TEXT NOT NULL REFERENCES bookings(id),
    extra_id TEXT NOT NULL REFERENCES extras(id),
    quantity INTEGER NOT NULL,
    unit_price REAL NOT NULL,
    duration_minutes INTEGER NOT NULL,
    PRIMARY KEY (booking_id, extra_id)
);

CREATE TABLE IF NOT EXISTS payment_orders (
    id TEXT PRIMARY KEY,
    booking_id TEXT NOT NULL REFERENCES bookings(id),
    purpose TEXT NOT NULL,
    amount REAL NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invoices (
    id TEXT PRIMARY KEY,
    booking_id TEXT NOT NULL REFERENCES bookings(id),
    event TEXT NOT NULL,
    base_amount REAL NOT NULL,
    extras_amount REAL NOT NULL,
    gender_preference_fee REAL NOT NULL,
    coupon_discount REAL NOT NULL,
    fee_amount REAL NOT NULL,
    total_amount REAL NOT NULL,
    created_at TEXT NOT NULL
);
";

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(SCHEMA)
        .context("failed to apply database schema")?;
    Ok(())
}
