// libs/booking-cell/src/services/store.rs
//
// Row mapping and small query helpers shared by the reservation guard and
// the booking service. All helpers take a plain connection so callers can
// run them inside their own transactions.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use scheduling_cell::models::GenderPreference;
use shared_database::rows::{fmt_dt, parse_dt, parse_uuid};

use crate::models::{
    Booking, BookingError, BookingStatus, CancelledBy, PaymentOrder, PaymentPurpose,
    PaymentStatus, ReschedulePaymentStatus,
};

pub const BOOKING_SELECT: &str =
    "SELECT id, customer_id, service_id, pricing_tier_id, employee_id, appointment_start,
            duration_minutes, total_amount, status, payment_status, gender_preference,
            reschedule_attempts, reschedule_payment_status, proposed_reschedule_start,
            policy_id, coupon_code, cancellation_reason, cancelled_by, cancelled_at,
            cancellation_fee, refund_amount, created_at, updated_at
     FROM bookings";

pub fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    let status: String = row.get(8)?;
    let payment_status: String = row.get(9)?;
    let gender_preference: String = row.get(10)?;
    let reschedule_payment: String = row.get(12)?;
    let tier: Option<String> = row.get(3)?;
    let proposed: Option<String> = row.get(13)?;
    let policy: Option<String> = row.get(14)?;
    let cancelled_by: Option<String> = row.get(17)?;
    let cancelled_at: Option<String> = row.get(18)?;

    Ok(Booking {
        id: parse_uuid(0, row.get(0)?)?,
        customer_id: parse_uuid(1, row.get(1)?)?,
        service_id: parse_uuid(2, row.get(2)?)?,
        pricing_tier_id: tier.map(|t| parse_uuid(3, t)).transpose()?,
        employee_id: parse_uuid(4, row.get(4)?)?,
        appointment_start: parse_dt(5, row.get(5)?)?,
        duration_minutes: row.get(6)?,
        total_amount: row.get(7)?,
        status: BookingStatus::parse(&status),
        payment_status: PaymentStatus::parse(&payment_status),
        gender_preference: GenderPreference::parse(&gender_preference),
        reschedule_attempts: row.get(11)?,
        reschedule_payment_status: ReschedulePaymentStatus::parse(&reschedule_payment),
        proposed_reschedule_start: proposed.map(|p| parse_dt(13, p)).transpose()?,
        policy_id: policy.map(|p| parse_uuid(14, p)).transpose()?,
        coupon_code: row.get(15)?,
        cancellation_reason: row.get(16)?,
        cancelled_by: cancelled_by.as_deref().map(CancelledBy::parse),
        cancelled_at: cancelled_at.map(|c| parse_dt(18, c)).transpose()?,
        cancellation_fee: row.get(19)?,
        refund_amount: row.get(20)?,
        created_at: parse_dt(21, row.get(21)?)?,
        updated_at: parse_dt(22, row.get(22)?)?,
    })
}

pub fn get_booking(conn: &Connection, booking_id: Uuid) -> Result<Booking, BookingError> {
    conn.query_row(
        &format!("{} WHERE id = ?1", BOOKING_SELECT),
        params![booking_id.to_string()],
        booking_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => BookingError::NotFound,
        other => BookingError::DatabaseError(other.to_string()),
    })
}

pub fn count_user_redemptions(
    conn: &Connection,
    coupon_code: &str,
    customer_id: Uuid,
) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM coupon_redemptions WHERE coupon_code = ?1 AND customer_id = ?2",
        params![coupon_code, customer_id.to_string()],
        |row| row.get(0),
    )
}

/// Bookings an employee already carries on a date, used for the
/// load-balancing tie-break when assigning staff.
pub fn count_bookings_on_day(
    conn: &Connection,
    employee_id: Uuid,
    date: NaiveDate,
) -> rusqlite::Result<i64> {
    let day_start = fmt_dt(date.and_hms_opt(0, 0, 0).unwrap().and_utc());
    let day_end = fmt_dt((date + chrono::Duration::days(1)).and_hms_opt(0, 0, 0).unwrap().and_utc());
    conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE employee_id = ?1 AND status != 'cancelled'
           AND appointment_start >= ?2 AND appointment_start < ?3",
        params![employee_id.to_string(), day_start, day_end],
        |row| row.get(0),
    )
}

pub fn insert_payment_order(
    conn: &Connection,
    order_id: &str,
    booking_id: Uuid,
    purpose: PaymentPurpose,
    amount: f64,
    now: chrono::DateTime<chrono::Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO payment_orders (id, booking_id, purpose, amount, status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'created', ?5)",
        params![
            order_id,
            booking_id.to_string(),
            purpose.as_str(),
            amount,
            fmt_dt(now)
        ],
    )?;
    Ok(())
}

pub fn get_payment_order(
    conn: &Connection,
    order_id: &str,
) -> Result<(PaymentOrder, String), BookingError> {
    conn.query_row(
        "SELECT id, booking_id, purpose, amount, status FROM payment_orders WHERE id = ?1",
        params![order_id],
        |row| {
            let purpose: String = row.get(2)?;
            let status: String = row.get(4)?;
            Ok((
                PaymentOrder {
                    id: row.get(0)?,
                    booking_id: parse_uuid(1, row.get(1)?)?,
                    purpose: PaymentPurpose::parse(&purpose),
                    amount: row.get(3)?,
                },
                status,
            ))
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => BookingError::NotFound,
        other => BookingError::DatabaseError(other.to_string()),
    })
}

pub fn set_payment_order_status(
    conn: &Connection,
    order_id: &str,
    status: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE payment_orders SET status = ?2 WHERE id = ?1",
        params![order_id, status],
    )?;
    Ok(())
}
