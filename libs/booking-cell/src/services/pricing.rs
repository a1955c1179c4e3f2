// libs/booking-cell/src/services/pricing.rs
//
// Pure price computation plus the immutable invoice snapshot writer.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::debug;
use uuid::Uuid;

use catalog_cell::models::{Coupon, DiscountType};
use scheduling_cell::models::GenderPreference;
use scheduling_cell::services::duration::ResolvedSelection;
use shared_database::rows::fmt_dt;

use crate::models::{BookingError, InvoiceEvent};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub base_amount: f64,
    pub extras_amount: f64,
    pub gender_preference_fee: f64,
    pub coupon_discount: f64,
    pub total: f64,
}

/// `total = base + extras + gender fee - coupon discount`, floored at zero.
pub fn compute_quote(
    resolved: &ResolvedSelection,
    preference: GenderPreference,
    gender_preference_fee: f64,
    coupon_discount: f64,
) -> Quote {
    let base_amount = resolved.base_price();
    let extras_amount = resolved.extras_price();
    let fee = if preference.is_set() {
        gender_preference_fee
    } else {
        0.0
    };
    let subtotal = base_amount + extras_amount + fee;
    let discount = coupon_discount.min(subtotal);

    Quote {
        base_amount,
        extras_amount,
        gender_preference_fee: fee,
        coupon_discount: discount,
        total: (subtotal - discount).max(0.0),
    }
}

/// Discount for a validated coupon, or `CouponInvalid` with the reason a
/// customer should see. The discount base is the pre-discount subtotal.
pub fn coupon_discount(
    coupon: &Coupon,
    service_id: Uuid,
    subtotal: f64,
    user_redemptions: i64,
    now: DateTime<Utc>,
) -> Result<f64, BookingError> {
    if !coupon.is_active {
        return Err(BookingError::CouponInvalid("Coupon is inactive".to_string()));
    }
    if now < coupon.valid_from || now > coupon.valid_until {
        return Err(BookingError::CouponInvalid(
            "Coupon is outside its validity window".to_string(),
        ));
    }
    if let Some(limit) = coupon.usage_limit {
        if coupon.used_count >= limit {
            return Err(BookingError::CouponInvalid(
                "Coupon usage limit reached".to_string(),
            ));
        }
    }
    if let Some(limit) = coupon.per_user_limit {
        if user_redemptions >= limit {
            return Err(BookingError::CouponInvalid(
                "You have already used this coupon".to_string(),
            ));
        }
    }
    if subtotal < coupon.minimum_amount {
        return Err(BookingError::CouponInvalid(format!(
            "Order must be at least {:.2} to use this coupon",
            coupon.minimum_amount
        )));
    }
    if !coupon.applies_to(service_id) {
        return Err(BookingError::CouponInvalid(
            "Coupon does not apply to this service".to_string(),
        ));
    }

    let discount = match coupon.discount_type {
        DiscountType::Percentage => {
            let raw = subtotal * coupon.value / 100.0;
            match coupon.maximum_discount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        DiscountType::Fixed => coupon.value.min(subtotal),
    };

    debug!("coupon {} grants discount {:.2}", coupon.code, discount);
    Ok(discount)
}

/// Append an invoice snapshot row. Runs on the caller's connection so the
/// booking-commit transaction can include it atomically.
#[allow(clippy::too_many_arguments)]
pub fn write_invoice(
    conn: &Connection,
    booking_id: Uuid,
    event: InvoiceEvent,
    quote: &Quote,
    fee_amount: f64,
    total_amount: f64,
    now: DateTime<Utc>,
) -> rusqlite::Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO invoices
             (id, booking_id, event, base_amount, extras_amount, gender_preference_fee,
              coupon_discount, fee_amount, total_amount, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id.to_string(),
            booking_id.to_string(),
            event.as_str(),
            quote.base_amount,
            quote.extras_amount,
            quote.gender_preference_fee,
            quote.coupon_discount,
            fee_amount,
            total_amount,
            fmt_dt(now),
        ],
    )?;
    Ok(id)
}

/// Zeroed quote for fee-only invoice events (reschedule fee, cancellation).
pub fn fee_only_quote() -> Quote {
    Quote {
        base_amount: 0.0,
        extras_amount: 0.0,
        gender_preference_fee: 0.0,
        coupon_discount: 0.0,
        total: 0.0,
    }
}
