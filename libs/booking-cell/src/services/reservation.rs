// libs/booking-cell/src/services/reservation.rs
//
// The write-path guard: Requested -> Validating -> Committed | Rejected.
// Availability reads are optimistic; the commit re-validates the chosen slot
// per employee under that employee-day's lock, inside a transaction, so no
// two overlapping bookings can ever land on the same employee.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use catalog_cell::services::catalog::CatalogService;
use scheduling_cell::models::{Employee, SchedulingError};
use scheduling_cell::services::availability::employee_is_free;
use scheduling_cell::services::duration::DurationResolver;
use scheduling_cell::services::schedule::ScheduleService;
use scheduling_cell::services::slots::generate_slots;
use scheduling_cell::services::staff::StaffService;
use shared_database::rows::fmt_dt;
use shared_models::state::AppState;

use crate::models::{Booking, BookingError, CreateBookingRequest, InvoiceEvent};
use crate::services::pricing::{compute_quote, coupon_discount, write_invoice, Quote};
use crate::services::store;

pub struct ReservationService {
    state: Arc<AppState>,
}

impl ReservationService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Validate the requested slot end-to-end and atomically create the
    /// booking row, returning the committed booking and its price quote.
    /// Loses to a concurrent submission with `SlotNoLongerAvailable`.
    #[instrument(skip(self, request), fields(service_id = %request.service_id, date = %request.date))]
    pub async fn reserve(
        &self,
        customer_id: Uuid,
        request: &CreateBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<(Booking, Quote), BookingError> {
        let db = &self.state.db;
        let catalog = CatalogService::new(db.clone());

        // Re-run the read path: duration, slot grid, staff pool.
        let resolver = DurationResolver::new(
            CatalogService::new(db.clone()),
            self.state.config.max_extras_per_booking,
        );
        let resolved = resolver.resolve(request.service_id, request.pricing_tier_id, &request.extras)?;

        let schedule = ScheduleService::new(db.clone()).effective_for_service(request.service_id)?;
        let starts = generate_slots(&schedule, request.date, resolved.total_minutes, now)?;
        if !starts.contains(&request.start) {
            // Off-grid requests and slots that slipped past the advance
            // cutoff both read as "gone" to the client, which retries by
            // re-querying availability.
            return Err(BookingError::SlotNoLongerAvailable);
        }

        let pool = StaffService::new(db.clone())
            .eligible_employees(request.service_id, request.gender_preference)?;
        if pool.is_empty() {
            return Err(BookingError::Scheduling(SchedulingError::NoEligibleStaff));
        }

        // Price the selection, validating any coupon against current usage.
        let coupon = match &request.coupon_code {
            Some(code) => Some(catalog.get_coupon(code).map_err(|_| {
                BookingError::CouponInvalid("Unknown coupon code".to_string())
            })?),
            None => None,
        };
        let gender_fee = self.state.config.gender_preference_fee;
        let subtotal = resolved.base_price()
            + resolved.extras_price()
            + if request.gender_preference.is_set() { gender_fee } else { 0.0 };
        let discount = match &coupon {
            Some(coupon) => {
                let redemptions = {
                    let conn = db.conn();
                    store::count_user_redemptions(&conn, &coupon.code, customer_id)?
                };
                coupon_discount(coupon, request.service_id, subtotal, redemptions, now)?
            }
            None => 0.0,
        };
        let quote = compute_quote(&resolved, request.gender_preference, gender_fee, discount);

        let policy_id = catalog.active_policy().ok().map(|p| p.id);
        let slot_start = request.date.and_time(request.start).and_utc();

        // Candidate order: fewest bookings that day first, employee id as
        // the tie-break.
        let candidates = self.rank_candidates(pool, request.date)?;

        for employee in candidates {
            let _day_lock = self.state.locks.acquire(employee.id, request.date).await;

            let mut conn = db.conn();
            let tx = conn.transaction().map_err(BookingError::from)?;

            if !employee_is_free(
                &tx,
                employee.id,
                slot_start,
                resolved.total_minutes,
                schedule.buffer_time_minutes,
                None,
            )? {
                debug!("employee {} lost re-check for {}", employee.id, slot_start);
                continue;
            }

            let booking_id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO bookings
                     (id, customer_id, service_id, pricing_tier_id, employee_id,
                      appointment_start, duration_minutes, total_amount, status,
                      payment_status, gender_preference, reschedule_attempts,
                      reschedule_payment_status, policy_id, coupon_code,
                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', 'unpaid', ?9, 0,
                         'not_required', ?10, ?11, ?12, ?12)",
                params![
                    booking_id.to_string(),
                    customer_id.to_string(),
                    request.service_id.to_string(),
                    request.pricing_tier_id.map(|id| id.to_string()),
                    employee.id.to_string(),
                    fmt_dt(slot_start),
                    resolved.total_minutes,
                    quote.total,
                    request.gender_preference.as_str(),
                    policy_id.map(|id| id.to_string()),
                    request.coupon_code,
                    fmt_dt(now),
                ],
            )?;

            for (extra, quantity) in &resolved.extras {
                tx.execute(
                    "INSERT INTO booking_extras (booking_id, extra_id, quantity, unit_price, duration_minutes)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        booking_id.to_string(),
                        extra.id.to_string(),
                        quantity,
                        extra.price,
                        extra.total_duration_minutes(),
                    ],
                )?;
            }

            // Coupon usage mutates only on successful commit, inside the
            // same transaction as the booking row.
            if let Some(coupon) = &coupon {
                tx.execute(
                    "UPDATE coupons SET used_count = used_count + 1 WHERE code = ?1",
                    params![coupon.code],
                )?;
                tx.execute(
                    "INSERT INTO coupon_redemptions (id, coupon_code, customer_id, booking_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        Uuid::new_v4().to_string(),
                        coupon.code,
                        customer_id.to_string(),
                        booking_id.to_string(),
                        fmt_dt(now),
                    ],
                )?;
            }

            write_invoice(
                &tx,
                booking_id,
                InvoiceEvent::Initial,
                &quote,
                0.0,
                quote.total,
                now,
            )?;

            tx.commit().map_err(BookingError::from)?;

            let booking = store::get_booking(&conn, booking_id)?;
            info!(
                "booking {} committed for employee {} at {}",
                booking_id, employee.id, slot_start
            );
            return Ok((booking, quote));
        }

        warn!(
            "reservation rejected: slot {} on {} taken during commit",
            request.start, request.date
        );
        Err(BookingError::SlotNoLongerAvailable)
    }

    /// Atomically move an existing booking to a new start time, re-running
    /// the full slot validation with the booking excluded from its own
    /// overlap set. Used by free reschedules and by the post-payment apply
    /// step of fee-bearing ones.
    #[instrument(skip(self, booking), fields(booking_id = %booking.id))]
    pub async fn rebook(
        &self,
        booking: &Booking,
        new_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        let db = &self.state.db;
        let new_date = new_start.date_naive();

        let schedule = ScheduleService::new(db.clone()).effective_for_service(booking.service_id)?;
        // Duration and gender preference stay frozen on the booking row.
        let starts = generate_slots(&schedule, new_date, booking.duration_minutes, now)?;
        if !starts.contains(&new_start.time()) {
            return Err(BookingError::SlotNoLongerAvailable);
        }

        let pool = StaffService::new(db.clone())
            .eligible_employees(booking.service_id, booking.gender_preference)?;
        if pool.is_empty() {
            return Err(BookingError::Scheduling(SchedulingError::NoEligibleStaff));
        }
        let candidates = self.rank_candidates(pool, new_date)?;

        for employee in candidates {
            let _day_lock = self.state.locks.acquire(employee.id, new_date).await;

            let mut conn = db.conn();
            let tx = conn.transaction().map_err(BookingError::from)?;

            if !employee_is_free(
                &tx,
                employee.id,
                new_start,
                booking.duration_minutes,
                schedule.buffer_time_minutes,
                Some(booking.id),
            )? {
                continue;
            }

            tx.execute(
                "UPDATE bookings
                 SET appointment_start = ?2, employee_id = ?3,
                     reschedule_attempts = reschedule_attempts + 1, updated_at = ?4
                 WHERE id = ?1",
                params![
                    booking.id.to_string(),
                    fmt_dt(new_start),
                    employee.id.to_string(),
                    fmt_dt(now),
                ],
            )?;
            tx.commit().map_err(BookingError::from)?;

            let updated = store::get_booking(&conn, booking.id)?;
            info!(
                "booking {} rebooked to {} with employee {}",
                booking.id, new_start, employee.id
            );
            return Ok(updated);
        }

        Err(BookingError::SlotNoLongerAvailable)
    }

    fn rank_candidates(
        &self,
        pool: Vec<Employee>,
        date: chrono::NaiveDate,
    ) -> Result<Vec<Employee>, BookingError> {
        let conn = self.state.db.conn();
        let mut ranked = pool
            .into_iter()
            .map(|employee| {
                store::count_bookings_on_day(&conn, employee.id, date)
                    .map(|count| (count, employee))
            })
            .collect::<rusqlite::Result<Vec<_>>>()?;
        ranked.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
        Ok(ranked.into_iter().map(|(_, employee)| employee).collect())
    }
}
