// libs/booking-cell/src/services/booking.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use catalog_cell::models::BookingPolicySetting;
use catalog_cell::services::catalog::CatalogService;
use scheduling_cell::models::SchedulingError;
use scheduling_cell::services::availability::employee_is_free;
use scheduling_cell::services::schedule::ScheduleService;
use scheduling_cell::services::slots::generate_slots;
use scheduling_cell::services::staff::StaffService;
use shared_database::rows::fmt_dt;
use shared_models::auth::User;
use shared_models::state::AppState;

use crate::models::{
    Booking, BookingError, BookingSearchQuery, BookingStatus, CancelBookingRequest,
    CancelBookingResponse, CancelledBy, CreateBookingRequest, CreateBookingResponse,
    InvoiceEvent, PaymentCallbackRequest, PaymentOrder, PaymentPurpose, PaymentStatus,
    ReschedulePaymentStatus, RescheduleBookingRequest, RescheduleBookingResponse,
};
use crate::services::notifications::{
    CreditLedgerClient, NotificationEvent, NotificationKind, Notifier,
};
use crate::services::payments::PaymentGatewayClient;
use crate::services::policy;
use crate::services::pricing::{fee_only_quote, write_invoice};
use crate::services::reservation::ReservationService;
use crate::services::store;

const CURRENCY: &str = "INR";

pub struct BookingService {
    state: Arc<AppState>,
    gateway: PaymentGatewayClient,
    notifier: Notifier,
    ledger: CreditLedgerClient,
}

impl BookingService {
    pub fn new(state: Arc<AppState>) -> Self {
        let gateway = PaymentGatewayClient::new(&state.config);
        let notifier = Notifier::from_config(&state.config);
        let ledger = CreditLedgerClient::from_config(&state.config);
        Self {
            state,
            gateway,
            notifier,
            ledger,
        }
    }

    // ==========================================================================
    // CREATE
    // ==========================================================================

    /// Reserve the slot atomically, then raise a payment order for the
    /// payable amount. Zero-total bookings confirm immediately.
    pub async fn create_booking(
        &self,
        customer_id: Uuid,
        request: CreateBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<CreateBookingResponse, BookingError> {
        let reservation = ReservationService::new(self.state.clone());
        let (booking, quote) = reservation.reserve(customer_id, &request, now).await?;

        let payment_order = if quote.total > 0.0 {
            let order = self
                .gateway
                .create_order(quote.total, CURRENCY, &booking.id.to_string())
                .await?;
            {
                let conn = self.state.db.conn();
                store::insert_payment_order(
                    &conn,
                    &order.id,
                    booking.id,
                    PaymentPurpose::Initial,
                    quote.total,
                    now,
                )?;
            }
            Some(PaymentOrder {
                id: order.id,
                booking_id: booking.id,
                purpose: PaymentPurpose::Initial,
                amount: quote.total,
            })
        } else {
            // Nothing to collect; the pending -> confirmed transition fires
            // right away.
            self.apply_status(booking.id, booking.status, BookingStatus::Confirmed, now)?;
            None
        };

        self.notifier.dispatch(NotificationEvent {
            kind: NotificationKind::BookingCreated,
            booking_id: booking.id,
            customer_id,
            detail: format!("Booking placed for {}", booking.appointment_start),
        });

        let status = if payment_order.is_none() {
            BookingStatus::Confirmed
        } else {
            booking.status
        };

        Ok(CreateBookingResponse {
            booking_id: booking.id,
            employee_id: booking.employee_id,
            status,
            total_amount: booking.total_amount,
            payment_order,
        })
    }

    // ==========================================================================
    // READ
    // ==========================================================================

    pub fn get_booking(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let conn = self.state.db.conn();
        store::get_booking(&conn, booking_id)
    }

    pub fn search_bookings(&self, query: &BookingSearchQuery) -> Result<Vec<Booking>, BookingError> {
        let mut clauses = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(customer_id) = query.customer_id {
            args.push(customer_id.to_string());
            clauses.push(format!("customer_id = ?{}", args.len()));
        }
        if let Some(employee_id) = query.employee_id {
            args.push(employee_id.to_string());
            clauses.push(format!("employee_id = ?{}", args.len()));
        }
        if let Some(status) = query.status {
            args.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", args.len()));
        }
        if let Some(from) = query.from_date {
            args.push(fmt_dt(from.and_hms_opt(0, 0, 0).unwrap().and_utc()));
            clauses.push(format!("appointment_start >= ?{}", args.len()));
        }
        if let Some(to) = query.to_date {
            args.push(fmt_dt(
                (to + chrono::Duration::days(1)).and_hms_opt(0, 0, 0).unwrap().and_utc(),
            ));
            clauses.push(format!("appointment_start < ?{}", args.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "{}{} ORDER BY appointment_start DESC LIMIT 200",
            store::BOOKING_SELECT,
            where_clause
        );

        let conn = self.state.db.conn();
        let mut stmt = conn.prepare(&sql)?;
        let bookings = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), store::booking_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bookings)
    }

    // ==========================================================================
    // CANCEL
    // ==========================================================================

    #[instrument(skip(self, request, actor), fields(booking_id = %booking_id, actor_id = %actor.id))]
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        request: CancelBookingRequest,
        actor: &User,
        now: DateTime<Utc>,
    ) -> Result<CancelBookingResponse, BookingError> {
        let booking = self.get_booking(booking_id)?;
        let admin_override = request.force && actor.is_admin();

        let minutes_until = (booking.appointment_start - now).num_minutes();
        policy::check_cancellable(booking.status, minutes_until, admin_override)?;

        let policy_snapshot = self.policy_snapshot(&booking);
        let outcome = policy::cancellation_outcome(
            policy_snapshot.as_ref(),
            booking.total_amount,
            minutes_until,
            admin_override,
        );

        let cancelled_by = if actor.is_admin() {
            CancelledBy::Admin
        } else {
            CancelledBy::Customer
        };
        let next_payment_status = if booking.payment_status == PaymentStatus::Paid
            && outcome.refund > 0.0
        {
            PaymentStatus::RefundPending
        } else {
            booking.payment_status
        };

        {
            let mut conn = self.state.db.conn();
            let tx = conn.transaction().map_err(BookingError::from)?;
            tx.execute(
                "UPDATE bookings
                 SET status = 'cancelled', cancellation_reason = ?2, cancelled_by = ?3,
                     cancelled_at = ?4, cancellation_fee = ?5, refund_amount = ?6,
                     payment_status = ?7, updated_at = ?4
                 WHERE id = ?1",
                params![
                    booking.id.to_string(),
                    request.reason,
                    cancelled_by.as_str(),
                    fmt_dt(now),
                    outcome.fee,
                    outcome.refund,
                    next_payment_status.as_str(),
                ],
            )?;
            write_invoice(
                &tx,
                booking.id,
                InvoiceEvent::Cancellation,
                &fee_only_quote(),
                outcome.fee,
                outcome.refund,
                now,
            )?;
            tx.commit().map_err(BookingError::from)?;
        }

        if admin_override {
            // Privileged override: always leaves an audit line with the
            // acting administrator.
            warn!(
                "admin {} force-cancelled booking {} (fee {:.2}, refund {:.2})",
                actor.id, booking.id, outcome.fee, outcome.refund
            );
        } else {
            info!(
                "booking {} cancelled by {} (fee {:.2}, refund {:.2})",
                booking.id,
                cancelled_by.as_str(),
                outcome.fee,
                outcome.refund
            );
        }

        if outcome.credited > 0.0 {
            self.ledger
                .post_credit(booking.id, booking.customer_id, outcome.credited);
        }

        if policy_snapshot
            .as_ref()
            .map(|p| p.notify_on_cancellation)
            .unwrap_or(true)
        {
            self.notifier.dispatch(NotificationEvent {
                kind: NotificationKind::BookingCancelled,
                booking_id: booking.id,
                customer_id: booking.customer_id,
                detail: format!("Refund {:.2}, fee {:.2}", outcome.refund, outcome.fee),
            });
        }

        Ok(CancelBookingResponse {
            refund_amount: outcome.refund,
            fee_charged: outcome.fee,
        })
    }

    // ==========================================================================
    // RESCHEDULE
    // ==========================================================================

    #[instrument(skip(self, request), fields(booking_id = %booking_id))]
    pub async fn reschedule_booking(
        &self,
        booking_id: Uuid,
        request: RescheduleBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<RescheduleBookingResponse, BookingError> {
        let booking = self.get_booking(booking_id)?;
        let new_start = request.date.and_time(request.start).and_utc();

        let policy_snapshot = self.policy_snapshot(&booking);
        let minutes_until = (booking.appointment_start - now).num_minutes();
        policy::check_reschedulable(
            policy_snapshot.as_ref(),
            booking.status,
            booking.reschedule_attempts,
            minutes_until,
            new_start,
            now,
        )?;

        let fee = policy_snapshot.as_ref().map(|p| p.reschedule_fee).unwrap_or(0.0);

        if fee > 0.0 {
            // The new time applies only after the fee clears. Validate the
            // slot now for early feedback, then park the proposal.
            self.check_slot_open(&booking, new_start, now)?;

            let order = self
                .gateway
                .create_order(fee, CURRENCY, &booking.id.to_string())
                .await?;
            {
                let conn = self.state.db.conn();
                store::insert_payment_order(
                    &conn,
                    &order.id,
                    booking.id,
                    PaymentPurpose::Reschedule,
                    fee,
                    now,
                )?;
                conn.execute(
                    "UPDATE bookings
                     SET reschedule_payment_status = 'pending',
                         proposed_reschedule_start = ?2, updated_at = ?3
                     WHERE id = ?1",
                    params![booking.id.to_string(), fmt_dt(new_start), fmt_dt(now)],
                )?;
            }

            debug!(
                "booking {} reschedule to {} awaiting fee payment",
                booking.id, new_start
            );
            return Ok(RescheduleBookingResponse {
                status: booking.status,
                requires_payment: true,
                payment_order: Some(PaymentOrder {
                    id: order.id,
                    booking_id: booking.id,
                    purpose: PaymentPurpose::Reschedule,
                    amount: fee,
                }),
            });
        }

        let reservation = ReservationService::new(self.state.clone());
        let updated = reservation.rebook(&booking, new_start, now).await?;

        if policy_snapshot
            .as_ref()
            .map(|p| p.notify_on_reschedule)
            .unwrap_or(true)
        {
            self.notifier.dispatch(NotificationEvent {
                kind: NotificationKind::BookingRescheduled,
                booking_id: booking.id,
                customer_id: booking.customer_id,
                detail: format!("Moved to {}", new_start),
            });
        }

        Ok(RescheduleBookingResponse {
            status: updated.status,
            requires_payment: false,
            payment_order: None,
        })
    }

    // ==========================================================================
    // PAYMENT CALLBACKS
    // ==========================================================================

    /// Success callback from the gateway. Signature-verified; repeated
    /// deliveries for an already-settled order are no-ops.
    pub async fn confirm_payment(
        &self,
        request: PaymentCallbackRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        if !self.gateway.verify_callback_signature(
            &request.order_id,
            &request.payment_id,
            &request.signature,
        ) {
            warn!("payment callback with bad signature for order {}", request.order_id);
            return Err(BookingError::ValidationError(
                "Invalid payment signature".to_string(),
            ));
        }

        let (order, order_status) = {
            let conn = self.state.db.conn();
            store::get_payment_order(&conn, &request.order_id)?
        };
        let booking = self.get_booking(order.booking_id)?;

        if order_status == "paid" {
            debug!("payment callback replay for order {}", order.id);
            return Ok(booking);
        }

        match order.purpose {
            PaymentPurpose::Initial => {
                policy::validate_status_transition(booking.status, BookingStatus::Confirmed)?;
                {
                    let mut conn = self.state.db.conn();
                    let tx = conn.transaction().map_err(BookingError::from)?;
                    tx.execute(
                        "UPDATE bookings SET status = 'confirmed', payment_status = 'paid', updated_at = ?2
                         WHERE id = ?1",
                        params![booking.id.to_string(), fmt_dt(now)],
                    )?;
                    store::set_payment_order_status(&tx, &order.id, "paid")?;
                    tx.commit().map_err(BookingError::from)?;
                }

                info!("booking {} confirmed on payment {}", booking.id, request.payment_id);
                self.notifier.dispatch(NotificationEvent {
                    kind: NotificationKind::BookingConfirmed,
                    booking_id: booking.id,
                    customer_id: booking.customer_id,
                    detail: "Payment received".to_string(),
                });
                self.get_booking(booking.id)
            }
            PaymentPurpose::Reschedule => self.apply_paid_reschedule(booking, order, now).await,
        }
    }

    /// Failure callback. Initial-payment failures leave the booking pending;
    /// reschedule-fee failures drop the proposed time and keep the original
    /// appointment.
    pub fn fail_payment(&self, order_id: &str, now: DateTime<Utc>) -> Result<(), BookingError> {
        let (order, order_status) = {
            let conn = self.state.db.conn();
            store::get_payment_order(&conn, order_id)?
        };
        if order_status == "paid" || order_status == "failed" {
            return Ok(());
        }

        let mut conn = self.state.db.conn();
        let tx = conn.transaction().map_err(BookingError::from)?;
        match order.purpose {
            PaymentPurpose::Initial => {
                tx.execute(
                    "UPDATE bookings SET payment_status = 'failed', updated_at = ?2 WHERE id = ?1",
                    params![order.booking_id.to_string(), fmt_dt(now)],
                )?;
            }
            PaymentPurpose::Reschedule => {
                tx.execute(
                    "UPDATE bookings
                     SET reschedule_payment_status = 'failed',
                         proposed_reschedule_start = NULL, updated_at = ?2
                     WHERE id = ?1",
                    params![order.booking_id.to_string(), fmt_dt(now)],
                )?;
            }
        }
        store::set_payment_order_status(&tx, order_id, "failed")?;
        tx.commit().map_err(BookingError::from)?;

        info!("payment order {} marked failed", order_id);
        Ok(())
    }

    async fn apply_paid_reschedule(
        &self,
        booking: Booking,
        order: PaymentOrder,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        if booking.reschedule_payment_status != ReschedulePaymentStatus::Pending {
            return Err(BookingError::ValidationError(
                "No reschedule awaiting payment for this booking".to_string(),
            ));
        }
        let Some(proposed) = booking.proposed_reschedule_start else {
            return Err(BookingError::ValidationError(
                "No proposed reschedule time recorded".to_string(),
            ));
        };

        let reservation = ReservationService::new(self.state.clone());
        match reservation.rebook(&booking, proposed, now).await {
            Ok(updated) => {
                {
                    let mut conn = self.state.db.conn();
                    let tx = conn.transaction().map_err(BookingError::from)?;
                    tx.execute(
                        "UPDATE bookings
                         SET reschedule_payment_status = 'paid',
                             proposed_reschedule_start = NULL, updated_at = ?2
                         WHERE id = ?1",
                        params![booking.id.to_string(), fmt_dt(now)],
                    )?;
                    write_invoice(
                        &tx,
                        booking.id,
                        InvoiceEvent::RescheduleFee,
                        &fee_only_quote(),
                        order.amount,
                        order.amount,
                        now,
                    )?;
                    store::set_payment_order_status(&tx, &order.id, "paid")?;
                    tx.commit().map_err(BookingError::from)?;
                }

                info!("booking {} reschedule applied after fee payment", booking.id);
                self.notifier.dispatch(NotificationEvent {
                    kind: NotificationKind::BookingRescheduled,
                    booking_id: booking.id,
                    customer_id: booking.customer_id,
                    detail: format!("Moved to {}", proposed),
                });
                self.get_booking(booking.id)
            }
            Err(BookingError::SlotNoLongerAvailable) => {
                // The slot was lost while payment was in flight. The
                // original appointment stands; fee recovery is delegated to
                // the payment-operations side.
                let conn = self.state.db.conn();
                conn.execute(
                    "UPDATE bookings
                     SET reschedule_payment_status = 'failed',
                         proposed_reschedule_start = NULL, updated_at = ?2
                     WHERE id = ?1",
                    params![booking.id.to_string(), fmt_dt(now)],
                )?;
                store::set_payment_order_status(&conn, &order.id, "paid")?;
                warn!(
                    "booking {} reschedule lost its slot after payment; original kept",
                    booking.id
                );
                Err(BookingError::SlotNoLongerAvailable)
            }
            Err(other) => Err(other),
        }
    }

    // ==========================================================================
    // NO-SHOW SWEEP
    // ==========================================================================

    /// Periodic, idempotent batch: confirmed bookings past their grace
    /// window become no_show. Already-processed rows are never touched
    /// again, so re-running over the same data is a no-op.
    pub fn run_no_show_sweep(&self, now: DateTime<Utc>) -> Result<usize, BookingError> {
        let candidates: Vec<Booking> = {
            let conn = self.state.db.conn();
            let sql = format!(
                "{} WHERE status = 'confirmed' AND appointment_start <= ?1",
                store::BOOKING_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![fmt_dt(now)], store::booking_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let catalog = CatalogService::new(self.state.db.clone());
        let mut policies: HashMap<Uuid, Option<BookingPolicySetting>> = HashMap::new();
        let mut transitioned = 0;

        for booking in candidates {
            let no_show_minutes = booking
                .policy_id
                .and_then(|policy_id| {
                    policies
                        .entry(policy_id)
                        .or_insert_with(|| catalog.get_policy(policy_id).ok())
                        .as_ref()
                        .map(|p| p.no_show_minutes)
                })
                .unwrap_or(30);

            if !policy::no_show_due(booking.status, booking.appointment_start, no_show_minutes, now)
            {
                continue;
            }

            let conn = self.state.db.conn();
            let changed = conn.execute(
                "UPDATE bookings SET status = 'no_show', updated_at = ?2
                 WHERE id = ?1 AND status = 'confirmed'",
                params![booking.id.to_string(), fmt_dt(now)],
            )?;
            if changed > 0 {
                transitioned += 1;
                self.notifier.dispatch(NotificationEvent {
                    kind: NotificationKind::NoShowRecorded,
                    booking_id: booking.id,
                    customer_id: booking.customer_id,
                    detail: "Marked no-show".to_string(),
                });
            }
        }

        if transitioned > 0 {
            info!("no-show sweep transitioned {} bookings", transitioned);
        }
        Ok(transitioned)
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    fn policy_snapshot(&self, booking: &Booking) -> Option<BookingPolicySetting> {
        let catalog = CatalogService::new(self.state.db.clone());
        booking
            .policy_id
            .and_then(|policy_id| catalog.get_policy(policy_id).ok())
    }

    /// Check the requested slot currently passes the read path for this
    /// booking's frozen duration and preference, with the booking excluded
    /// from its own overlap set. Mutates nothing.
    fn check_slot_open(
        &self,
        booking: &Booking,
        new_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        let db = &self.state.db;
        let schedule =
            ScheduleService::new(db.clone()).effective_for_service(booking.service_id)?;
        let starts = generate_slots(
            &schedule,
            new_start.date_naive(),
            booking.duration_minutes,
            now,
        )?;
        if !starts.contains(&new_start.time()) {
            return Err(BookingError::SlotNoLongerAvailable);
        }

        let pool = StaffService::new(db.clone())
            .eligible_employees(booking.service_id, booking.gender_preference)?;
        if pool.is_empty() {
            return Err(BookingError::Scheduling(SchedulingError::NoEligibleStaff));
        }

        let conn = db.conn();
        for employee in &pool {
            if employee_is_free(
                &conn,
                employee.id,
                new_start,
                booking.duration_minutes,
                schedule.buffer_time_minutes,
                Some(booking.id),
            )? {
                return Ok(());
            }
        }
        Err(BookingError::SlotNoLongerAvailable)
    }

    fn apply_status(
        &self,
        booking_id: Uuid,
        current: BookingStatus,
        next: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        policy::validate_status_transition(current, next)?;
        let conn = self.state.db.conn();
        conn.execute(
            "UPDATE bookings SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![booking_id.to_string(), next.as_str(), fmt_dt(now)],
        )?;
        Ok(())
    }
}
