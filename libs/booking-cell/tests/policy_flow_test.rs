// Policy engine integration tests: cancellation windows and refunds,
// reschedule limits and fee payment, payment callbacks, and the no-show
// sweep.

mod common;

use booking_cell::models::{
    BookingError, BookingStatus, CancelBookingRequest, PaymentCallbackRequest,
    RescheduleBookingRequest,
};
use booking_cell::services::booking::BookingService;
use chrono::Duration;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared_utils::test_utils::SeedPolicy;
use uuid::Uuid;

use common::*;

fn sign(order_id: &str, payment_id: &str) -> String {
    // Must mirror the gateway client's callback signature scheme.
    let mut mac = Hmac::<Sha256>::new_from_slice("test-key-secret".as_bytes()).unwrap();
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn callback(order_id: &str, payment_id: &str) -> PaymentCallbackRequest {
    PaymentCallbackRequest {
        order_id: order_id.to_string(),
        payment_id: payment_id.to_string(),
        signature: sign(order_id, payment_id),
    }
}

// ==============================================================================
// CANCELLATION
// ==============================================================================

#[tokio::test]
async fn late_cancellation_inside_window_charges_fee() {
    let env = setup();
    // Appointment three hours out, well inside the 24-hour window.
    let booking_id = insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: base_now() + Duration::hours(3),
            status: "confirmed",
            total: 1000.0,
            attempts: 0,
        },
    );

    let service = BookingService::new(env.state.clone());
    let response = service
        .cancel_booking(booking_id, CancelBookingRequest { reason: None, force: false }, &customer(), base_now())
        .await
        .unwrap();

    assert_eq!(response.fee_charged, 200.0);
    assert_eq!(response.refund_amount, 800.0);
    assert_eq!(booking_column::<String>(&env.db, booking_id, "status"), "cancelled");
    assert_eq!(
        booking_column::<String>(&env.db, booking_id, "payment_status"),
        "refund_pending"
    );
    assert_eq!(count_rows(&env.db, "invoices"), 1);
}

#[tokio::test]
async fn early_cancellation_outside_window_is_free() {
    let env = setup();
    let booking_id = insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: base_now() + Duration::hours(48),
            status: "confirmed",
            total: 1000.0,
            attempts: 0,
        },
    );

    let service = BookingService::new(env.state.clone());
    let response = service
        .cancel_booking(booking_id, CancelBookingRequest { reason: None, force: false }, &customer(), base_now())
        .await
        .unwrap();

    assert_eq!(response.fee_charged, 0.0);
    assert_eq!(response.refund_amount, 1000.0);
}

#[tokio::test]
async fn past_appointment_cancellation_needs_admin_force() {
    let env = setup();
    let booking_id = insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: base_now() - Duration::hours(1),
            status: "confirmed",
            total: 1000.0,
            attempts: 0,
        },
    );
    let service = BookingService::new(env.state.clone());

    let result = service
        .cancel_booking(booking_id, CancelBookingRequest { reason: None, force: false }, &customer(), base_now())
        .await;
    assert!(matches!(result, Err(BookingError::CancellationNotAllowed(_))));

    let response = service
        .cancel_booking(
            booking_id,
            CancelBookingRequest { reason: Some("family emergency".to_string()), force: true },
            &admin(),
            base_now(),
        )
        .await
        .unwrap();
    // Default policy config runs the refund formula even on override, and
    // one hour past start is inside the late window.
    assert_eq!(response.fee_charged, 200.0);
    assert_eq!(booking_column::<String>(&env.db, booking_id, "cancelled_by"), "admin");
}

#[tokio::test]
async fn cancelled_booking_cannot_be_cancelled_again() {
    let env = setup();
    let booking_id = insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: base_now() + Duration::hours(48),
            status: "cancelled",
            total: 1000.0,
            attempts: 0,
        },
    );

    let service = BookingService::new(env.state.clone());
    let result = service
        .cancel_booking(booking_id, CancelBookingRequest { reason: None, force: false }, &customer(), base_now())
        .await;
    assert!(matches!(result, Err(BookingError::InvalidStatusTransition(_))));
}

// ==============================================================================
// RESCHEDULE
// ==============================================================================

#[tokio::test]
async fn exhausted_attempts_reject_even_far_out() {
    let env = setup();
    // Attempts already at the policy maximum of 3; the appointment is still
    // weeks away.
    let booking_id = insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: wednesday().and_time(t("10:00")).and_utc() + Duration::days(14),
            status: "confirmed",
            total: 800.0,
            attempts: 3,
        },
    );

    let service = BookingService::new(env.state.clone());
    let result = service
        .reschedule_booking(
            booking_id,
            RescheduleBookingRequest { date: wednesday(), start: t("14:00") },
            base_now(),
        )
        .await;
    assert!(matches!(result, Err(BookingError::RescheduleNotAllowed(_))));
}

#[tokio::test]
async fn free_reschedule_moves_the_booking() {
    let env = setup();
    let booking_id = insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: wednesday().and_time(t("10:00")).and_utc(),
            status: "confirmed",
            total: 800.0,
            attempts: 0,
        },
    );

    let service = BookingService::new(env.state.clone());
    let response = service
        .reschedule_booking(
            booking_id,
            RescheduleBookingRequest { date: wednesday(), start: t("14:00") },
            base_now(),
        )
        .await
        .unwrap();

    assert!(!response.requires_payment);
    assert!(response.payment_order.is_none());
    assert_eq!(
        booking_column::<String>(&env.db, booking_id, "appointment_start"),
        "2026-09-02 14:00:00"
    );
    assert_eq!(booking_column::<i64>(&env.db, booking_id, "reschedule_attempts"), 1);
}

#[tokio::test]
async fn reschedule_into_an_occupied_slot_is_rejected() {
    let env = setup();
    let booking_id = insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: wednesday().and_time(t("10:00")).and_utc(),
            status: "confirmed",
            total: 800.0,
            attempts: 0,
        },
    );
    // Another customer already holds 14:00 with the only employee.
    insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: wednesday().and_time(t("14:00")).and_utc(),
            status: "confirmed",
            total: 800.0,
            attempts: 0,
        },
    );

    let service = BookingService::new(env.state.clone());
    let result = service
        .reschedule_booking(
            booking_id,
            RescheduleBookingRequest { date: wednesday(), start: t("14:00") },
            base_now(),
        )
        .await;
    assert!(matches!(result, Err(BookingError::SlotNoLongerAvailable)));
    // Original appointment untouched.
    assert_eq!(
        booking_column::<String>(&env.db, booking_id, "appointment_start"),
        "2026-09-02 10:00:00"
    );
}

#[tokio::test]
async fn fee_bearing_reschedule_applies_only_after_payment() {
    let env = setup_with_policy(SeedPolicy {
        reschedule_fee: 150.0,
        ..Default::default()
    });
    let booking_id = insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: wednesday().and_time(t("10:00")).and_utc(),
            status: "confirmed",
            total: 800.0,
            attempts: 0,
        },
    );
    let service = BookingService::new(env.state.clone());

    let response = service
        .reschedule_booking(
            booking_id,
            RescheduleBookingRequest { date: wednesday(), start: t("14:00") },
            base_now(),
        )
        .await
        .unwrap();

    assert!(response.requires_payment);
    let order = response.payment_order.expect("fee payment order");
    assert_eq!(order.amount, 150.0);
    // Original time still in force while the fee is unpaid.
    assert_eq!(
        booking_column::<String>(&env.db, booking_id, "appointment_start"),
        "2026-09-02 10:00:00"
    );
    assert_eq!(
        booking_column::<String>(&env.db, booking_id, "reschedule_payment_status"),
        "pending"
    );

    // Fee clears: the new time is applied and invoiced.
    service
        .confirm_payment(callback(&order.id, "pay_1"), base_now())
        .await
        .unwrap();
    assert_eq!(
        booking_column::<String>(&env.db, booking_id, "appointment_start"),
        "2026-09-02 14:00:00"
    );
    assert_eq!(
        booking_column::<String>(&env.db, booking_id, "reschedule_payment_status"),
        "paid"
    );
    assert_eq!(booking_column::<i64>(&env.db, booking_id, "reschedule_attempts"), 1);
    assert_eq!(count_rows(&env.db, "invoices"), 1);
}

#[tokio::test]
async fn reschedule_slot_lost_during_payment_keeps_original() {
    let env = setup_with_policy(SeedPolicy {
        reschedule_fee: 150.0,
        ..Default::default()
    });
    let booking_id = insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: wednesday().and_time(t("10:00")).and_utc(),
            status: "confirmed",
            total: 800.0,
            attempts: 0,
        },
    );
    let service = BookingService::new(env.state.clone());

    let response = service
        .reschedule_booking(
            booking_id,
            RescheduleBookingRequest { date: wednesday(), start: t("14:00") },
            base_now(),
        )
        .await
        .unwrap();
    let order = response.payment_order.unwrap();

    // Someone else books 14:00 while the fee payment is in flight.
    insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: wednesday().and_time(t("14:00")).and_utc(),
            status: "confirmed",
            total: 800.0,
            attempts: 0,
        },
    );

    let result = service
        .confirm_payment(callback(&order.id, "pay_1"), base_now())
        .await;
    assert!(matches!(result, Err(BookingError::SlotNoLongerAvailable)));
    assert_eq!(
        booking_column::<String>(&env.db, booking_id, "appointment_start"),
        "2026-09-02 10:00:00"
    );
    assert_eq!(
        booking_column::<String>(&env.db, booking_id, "reschedule_payment_status"),
        "failed"
    );
}

// ==============================================================================
// PAYMENT CALLBACKS
// ==============================================================================

#[tokio::test]
async fn initial_payment_confirms_pending_booking() {
    let env = setup();
    let service = BookingService::new(env.state.clone());

    let response = service
        .create_booking(
            Uuid::new_v4(),
            create_request(env.service_id, wednesday(), t("10:00")),
            base_now(),
        )
        .await
        .unwrap();
    let order = response.payment_order.unwrap();
    assert_eq!(response.status, BookingStatus::Pending);

    let booking = service
        .confirm_payment(callback(&order.id, "pay_1"), base_now())
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(
        booking_column::<String>(&env.db, response.booking_id, "payment_status"),
        "paid"
    );

    // Gateway retries deliver the same callback again; nothing changes.
    let replay = service
        .confirm_payment(callback(&order.id, "pay_1"), base_now())
        .await
        .unwrap();
    assert_eq!(replay.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let env = setup();
    let service = BookingService::new(env.state.clone());

    let response = service
        .create_booking(
            Uuid::new_v4(),
            create_request(env.service_id, wednesday(), t("10:00")),
            base_now(),
        )
        .await
        .unwrap();
    let order = response.payment_order.unwrap();

    let mut request = callback(&order.id, "pay_1");
    request.signature = sign(&order.id, "some_other_payment");
    let result = service.confirm_payment(request, base_now()).await;
    assert!(matches!(result, Err(BookingError::ValidationError(_))));
    // Booking untouched.
    assert_eq!(
        booking_column::<String>(&env.db, response.booking_id, "status"),
        "pending"
    );
}

#[tokio::test]
async fn failed_payment_keeps_booking_pending() {
    let env = setup();
    let service = BookingService::new(env.state.clone());

    let response = service
        .create_booking(
            Uuid::new_v4(),
            create_request(env.service_id, wednesday(), t("10:00")),
            base_now(),
        )
        .await
        .unwrap();
    let order = response.payment_order.unwrap();

    service.fail_payment(&order.id, base_now()).unwrap();
    assert_eq!(
        booking_column::<String>(&env.db, response.booking_id, "status"),
        "pending"
    );
    assert_eq!(
        booking_column::<String>(&env.db, response.booking_id, "payment_status"),
        "failed"
    );
}

// ==============================================================================
// NO-SHOW SWEEP
// ==============================================================================

#[tokio::test]
async fn sweep_marks_overdue_confirmed_bookings_once() {
    let env = setup();
    // Two hours overdue: well past the 30-minute grace.
    let overdue = insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: base_now() - Duration::hours(2),
            status: "confirmed",
            total: 800.0,
            attempts: 0,
        },
    );
    // Ten minutes in: still within grace.
    let recent = insert_booking_row(
        &env.db,
        BookingRow {
            employee_id: env.employee_id,
            service_id: env.service_id,
            policy_id: Some(env.policy_id),
            customer_id: Uuid::new_v4(),
            start: base_now() - Duration::minutes(10),
            status: "confirmed",
            total: 800.0,
            attempts: 0,
        },
    );

    let service = BookingService::new(env.state.clone());
    assert_eq!(service.run_no_show_sweep(base_now()).unwrap(), 1);
    assert_eq!(booking_column::<String>(&env.db, overdue, "status"), "no_show");
    assert_eq!(booking_column::<String>(&env.db, recent, "status"), "confirmed");

    // Idempotence: a second pass over the same data is a no-op.
    assert_eq!(service.run_no_show_sweep(base_now()).unwrap(), 0);
    assert_eq!(booking_column::<String>(&env.db, overdue, "status"), "no_show");
}

#[tokio::test]
async fn sweep_never_touches_terminal_or_pending_rows() {
    let env = setup();
    for status in ["pending", "cancelled", "completed", "no_show"] {
        insert_booking_row(
            &env.db,
            BookingRow {
                employee_id: env.employee_id,
                service_id: env.service_id,
                policy_id: Some(env.policy_id),
                customer_id: Uuid::new_v4(),
                start: base_now() - Duration::hours(5),
                status,
                total: 800.0,
                attempts: 0,
            },
        );
    }

    let service = BookingService::new(env.state.clone());
    assert_eq!(service.run_no_show_sweep(base_now()).unwrap(), 0);
}
