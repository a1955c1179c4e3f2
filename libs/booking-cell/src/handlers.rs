// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use scheduling_cell::handlers::map_scheduling_error;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::state::AppState;
use shared_utils::extractor::require_admin;

use crate::models::{
    BookingError, BookingSearchQuery, CancelBookingRequest, CreateBookingRequest,
    PaymentCallbackRequest, RescheduleBookingRequest,
};
use crate::services::booking::BookingService;

pub fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::NotFound => AppError::NotFound("Booking not found".to_string()),
        BookingError::SlotNoLongerAvailable => AppError::Conflict(
            "Slot no longer available; re-query availability and pick another time".to_string(),
        ),
        BookingError::CancellationNotAllowed(msg) => AppError::BadRequest(msg),
        BookingError::RescheduleNotAllowed(msg) => AppError::BadRequest(msg),
        BookingError::PaymentRequired(msg) => AppError::BadRequest(msg),
        BookingError::CouponInvalid(msg) => AppError::BadRequest(msg),
        BookingError::InvalidStatusTransition(status) => {
            AppError::BadRequest(format!("Booking cannot change state from {}", status))
        }
        BookingError::ValidationError(msg) => AppError::BadRequest(msg),
        BookingError::DatabaseError(msg) => AppError::Database(msg),
        BookingError::ExternalServiceError(msg) => AppError::ExternalService(msg),
        BookingError::Scheduling(e) => map_scheduling_error(e),
    }
}

fn parse_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user id".to_string()))
}

// ==============================================================================
// BOOKING LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<Value>, AppError> {
    // Identity verification is an external collaborator; we only honor its
    // verdict, carried in the token.
    if !user.phone_verified {
        return Err(AppError::Auth(
            "Phone verification required before booking".to_string(),
        ));
    }
    let customer_id = parse_user_id(&user)?;

    let service = BookingService::new(state);
    let response = service
        .create_booking(customer_id, request, Utc::now())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "booking": response,
        "message": "Booking placed; complete payment to confirm"
    })))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(state);
    let booking = service.get_booking(booking_id).map_err(map_booking_error)?;

    let is_owner = booking.customer_id.to_string() == user.id;
    if !is_owner && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to view this booking".to_string()));
    }

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn search_bookings(
    State(state): State<Arc<AppState>>,
    Query(mut query): Query<BookingSearchQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        // Non-admins only ever see their own bookings.
        query.customer_id = Some(parse_user_id(&user)?);
        query.employee_id = None;
    }

    let service = BookingService::new(state);
    let bookings = service.search_bookings(&query).map_err(map_booking_error)?;

    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len()
    })))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(state);

    let booking = service.get_booking(booking_id).map_err(map_booking_error)?;
    let is_owner = booking.customer_id.to_string() == user.id;
    if !is_owner && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to cancel this booking".to_string()));
    }
    if request.force && !user.is_admin() {
        return Err(AppError::Auth("Only administrators may force-cancel".to_string()));
    }

    let response = service
        .cancel_booking(booking_id, request, &user, Utc::now())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "refund_amount": response.refund_amount,
        "fee_charged": response.fee_charged,
        "message": "Booking cancelled"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(state);

    let booking = service.get_booking(booking_id).map_err(map_booking_error)?;
    let is_owner = booking.customer_id.to_string() == user.id;
    if !is_owner && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to reschedule this booking".to_string()));
    }

    let response = service
        .reschedule_booking(booking_id, request, Utc::now())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "reschedule": response,
        "message": if response.requires_payment {
            "Reschedule fee due; the new time applies once payment clears"
        } else {
            "Booking rescheduled"
        }
    })))
}

// ==============================================================================
// PAYMENT CALLBACK HANDLERS (gateway-facing, signature-authenticated)
// ==============================================================================

#[axum::debug_handler]
pub async fn payment_success_callback(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PaymentCallbackRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(state);
    let booking = service
        .confirm_payment(request, Utc::now())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "booking_id": booking.id,
        "status": booking.status
    })))
}

#[axum::debug_handler]
pub async fn payment_failure_callback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let order_id = payload
        .get("order_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::BadRequest("order_id is required".to_string()))?;

    let service = BookingService::new(state);
    service
        .fail_payment(order_id, Utc::now())
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// MAINTENANCE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn run_no_show_sweep(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = BookingService::new(state);
    let transitioned = service
        .run_no_show_sweep(Utc::now())
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "transitioned": transitioned
    })))
}
