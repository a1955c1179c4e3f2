// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use scheduling_cell::models::{ExtraSelection, GenderPreference, SchedulingError};

// ==============================================================================
// CORE BOOKING MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => BookingStatus::Confirmed,
            "completed" => BookingStatus::Completed,
            "cancelled" => BookingStatus::Cancelled,
            "no_show" => BookingStatus::NoShow,
            _ => BookingStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    RefundPending,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::RefundPending => "refund_pending",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "paid" => PaymentStatus::Paid,
            "refund_pending" => PaymentStatus::RefundPending,
            "refunded" => PaymentStatus::Refunded,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Unpaid,
        }
    }
}

/// Sub-state for a fee-bearing reschedule. The primary status stays
/// `confirmed` while payment is outstanding so an abandoned payment leaves
/// the original appointment intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReschedulePaymentStatus {
    NotRequired,
    Pending,
    Paid,
    Failed,
}

impl ReschedulePaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReschedulePaymentStatus::NotRequired => "not_required",
            ReschedulePaymentStatus::Pending => "pending",
            ReschedulePaymentStatus::Paid => "paid",
            ReschedulePaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => ReschedulePaymentStatus::Pending,
            "paid" => ReschedulePaymentStatus::Paid,
            "failed" => ReschedulePaymentStatus::Failed,
            _ => ReschedulePaymentStatus::NotRequired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Customer,
    Admin,
    System,
}

impl CancelledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelledBy::Customer => "customer",
            CancelledBy::Admin => "admin",
            CancelledBy::System => "system",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => CancelledBy::Admin,
            "system" => CancelledBy::System,
            _ => CancelledBy::Customer,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub service_id: Uuid,
    pub pricing_tier_id: Option<Uuid>,
    pub employee_id: Uuid,
    pub appointment_start: DateTime<Utc>,
    /// Frozen at creation from the resolved duration; later catalog edits
    /// never change historical bookings.
    pub duration_minutes: i64,
    pub total_amount: f64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub gender_preference: GenderPreference,
    pub reschedule_attempts: i64,
    pub reschedule_payment_status: ReschedulePaymentStatus,
    pub proposed_reschedule_start: Option<DateTime<Utc>>,
    pub policy_id: Option<Uuid>,
    pub coupon_code: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_fee: Option<f64>,
    pub refund_amount: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.appointment_start + chrono::Duration::minutes(self.duration_minutes)
    }
}

// ==============================================================================
// PAYMENT AND INVOICE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    Initial,
    Reschedule,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::Initial => "initial",
            PaymentPurpose::Reschedule => "reschedule",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "reschedule" => PaymentPurpose::Reschedule,
            _ => PaymentPurpose::Initial,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOrder {
    pub id: String,
    pub booking_id: Uuid,
    pub purpose: PaymentPurpose,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceEvent {
    Initial,
    RescheduleFee,
    Cancellation,
}

impl InvoiceEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceEvent::Initial => "initial",
            InvoiceEvent::RescheduleFee => "reschedule_fee",
            InvoiceEvent::Cancellation => "cancellation",
        }
    }
}

/// Immutable snapshot written at every price-affecting event; never
/// recomputed from live settings.
#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub event: InvoiceEvent,
    pub base_amount: f64,
    pub extras_amount: f64,
    pub gender_preference_fee: f64,
    pub coupon_discount: f64,
    pub fee_amount: f64,
    pub total_amount: f64,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub service_id: Uuid,
    pub pricing_tier_id: Option<Uuid>,
    #[serde(default)]
    pub extras: Vec<ExtraSelection>,
    pub date: NaiveDate,
    pub start: NaiveTime,
    #[serde(default)]
    pub gender_preference: GenderPreference,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
    /// Admin-only: bypasses the cancellation window (never the overlap
    /// invariant). Always logged with the acting user id.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleBookingRequest {
    pub date: NaiveDate,
    pub start: NaiveTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallbackRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateBookingResponse {
    pub booking_id: Uuid,
    pub employee_id: Uuid,
    pub status: BookingStatus,
    pub total_amount: f64,
    pub payment_order: Option<PaymentOrder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelBookingResponse {
    pub refund_amount: f64,
    pub fee_charged: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RescheduleBookingResponse {
    pub status: BookingStatus,
    pub requires_payment: bool,
    pub payment_order: Option<PaymentOrder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingSearchQuery {
    pub customer_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking not found")]
    NotFound,

    #[error("Slot no longer available")]
    SlotNoLongerAvailable,

    #[error("Cancellation not allowed: {0}")]
    CancellationNotAllowed(String),

    #[error("Reschedule not allowed: {0}")]
    RescheduleNotAllowed(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Coupon invalid: {0}")]
    CouponInvalid(String),

    #[error("Booking cannot be modified in current status: {0}")]
    InvalidStatusTransition(BookingStatus),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

impl From<rusqlite::Error> for BookingError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => BookingError::NotFound,
            other => BookingError::DatabaseError(other.to_string()),
        }
    }
}

impl From<catalog_cell::models::CatalogError> for BookingError {
    fn from(e: catalog_cell::models::CatalogError) -> Self {
        use catalog_cell::models::CatalogError;
        match e {
            CatalogError::NotFound(what) => BookingError::ValidationError(format!("{} not found", what)),
            CatalogError::ValidationError(msg) => BookingError::ValidationError(msg),
            CatalogError::DatabaseError(msg) => BookingError::DatabaseError(msg),
        }
    }
}
