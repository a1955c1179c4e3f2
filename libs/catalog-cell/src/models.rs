// libs/catalog-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// SERVICE CATALOG MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: i64,
    pub base_price: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Alternative duration/price package replacing a service's base duration and
/// price when selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTier {
    pub id: Uuid,
    pub service_id: Uuid,
    pub name: String,
    pub duration_minutes: i64,
    pub price: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extra {
    pub id: Uuid,
    pub name: String,
    pub duration_hours: i64,
    pub duration_minutes: i64,
    pub price: f64,
    pub max_quantity: i64,
    pub is_active: bool,
}

impl Extra {
    /// Duration is stored as separate hours/minutes columns; everything
    /// downstream works in minutes.
    pub fn total_duration_minutes(&self) -> i64 {
        self.duration_hours * 60 + self.duration_minutes
    }
}

// ==============================================================================
// COUPON MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "fixed" => DiscountType::Fixed,
            _ => DiscountType::Percentage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: f64,
    pub minimum_amount: f64,
    pub maximum_discount: Option<f64>,
    pub usage_limit: Option<i64>,
    pub per_user_limit: Option<i64>,
    pub used_count: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Empty list means the coupon applies to every service.
    pub applicable_services: Vec<Uuid>,
    pub is_active: bool,
}

impl Coupon {
    pub fn applies_to(&self, service_id: Uuid) -> bool {
        self.applicable_services.is_empty() || self.applicable_services.contains(&service_id)
    }
}

// ==============================================================================
// BOOKING POLICY MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationPolicy {
    FullRefund,
    NoRefund,
    WindowedFee,
    CreditOnly,
}

impl CancellationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationPolicy::FullRefund => "full_refund",
            CancellationPolicy::NoRefund => "no_refund",
            CancellationPolicy::WindowedFee => "windowed_fee",
            CancellationPolicy::CreditOnly => "credit_only",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "full_refund" => CancellationPolicy::FullRefund,
            "no_refund" => CancellationPolicy::NoRefund,
            "credit_only" => CancellationPolicy::CreditOnly,
            _ => CancellationPolicy::WindowedFee,
        }
    }
}

impl fmt::Display for CancellationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Refund behavior when an administrator force-cancels past the policy
/// window: full refund, or the same formula regular cancellations use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminOverrideRefund {
    Full,
    Formula,
}

impl AdminOverrideRefund {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminOverrideRefund::Full => "full",
            AdminOverrideRefund::Formula => "formula",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "full" => AdminOverrideRefund::Full,
            _ => AdminOverrideRefund::Formula,
        }
    }
}

/// The cancellation/reschedule rule set in force when a booking is placed.
/// Rows are never edited in place; superseded policies are deactivated so
/// existing bookings keep their snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPolicySetting {
    pub id: Uuid,
    pub name: String,
    pub cancellation_policy: CancellationPolicy,
    pub cancellation_window_hours: i64,
    pub late_cancellation_fee: f64,
    pub reschedule_window_hours: i64,
    pub reschedule_fee: f64,
    pub max_reschedule_attempts: i64,
    pub reschedule_advance_notice_hours: i64,
    pub no_show_minutes: i64,
    pub notify_on_cancellation: bool,
    pub notify_on_reschedule: bool,
    pub admin_override_refund: AdminOverrideRefund,
    pub is_active: bool,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub duration_minutes: i64,
    pub base_price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePricingTierRequest {
    pub service_id: Uuid,
    pub name: String,
    pub duration_minutes: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExtraRequest {
    pub name: String,
    pub duration_hours: i64,
    pub duration_minutes: i64,
    pub price: f64,
    pub max_quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCouponRequest {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: f64,
    pub minimum_amount: Option<f64>,
    pub maximum_discount: Option<f64>,
    pub usage_limit: Option<i64>,
    pub per_user_limit: Option<i64>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub applicable_services: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePolicyRequest {
    pub name: String,
    pub cancellation_policy: CancellationPolicy,
    pub cancellation_window_hours: i64,
    pub late_cancellation_fee: f64,
    pub reschedule_window_hours: i64,
    pub reschedule_fee: f64,
    pub max_reschedule_attempts: i64,
    pub reschedule_advance_notice_hours: i64,
    pub no_show_minutes: i64,
    pub notify_on_cancellation: Option<bool>,
    pub notify_on_reschedule: Option<bool>,
    pub admin_override_refund: Option<AdminOverrideRefund>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound("record"),
            other => CatalogError::DatabaseError(other.to_string()),
        }
    }
}
