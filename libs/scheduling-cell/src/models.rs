// libs/scheduling-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// STAFF MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "male" => Gender::Male,
            _ => Gender::Female,
        }
    }
}

/// Customer-selected constraint narrowing eligible staff; carries an optional
/// surcharge applied by the pricing calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenderPreference {
    Male,
    Female,
    #[default]
    NoPreference,
}

impl GenderPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderPreference::Male => "male",
            GenderPreference::Female => "female",
            GenderPreference::NoPreference => "no_preference",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "male" => GenderPreference::Male,
            "female" => GenderPreference::Female,
            _ => GenderPreference::NoPreference,
        }
    }

    pub fn matches(&self, gender: Gender) -> bool {
        match self {
            GenderPreference::Male => gender == Gender::Male,
            GenderPreference::Female => gender == Gender::Female,
            GenderPreference::NoPreference => true,
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, GenderPreference::NoPreference)
    }
}

impl fmt::Display for GenderPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
    pub gender: Gender,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEmployeeRequest {
    pub full_name: String,
    pub gender: Gender,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignServiceRequest {
    pub employee_id: Uuid,
    pub service_id: Uuid,
}

// ==============================================================================
// SCHEDULE CONFIGURATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakWindow {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub id: Uuid,
    pub name: String,
    pub min_advance_hours: i64,
    pub max_advance_days: i64,
    pub buffer_time_minutes: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Weekday numbers, 1 = Monday through 7 = Sunday.
    pub working_days: Vec<u8>,
    pub breaks: Vec<BreakWindow>,
    pub is_default: bool,
}

/// Partial per-service override, merged field by field over the base config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleOverride {
    pub min_advance_hours: Option<i64>,
    pub max_advance_days: Option<i64>,
    pub buffer_time_minutes: Option<i64>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub working_days: Option<Vec<u8>>,
}

/// The schedule actually used for slot generation, after any per-service
/// override has been resolved.
#[derive(Debug, Clone)]
pub struct EffectiveSchedule {
    pub min_advance_hours: i64,
    pub max_advance_days: i64,
    pub buffer_time_minutes: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub working_days: Vec<u8>,
    pub breaks: Vec<BreakWindow>,
}

impl ScheduleConfig {
    pub fn resolve(&self, service_override: Option<&ScheduleOverride>) -> EffectiveSchedule {
        let o = service_override.cloned().unwrap_or_default();
        EffectiveSchedule {
            min_advance_hours: o.min_advance_hours.unwrap_or(self.min_advance_hours),
            max_advance_days: o.max_advance_days.unwrap_or(self.max_advance_days),
            buffer_time_minutes: o.buffer_time_minutes.unwrap_or(self.buffer_time_minutes),
            start_time: o.start_time.unwrap_or(self.start_time),
            end_time: o.end_time.unwrap_or(self.end_time),
            working_days: o.working_days.unwrap_or_else(|| self.working_days.clone()),
            breaks: self.breaks.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    pub min_advance_hours: i64,
    pub max_advance_days: i64,
    pub buffer_time_minutes: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub working_days: Vec<u8>,
    #[serde(default)]
    pub breaks: Vec<BreakWindow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetOverrideRequest {
    pub service_id: Uuid,
    #[serde(flatten)]
    pub fields: ScheduleOverride,
}

// ==============================================================================
// SLOT MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExtraSelection {
    pub extra_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub service_id: Uuid,
    pub pricing_tier_id: Option<Uuid>,
    pub extras: Vec<ExtraSelection>,
    pub gender_preference: GenderPreference,
    pub exclude_booking_id: Option<Uuid>,
}

/// One candidate start time with its availability flag. Unavailable slots are
/// kept so callers can render them disabled.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlotAvailability {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotListing {
    pub date: NaiveDate,
    pub duration_minutes: i64,
    pub slots: Vec<SlotAvailability>,
}

pub mod hhmm {
    use chrono::NaiveTime;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Date not bookable: {0}")]
    DateNotBookable(String),

    #[error("No eligible staff for this service and preference")]
    NoEligibleStaff,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<rusqlite::Error> for SchedulingError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => SchedulingError::NotFound("record"),
            other => SchedulingError::DatabaseError(other.to_string()),
        }
    }
}

impl From<catalog_cell::models::CatalogError> for SchedulingError {
    fn from(e: catalog_cell::models::CatalogError) -> Self {
        use catalog_cell::models::CatalogError;
        match e {
            CatalogError::NotFound(what) => SchedulingError::NotFound(what),
            CatalogError::ValidationError(msg) => SchedulingError::ValidationError(msg),
            CatalogError::DatabaseError(msg) => SchedulingError::DatabaseError(msg),
        }
    }
}
