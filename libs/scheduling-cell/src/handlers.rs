// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::state::AppState;
use shared_utils::extractor::require_admin;

use crate::models::{
    AssignServiceRequest, CreateEmployeeRequest, CreateScheduleRequest, ExtraSelection,
    GenderPreference, SchedulingError, SetOverrideRequest, SlotQuery,
};
use crate::services::availability::AvailabilityService;
use crate::services::schedule::ScheduleService;
use crate::services::staff::StaffService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotQueryParams {
    pub date: NaiveDate,
    pub service_id: Uuid,
    pub pricing_tier_id: Option<Uuid>,
    /// Comma-separated `extra_id:quantity` pairs; quantity defaults to 1.
    pub extras: Option<String>,
    pub gender_preference: Option<GenderPreference>,
    pub exclude_booking_id: Option<Uuid>,
}

pub(crate) fn parse_extras_param(raw: Option<&str>) -> Result<Vec<ExtraSelection>, AppError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (id_part, qty_part) = match part.split_once(':') {
                Some((id, qty)) => (id.trim(), Some(qty.trim())),
                None => (part.trim(), None),
            };
            let extra_id = Uuid::parse_str(id_part)
                .map_err(|_| AppError::BadRequest(format!("Invalid extra id: {}", id_part)))?;
            let quantity = match qty_part {
                Some(qty) => qty
                    .parse::<i64>()
                    .map_err(|_| AppError::BadRequest(format!("Invalid extra quantity: {}", qty)))?,
                None => 1,
            };
            Ok(ExtraSelection { extra_id, quantity })
        })
        .collect()
}

pub fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::InvalidDuration(msg) => AppError::BadRequest(msg),
        SchedulingError::DateNotBookable(msg) => {
            AppError::BadRequest(format!("Date not bookable: {}", msg))
        }
        SchedulingError::NoEligibleStaff => AppError::NotFound(
            "No staff available for this service and gender preference".to_string(),
        ),
        SchedulingError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
        SchedulingError::ValidationError(msg) => AppError::BadRequest(msg),
        SchedulingError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// SLOT LISTING
// ==============================================================================

/// The single authoritative slot computation; clients may call it for
/// previews but never decide availability locally.
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SlotQueryParams>,
) -> Result<Json<Value>, AppError> {
    let extras = parse_extras_param(params.extras.as_deref())?;

    let query = SlotQuery {
        date: params.date,
        service_id: params.service_id,
        pricing_tier_id: params.pricing_tier_id,
        extras,
        gender_preference: params.gender_preference.unwrap_or_default(),
        exclude_booking_id: params.exclude_booking_id,
    };

    let availability =
        AvailabilityService::new(state.db.clone(), state.config.max_extras_per_booking);
    let listing = availability
        .get_available_slots(&query, Utc::now())
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(listing)))
}

// ==============================================================================
// STAFF ADMINISTRATION
// ==============================================================================

#[axum::debug_handler]
pub async fn create_employee(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateEmployeeRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let staff = StaffService::new(state.db.clone());

    let employee = staff.create_employee(request).map_err(map_scheduling_error)?;

    Ok(Json(json!({ "success": true, "employee": employee })))
}

#[axum::debug_handler]
pub async fn list_employees(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let staff = StaffService::new(state.db.clone());

    let employees = staff.list_employees().map_err(map_scheduling_error)?;

    Ok(Json(json!({ "employees": employees })))
}

#[axum::debug_handler]
pub async fn assign_service(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<AssignServiceRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let staff = StaffService::new(state.db.clone());

    staff.assign_service(request).map_err(map_scheduling_error)?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn unassign_service(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<AssignServiceRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let staff = StaffService::new(state.db.clone());

    staff.unassign_service(request).map_err(map_scheduling_error)?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// SCHEDULE ADMINISTRATION
// ==============================================================================

#[axum::debug_handler]
pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let schedules = ScheduleService::new(state.db.clone());

    let schedule = schedules.create_schedule(request).map_err(map_scheduling_error)?;

    Ok(Json(json!({ "success": true, "schedule": schedule })))
}

#[axum::debug_handler]
pub async fn get_default_schedule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let schedules = ScheduleService::new(state.db.clone());

    let schedule = schedules.default_schedule().map_err(map_scheduling_error)?;

    Ok(Json(json!({ "schedule": schedule })))
}

#[axum::debug_handler]
pub async fn set_service_override(
    State(state): State<Arc<AppState>>,
    Path(schedule_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<SetOverrideRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let schedules = ScheduleService::new(state.db.clone());

    schedules
        .set_service_override(schedule_id, request)
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "success": true })))
}
