// libs/catalog-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::state::AppState;
use shared_utils::extractor::require_admin;

use crate::models::{
    CatalogError, CreateCouponRequest, CreateExtraRequest, CreatePolicyRequest,
    CreatePricingTierRequest, CreateServiceRequest,
};
use crate::services::catalog::CatalogService;

#[derive(Debug, Deserialize)]
pub struct ListServicesQuery {
    pub include_inactive: Option<bool>,
}

fn map_catalog_error(e: CatalogError) -> AppError {
    match e {
        CatalogError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
        CatalogError::ValidationError(msg) => AppError::BadRequest(msg),
        CatalogError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListServicesQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let include_inactive = params.include_inactive.unwrap_or(false) && user.is_admin();
    let catalog = CatalogService::new(state.db.clone());

    let services = catalog
        .list_services(include_inactive)
        .map_err(map_catalog_error)?;

    Ok(Json(json!({ "services": services })))
}

#[axum::debug_handler]
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let catalog = CatalogService::new(state.db.clone());

    let service = catalog.get_service(service_id).map_err(map_catalog_error)?;
    let tiers = catalog
        .list_pricing_tiers(service_id)
        .map_err(map_catalog_error)?;

    Ok(Json(json!({ "service": service, "pricing_tiers": tiers })))
}

#[axum::debug_handler]
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let catalog = CatalogService::new(state.db.clone());

    let service = catalog.create_service(request).map_err(map_catalog_error)?;

    Ok(Json(json!({ "success": true, "service": service })))
}

#[axum::debug_handler]
pub async fn create_pricing_tier(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePricingTierRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let catalog = CatalogService::new(state.db.clone());

    let tier = catalog
        .create_pricing_tier(request)
        .map_err(map_catalog_error)?;

    Ok(Json(json!({ "success": true, "pricing_tier": tier })))
}

#[axum::debug_handler]
pub async fn list_extras(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let catalog = CatalogService::new(state.db.clone());

    let extras = catalog.list_extras().map_err(map_catalog_error)?;

    Ok(Json(json!({ "extras": extras })))
}

#[axum::debug_handler]
pub async fn create_extra(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateExtraRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let catalog = CatalogService::new(state.db.clone());

    let extra = catalog.create_extra(request).map_err(map_catalog_error)?;

    Ok(Json(json!({ "success": true, "extra": extra })))
}

#[axum::debug_handler]
pub async fn create_coupon(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateCouponRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let catalog = CatalogService::new(state.db.clone());

    let coupon = catalog.create_coupon(request).map_err(map_catalog_error)?;

    Ok(Json(json!({ "success": true, "coupon": coupon })))
}

#[axum::debug_handler]
pub async fn get_active_policy(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let catalog = CatalogService::new(state.db.clone());

    let policy = catalog.active_policy().map_err(map_catalog_error)?;

    Ok(Json(json!({ "policy": policy })))
}

#[axum::debug_handler]
pub async fn create_policy(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePolicyRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;
    let catalog = CatalogService::new(state.db.clone());

    let policy = catalog.create_policy(request).map_err(map_catalog_error)?;

    Ok(Json(json!({ "success": true, "policy": policy })))
}
