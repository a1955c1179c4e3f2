// libs/catalog-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_models::state::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn catalog_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/services", get(handlers::list_services))
        .route("/services", post(handlers::create_service))
        .route("/services/{service_id}", get(handlers::get_service))
        .route("/pricing-tiers", post(handlers::create_pricing_tier))
        .route("/extras", get(handlers::list_extras))
        .route("/extras", post(handlers::create_extra))
        .route("/coupons", post(handlers::create_coupon))
        .route("/policies/active", get(handlers::get_active_policy))
        .route("/policies", post(handlers::create_policy))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
