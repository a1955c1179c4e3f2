use std::sync::Arc;

use axum::{routing::get, Router};

use booking_cell::router::booking_routes;
use catalog_cell::router::catalog_routes;
use scheduling_cell::router::scheduling_routes;
use shared_models::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Home Care booking API is running!" }))
        .nest("/catalog", catalog_routes(state.clone()))
        .nest("/scheduling", scheduling_routes(state.clone()))
        .nest("/bookings", booking_routes(state))
}
