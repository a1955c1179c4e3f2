// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_models::state::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn booking_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_booking))
        .route("/search", get(handlers::search_bookings))
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/{booking_id}/cancel", post(handlers::cancel_booking))
        .route("/{booking_id}/reschedule", post(handlers::reschedule_booking))
        .route("/maintenance/no-show-sweep", post(handlers::run_no_show_sweep))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Gateway callbacks authenticate through the payment signature, not a
    // bearer token.
    let callback_routes = Router::new()
        .route("/payments/success", post(handlers::payment_success_callback))
        .route("/payments/failure", post(handlers::payment_failure_callback));

    Router::new()
        .merge(protected_routes)
        .merge(callback_routes)
        .with_state(state)
}
