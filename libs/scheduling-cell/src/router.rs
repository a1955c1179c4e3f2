// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_models::state::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        // Slot read path
        .route("/slots", get(handlers::get_available_slots))
        // Staff administration
        .route("/employees", post(handlers::create_employee))
        .route("/employees", get(handlers::list_employees))
        .route("/assignments", post(handlers::assign_service))
        .route("/assignments/remove", post(handlers::unassign_service))
        // Schedule administration
        .route("/schedules", post(handlers::create_schedule))
        .route("/schedules/default", get(handlers::get_default_schedule))
        .route("/schedules/{schedule_id}/overrides", put(handlers::set_service_override))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
