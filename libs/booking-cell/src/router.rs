use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn booking_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_booking))
        .route("/checkout", post(handlers::checkout))
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/users/{user_id}", get(handlers::get_user_bookings))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_bookings))
        .route("/{booking_id}/cancel", post(handlers::cancel_booking))
        .route("/{booking_id}/confirm", post(handlers::confirm_booking))
        .route("/{booking_id}/reject", post(handlers::reject_booking))
        .route("/{booking_id}/complete", post(handlers::complete_booking))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}
