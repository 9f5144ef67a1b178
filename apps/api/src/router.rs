use std::sync::Arc;

use axum::{routing::get, Router};

use booking_cell::router::booking_routes;
use schedule_cell::router::schedule_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "CareLink booking API is running!" }))
        .nest("/schedules", schedule_routes(state.clone()))
        .nest("/bookings", booking_routes(state.clone()))
}
