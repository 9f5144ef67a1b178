use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{SaveScheduleRequest, ScheduleError};
use crate::services::{schedule::ScheduleService, slots::SlotService};

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

fn map_schedule_error(e: ScheduleError) -> AppError {
    match e {
        ScheduleError::InvalidSelection(msg) => AppError::BadRequest(msg),
        ScheduleError::SaveFailed(msg) => AppError::Internal(msg),
        ScheduleError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn save_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SaveScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Only the doctor themselves or an admin can rewrite the schedule
    if !user.is_admin() && user.id != doctor_id.to_string() {
        return Err(AppError::Auth(
            "Not authorized to modify this doctor's schedule".to_string(),
        ));
    }

    let schedule_service = ScheduleService::new(&state);

    let windows = schedule_service
        .save_schedule(doctor_id, &request.selections, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "windows": windows,
        "open_days": windows.len()
    })))
}

#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let schedule_service = ScheduleService::new(&state);

    let windows = schedule_service
        .get_schedule(doctor_id, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "windows": windows
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let slot_service = SlotService::new(&state);

    let slots = slot_service
        .available_slots(doctor_id, query.date, token)
        .await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "slots": slots,
        "total_slots": slots.len()
    })))
}
