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

use crate::models::{BookingError, CheckoutRequest, CreateBookingRequest, DecisionRequest};
use crate::services::{booking::BookingService, checkout::CheckoutService};

#[derive(Debug, Deserialize)]
pub struct DoctorBookingsQuery {
    pub date: Option<NaiveDate>,
}

fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::SlotUnavailable => AppError::Conflict(
            "The selected time slot is no longer available. Please pick another slot.".to_string(),
        ),
        BookingError::InvalidDate(msg) => AppError::BadRequest(msg),
        BookingError::NotFound(msg) => AppError::NotFound(msg),
        BookingError::NotAuthorized(msg) => AppError::Auth(msg),
        BookingError::InvalidTransition(msg) => AppError::BadRequest(msg),
        BookingError::CreationFailed(msg) => AppError::ExternalService(msg),
        BookingError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))
}

#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = user_uuid(&user)?;

    let booking_service = BookingService::new(&state);

    let booking = booking_service
        .create_booking(user_id, &request, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn checkout(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let user_id = user_uuid(&user)?;

    let checkout_service = CheckoutService::new(&state);

    let outcome = checkout_service
        .book_and_pay(user_id, &request, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let booking = booking_service
        .get_booking(booking_id, token)
        .await
        .map_err(map_booking_error)?;

    // Only participants and admins may read a booking
    let is_participant =
        user.id == booking.user_id.to_string() || user.id == booking.doctor_id.to_string();
    if !user.is_admin() && !is_participant {
        return Err(AppError::Auth(
            "Not authorized to view this booking".to_string(),
        ));
    }

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn get_user_bookings(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() && user.id != user_id.to_string() {
        return Err(AppError::Auth(
            "Not authorized to view these bookings".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);

    let bookings = booking_service
        .get_user_bookings(user_id, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_bookings(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DoctorBookingsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_admin() && user.id != doctor_id.to_string() {
        return Err(AppError::Auth(
            "Not authorized to view this doctor's bookings".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);

    let bookings = booking_service
        .get_doctor_bookings(doctor_id, query.date, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "bookings": bookings,
        "total": bookings.len()
    })))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let booking = booking_service
        .cancel_booking(booking_id, &user, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn confirm_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let booking = booking_service
        .confirm_booking(booking_id, request.notes, &user, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn reject_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let booking = booking_service
        .reject_booking(booking_id, request.notes, &user, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn complete_booking(
    State(state): State<Arc<AppConfig>>,
    Path(booking_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let booking = booking_service
        .complete_booking(booking_id, &user, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(booking)))
}
