use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::realtime::{ChangeSubscription, TableWatcher};
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::time::format_clock_time;

use crate::models::{
    Booking, BookingError, BookingStatus, CreateBookingRequest, DoctorProfile,
    MAX_BOOKING_DAYS_AHEAD,
};
use crate::services::conflict::SlotConflictGuard;
use crate::services::fees::{booking_fee_for, MembershipStore};

pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    guard: SlotConflictGuard,
    memberships: MembershipStore,
    watcher: TableWatcher,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            guard: SlotConflictGuard::with_client(Arc::clone(&supabase)),
            memberships: MembershipStore::with_client(Arc::clone(&supabase)),
            watcher: TableWatcher::new(Arc::clone(&supabase)),
            supabase,
        }
    }

    /// Claim a slot for a patient.
    ///
    /// The pre-check gives a friendly early `SlotUnavailable`; the insert
    /// is what actually decides a race, with the store's 409 mapped to the
    /// same error. A consumed-credit decrement that fails afterwards is
    /// logged and tolerated: the credit may be lost, never double-spent.
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        request: &CreateBookingRequest,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        validate_booking_date(request.appointment_date, Utc::now().date_naive())?;

        self.guard
            .check_slot_free(
                request.doctor_id,
                request.appointment_date,
                request.appointment_time,
                auth_token,
            )
            .await?;

        let doctor = self.get_doctor(request.doctor_id, auth_token).await?;
        if !doctor.is_available {
            return Err(BookingError::CreationFailed(
                "Doctor is not accepting bookings".to_string(),
            ));
        }

        let membership = self
            .memberships
            .get_active_membership(user_id, auth_token)
            .await;
        let fee = booking_fee_for(membership.as_ref());

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "user_id": user_id,
            "doctor_id": request.doctor_id,
            "appointment_date": request.appointment_date,
            "appointment_time": format_clock_time(&request.appointment_time),
            "status": BookingStatus::Pending,
            "payment_status": "pending",
            "consultation_fee": doctor.consultation_fee,
            "booking_fee": fee.booking_fee,
            "total_amount": fee.booking_fee,
            "patient_notes": request.patient_notes,
            "doctor_notes": null,
            "created_at": now,
            "updated_at": now,
        });

        let booking = self.guard.insert_booking(row, auth_token).await?;

        if fee.uses_free_credit {
            if let Some(membership) = &membership {
                match self.memberships.consume_free_credit(membership, auth_token).await {
                    Ok(true) => {}
                    Ok(false) => warn!(
                        "Free credit for user {} was spent concurrently; booking {} keeps fee 0",
                        user_id, booking.id
                    ),
                    Err(e) => warn!(
                        "Failed to decrement free credit for user {} after booking {}: {}",
                        user_id, booking.id, e
                    ),
                }
            }
        }

        info!(
            "Created booking {} for user {} with doctor {} on {} {}",
            booking.id,
            user_id,
            booking.doctor_id,
            booking.appointment_date,
            format_clock_time(&booking.appointment_time)
        );
        Ok(booking)
    }

    pub async fn get_booking(
        &self,
        booking_id: Uuid,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let path = format!("/rest/v1/bookings?id=eq.{}", booking_id);

        let bookings: Vec<Booking> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        bookings
            .into_iter()
            .next()
            .ok_or_else(|| BookingError::NotFound(booking_id.to_string()))
    }

    pub async fn get_user_bookings(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Booking>, BookingError> {
        let path = format!(
            "/rest/v1/bookings?user_id=eq.{}&order=appointment_date.desc,appointment_time.desc",
            user_id
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))
    }

    pub async fn get_doctor_bookings(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
        auth_token: &str,
    ) -> Result<Vec<Booking>, BookingError> {
        let mut path = format!(
            "/rest/v1/bookings?doctor_id=eq.{}&order=appointment_date.asc,appointment_time.asc",
            doctor_id
        );
        if let Some(date) = date {
            path.push_str(&format!("&appointment_date=eq.{}", date));
        }

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))
    }

    /// Patient cancellation: own pending booking, future date only.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self.get_booking(booking_id, auth_token).await?;

        if !user.is_admin() && user.id != booking.user_id.to_string() {
            return Err(BookingError::NotAuthorized(
                "Only the booking owner can cancel it".to_string(),
            ));
        }
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition(format!(
                "Cannot cancel a {} booking",
                booking.status
            )));
        }
        if booking.appointment_date <= Utc::now().date_naive() {
            return Err(BookingError::InvalidTransition(
                "Cannot cancel on or after the appointment date".to_string(),
            ));
        }

        self.update_booking(
            booking_id,
            json!({ "status": BookingStatus::Cancelled }),
            auth_token,
        )
        .await
    }

    /// Doctor accepts a pending booking.
    pub async fn confirm_booking(
        &self,
        booking_id: Uuid,
        notes: Option<String>,
        user: &User,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self.get_booking(booking_id, auth_token).await?;
        ensure_doctor_decision(&booking, user)?;

        self.update_booking(
            booking_id,
            json!({ "status": BookingStatus::Confirmed, "doctor_notes": notes }),
            auth_token,
        )
        .await
    }

    /// Doctor declines a pending booking; the slot frees up.
    pub async fn reject_booking(
        &self,
        booking_id: Uuid,
        notes: Option<String>,
        user: &User,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self.get_booking(booking_id, auth_token).await?;
        ensure_doctor_decision(&booking, user)?;

        self.update_booking(
            booking_id,
            json!({ "status": BookingStatus::Cancelled, "doctor_notes": notes }),
            auth_token,
        )
        .await
    }

    /// Manual completion by the doctor once the appointment date has
    /// passed. Never automated.
    pub async fn complete_booking(
        &self,
        booking_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self.get_booking(booking_id, auth_token).await?;

        if !user.is_admin() && user.id != booking.doctor_id.to_string() {
            return Err(BookingError::NotAuthorized(
                "Only the booking's doctor can complete it".to_string(),
            ));
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::InvalidTransition(format!(
                "Cannot complete a {} booking",
                booking.status
            )));
        }
        if booking.appointment_date >= Utc::now().date_naive() {
            return Err(BookingError::InvalidTransition(
                "Cannot complete before the appointment date has passed".to_string(),
            ));
        }

        self.update_booking(
            booking_id,
            json!({ "status": BookingStatus::Completed }),
            auth_token,
        )
        .await
    }

    /// Refresh hint for a doctor's bookings on one date, for slot
    /// re-derivation. Never authoritative.
    pub fn watch_bookings(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> ChangeSubscription {
        self.watcher.subscribe(
            "bookings",
            &format!("doctor_id=eq.{}&appointment_date=eq.{}", doctor_id, date),
            auth_token,
        )
    }

    pub(crate) async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorProfile, BookingError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);

        let doctors: Vec<DoctorProfile> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        doctors
            .into_iter()
            .next()
            .ok_or_else(|| BookingError::NotFound(format!("Doctor {}", doctor_id)))
    }

    async fn update_booking(
        &self,
        booking_id: Uuid,
        mut patch: Value,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        patch["updated_at"] = json!(Utc::now().to_rfc3339());

        let path = format!("/rest/v1/bookings?id=eq.{}", booking_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let updated: Vec<Booking> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(patch), Some(headers))
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        updated
            .into_iter()
            .next()
            .ok_or_else(|| BookingError::NotFound(booking_id.to_string()))
    }
}

fn ensure_doctor_decision(booking: &Booking, user: &User) -> Result<(), BookingError> {
    if !user.is_admin() && user.id != booking.doctor_id.to_string() {
        return Err(BookingError::NotAuthorized(
            "Only the booking's doctor can decide on it".to_string(),
        ));
    }
    if booking.status != BookingStatus::Pending {
        return Err(BookingError::InvalidTransition(format!(
            "Booking is already {}",
            booking.status
        )));
    }
    Ok(())
}

/// Bookings open tomorrow and close thirty days out, inclusive.
fn validate_booking_date(date: NaiveDate, today: NaiveDate) -> Result<(), BookingError> {
    if date <= today {
        return Err(BookingError::InvalidDate(
            "Appointments must be booked at least one day in advance".to_string(),
        ));
    }
    if date > today + Duration::days(MAX_BOOKING_DAYS_AHEAD) {
        return Err(BookingError::InvalidDate(format!(
            "Appointments can be booked at most {} days in advance",
            MAX_BOOKING_DAYS_AHEAD
        )));
    }
    Ok(())
}
