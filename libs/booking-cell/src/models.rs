// libs/booking-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::time::hhmm;

/// Flat booking fee in minor currency units (cents).
pub const BASE_BOOKING_FEE: i64 = 1000;

/// How far out a booking may be placed, in days.
pub const MAX_BOOKING_DAYS_AHEAD: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

/// One appointment claim. The `(doctor_id, appointment_date,
/// appointment_time)` triple is unique among rows with
/// `status != cancelled`; the store enforces this, the service only
/// pre-checks it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// Doctor's consultation fee at booking time, minor units. Recorded
    /// for display; settled out-of-band.
    pub consultation_fee: i64,
    pub booking_fee: i64,
    pub total_amount: i64,
    pub patient_notes: Option<String>,
    pub doctor_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipType {
    Basic,
    Premium,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: Uuid,
    pub membership_type: MembershipType,
    pub is_active: bool,
    pub free_bookings_remaining: i32,
}

/// Minimal doctor profile as the booking flow needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub full_name: String,
    pub consultation_fee: i64,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
    pub patient_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub appointment_time: NaiveTime,
    pub patient_notes: Option<String>,
}

/// Optional note attached to a doctor's confirm/reject decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub notes: Option<String>,
}

/// Result of the book-and-pay flow. The booking exists in every variant;
/// only the payment leg degrades.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Payment session opened; send the patient to the gateway.
    Redirect {
        booking: Booking,
        payment_url: String,
    },
    /// Payment initiation failed on every channel. The booking stands
    /// with `payment_status = pending`; payment can be retried later.
    PaymentPending { booking: Booking },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("The selected time slot is no longer available")]
    SlotUnavailable,

    #[error("Invalid booking date: {0}")]
    InvalidDate(String),

    #[error("Booking not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Booking creation failed: {0}")]
    CreationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
