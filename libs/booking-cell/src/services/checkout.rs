use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::functions::{FunctionsClient, FunctionsError};
use shared_models::time::format_clock_time;

use crate::models::{
    Booking, BookingError, CheckoutOutcome, CheckoutRequest, CreateBookingRequest,
};
use crate::services::booking::BookingService;

#[derive(Debug, Deserialize)]
struct PaymentSession {
    payment_url: String,
}

/// Book-and-pay orchestration.
///
/// The booking leg must end with a durable row: the remote create runs
/// primary-then-fallback, and if both channels are unreachable the row is
/// inserted directly through the conflict guard. The payment leg is
/// allowed to fail entirely; the booking then stands with payment pending
/// and the patient retries payment later.
pub struct CheckoutService {
    functions: FunctionsClient,
    bookings: BookingService,
}

impl CheckoutService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            functions: FunctionsClient::new(config),
            bookings: BookingService::new(config),
        }
    }

    pub fn with_parts(functions: FunctionsClient, bookings: BookingService) -> Self {
        Self { functions, bookings }
    }

    pub async fn book_and_pay(
        &self,
        user_id: Uuid,
        request: &CheckoutRequest,
        auth_token: &str,
    ) -> Result<CheckoutOutcome, BookingError> {
        let booking = self.create_remote_booking(user_id, request, auth_token).await?;

        let payment_body = self.payment_body(&booking, auth_token).await;
        match self
            .functions
            .invoke::<PaymentSession>("create-payfast-payment", payment_body, auth_token)
            .await
        {
            Ok(session) => {
                info!(
                    "Payment session opened for booking {} ({} cents)",
                    booking.id, booking.total_amount
                );
                Ok(CheckoutOutcome::Redirect {
                    booking,
                    payment_url: session.payment_url,
                })
            }
            Err(e) => {
                warn!(
                    "Payment initiation failed for booking {}: {}; booking stands, payment can be retried",
                    booking.id, e
                );
                Ok(CheckoutOutcome::PaymentPending { booking })
            }
        }
    }

    /// Remote create with a local last resort. Business rejections are
    /// final; only an unreachable gateway falls through to the direct
    /// conflict-guarded insert.
    async fn create_remote_booking(
        &self,
        user_id: Uuid,
        request: &CheckoutRequest,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let body = json!({
            "doctor_id": request.doctor_id,
            "appointment_date": request.appointment_date,
            "appointment_time": format_clock_time(&request.appointment_time),
            "patient_notes": request.patient_notes,
        });

        match self
            .functions
            .invoke::<Booking>("create-booking", body, auth_token)
            .await
        {
            Ok(booking) => Ok(booking),
            Err(e) if e.is_conflict() => Err(BookingError::SlotUnavailable),
            Err(FunctionsError::Rejected { status, body }) => Err(BookingError::CreationFailed(
                format!("{}: {}", status, body),
            )),
            Err(FunctionsError::Unreachable(msg)) => {
                warn!(
                    "Booking functions unreachable ({}), creating booking directly",
                    msg
                );
                let create = CreateBookingRequest {
                    doctor_id: request.doctor_id,
                    appointment_date: request.appointment_date,
                    appointment_time: request.appointment_time,
                    patient_notes: request.patient_notes.clone(),
                };
                self.bookings.create_booking(user_id, &create, auth_token).await
            }
            Err(FunctionsError::Decode(msg)) => Err(BookingError::CreationFailed(msg)),
        }
    }

    async fn payment_body(&self, booking: &Booking, auth_token: &str) -> serde_json::Value {
        let doctor_name = match self.bookings.get_doctor(booking.doctor_id, auth_token).await {
            Ok(doctor) => doctor.full_name,
            Err(e) => {
                warn!("Doctor lookup for payment description failed: {}", e);
                "your doctor".to_string()
            }
        };

        json!({
            "booking_id": booking.id,
            "amount": booking.total_amount,
            "description": format!("Booking fee for consultation with {}", doctor_name),
            "doctor_name": doctor_name,
            "appointment_date": booking.appointment_date,
            "appointment_time": format_clock_time(&booking.appointment_time),
        })
    }
}
