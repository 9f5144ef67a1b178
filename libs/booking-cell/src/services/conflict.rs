use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::time::format_clock_time;

use crate::models::{Booking, BookingError};

/// Keeps a slot single-occupancy: an advisory pre-check for a friendly
/// early rejection, and an insert whose 409 is the authoritative verdict.
/// The unique constraint on `(doctor_id, appointment_date,
/// appointment_time)` over non-cancelled rows decides every race.
pub struct SlotConflictGuard {
    supabase: Arc<SupabaseClient>,
}

impl SlotConflictGuard {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Advisory pre-check: any active booking on the triple means the
    /// slot is gone. A clean pass here does not reserve anything.
    pub async fn check_slot_free(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        auth_token: &str,
    ) -> Result<(), BookingError> {
        let path = format!(
            "/rest/v1/bookings?doctor_id=eq.{}&appointment_date=eq.{}&appointment_time=eq.{}&status=neq.cancelled&select=id",
            doctor_id,
            date,
            format_clock_time(&time)
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if rows.is_empty() {
            Ok(())
        } else {
            debug!(
                "Slot {} {} for doctor {} already has an active booking",
                date,
                format_clock_time(&time),
                doctor_id
            );
            Err(BookingError::SlotUnavailable)
        }
    }

    /// Insert the booking row. A 409 means another booking claimed the
    /// slot between pre-check and insert.
    pub async fn insert_booking(
        &self,
        row: Value,
        auth_token: &str,
    ) -> Result<Booking, BookingError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let inserted: Vec<Booking> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/bookings",
                Some(auth_token),
                Some(row),
                Some(headers),
            )
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    warn!("Booking insert lost the slot race: {}", e);
                    BookingError::SlotUnavailable
                } else {
                    BookingError::DatabaseError(e.to_string())
                }
            })?;

        inserted
            .into_iter()
            .next()
            .ok_or_else(|| BookingError::DatabaseError(
                "Store returned no row for booking insert".to_string(),
            ))
    }
}
