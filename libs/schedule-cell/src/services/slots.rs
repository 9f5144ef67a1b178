use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::time::parse_clock_time;

use crate::models::{ScheduleError, ScheduleWindow, Slot};
use crate::services::schedule::SLOT_MINUTES;

pub struct SlotService {
    supabase: Arc<SupabaseClient>,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Derive the bookable half-hour slots for a doctor on a date.
    ///
    /// Read-only and idempotent: re-reads windows and active bookings on
    /// every call, performs no writes. Empty when the doctor has no open
    /// window on that weekday.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Slot>, ScheduleError> {
        debug!("Deriving slots for doctor {} on {}", doctor_id, date);

        let day_of_week = day_of_week_index(date);

        let windows = self
            .get_windows_for_day(doctor_id, day_of_week, auth_token)
            .await?;
        if windows.is_empty() {
            debug!("Doctor {} is closed on weekday {}", doctor_id, day_of_week);
            return Ok(vec![]);
        }

        let taken = self.get_taken_times(doctor_id, date, auth_token).await?;

        let slots = derive_slots(&windows, &taken);
        debug!("Derived {} slot(s), {} taken", slots.len(), taken.len());
        Ok(slots)
    }

    async fn get_windows_for_day(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        auth_token: &str,
    ) -> Result<Vec<ScheduleWindow>, ScheduleError> {
        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&day_of_week=eq.{}&is_available=eq.true&order=start_time.asc",
            doctor_id, day_of_week
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))
    }

    /// Appointment times already claimed by an active booking that day.
    /// The bookings table is the sole arbiter of slot occupancy.
    async fn get_taken_times(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<HashSet<NaiveTime>, ScheduleError> {
        let path = format!(
            "/rest/v1/bookings?doctor_id=eq.{}&appointment_date=eq.{}&status=neq.cancelled&select=appointment_time",
            doctor_id, date
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let mut taken = HashSet::new();
        for row in rows {
            match row["appointment_time"].as_str().map(parse_clock_time) {
                Some(Ok(time)) => {
                    taken.insert(time);
                }
                // A skipped row would make a booked slot look open, so
                // corrupt store data must at least be visible.
                _ => warn!(
                    "Skipping booking row with unparseable appointment_time: {}",
                    row
                ),
            }
        }
        Ok(taken)
    }
}

/// Weekday index with Sunday = 0, matching the persisted `day_of_week`.
pub(crate) fn day_of_week_index(date: NaiveDate) -> i32 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

/// Enumerate half-hour start times over `[start, end)`, stopping at a
/// midnight wrap.
pub(crate) fn expand_window(start: NaiveTime, end: NaiveTime) -> Vec<NaiveTime> {
    let mut times = Vec::new();
    let mut current = start;

    while current < end {
        times.push(current);
        let (next, wrapped) = current.overflowing_add_signed(Duration::minutes(SLOT_MINUTES));
        if wrapped != 0 {
            break;
        }
        current = next;
    }

    times
}

/// Expand every window and mark each time against the taken-set. Times are
/// deduplicated with the last-processed window winning, then sorted
/// ascending (BTreeMap gives both).
pub(crate) fn derive_slots(windows: &[ScheduleWindow], taken: &HashSet<NaiveTime>) -> Vec<Slot> {
    let mut by_time: BTreeMap<NaiveTime, bool> = BTreeMap::new();

    for window in windows {
        if !window.is_available {
            continue;
        }
        for time in expand_window(window.start_time, window.end_time) {
            by_time.insert(time, !taken.contains(&time));
        }
    }

    by_time
        .into_iter()
        .map(|(time, available)| Slot { time, available })
        .collect()
}
