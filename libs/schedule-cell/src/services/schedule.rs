use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveTime, Timelike, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::realtime::{ChangeSubscription, TableWatcher};
use shared_database::supabase::SupabaseClient;
use shared_models::time::{format_clock_time, parse_clock_time};

use crate::models::{ScheduleError, ScheduleWindow};

/// Slot granularity. Every selected time must sit on this boundary and
/// every persisted window spans a whole number of these steps.
pub const SLOT_MINUTES: i64 = 30;

/// End-of-day clamp for windows whose last selected slot is 23:30: the
/// nominal close of 24:00 is not representable, and 23:59 still keeps the
/// final half-hour slot inside `[start, end)`.
fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).expect("23:59 is a valid time")
}

pub struct ScheduleService {
    supabase: Arc<SupabaseClient>,
    watcher: TableWatcher,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self::with_client(supabase)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        let watcher = TableWatcher::new(Arc::clone(&supabase));
        Self { supabase, watcher }
    }

    /// Replace a doctor's weekly schedule wholesale.
    ///
    /// Each weekday's sparse selection collapses into one contiguous
    /// window `[min, max + 30min)`; gaps inside the selection are not
    /// preserved. Write order is insert-new-then-delete-old-by-exclusion,
    /// so a failure mid-way never leaves the doctor without a schedule.
    pub async fn save_schedule(
        &self,
        doctor_id: Uuid,
        selections: &BTreeMap<u8, Vec<String>>,
        auth_token: &str,
    ) -> Result<Vec<ScheduleWindow>, ScheduleError> {
        debug!("Saving weekly schedule for doctor {}", doctor_id);

        let windows = compute_windows(selections)?;

        if windows.is_empty() {
            // Doctor closed every day: nothing to insert, drop all rows.
            self.delete_windows_except(doctor_id, &[], auth_token).await?;
            info!("Cleared schedule for doctor {}", doctor_id);
            return Ok(vec![]);
        }

        let now = Utc::now().to_rfc3339();
        let rows: Vec<Value> = windows
            .iter()
            .map(|(day, start, end)| {
                json!({
                    "doctor_id": doctor_id,
                    "day_of_week": day,
                    "start_time": format_clock_time(start),
                    "end_time": format_clock_time(end),
                    "is_available": true,
                    "created_at": now,
                    "updated_at": now,
                })
            })
            .collect();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let inserted: Vec<ScheduleWindow> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctor_schedules",
                Some(auth_token),
                Some(Value::Array(rows)),
                Some(headers),
            )
            .await
            .map_err(|e| ScheduleError::SaveFailed(e.to_string()))?;

        if inserted.is_empty() {
            return Err(ScheduleError::SaveFailed(
                "Store returned no rows for schedule insert".to_string(),
            ));
        }

        let kept_ids: Vec<Uuid> = inserted.iter().map(|w| w.id).collect();
        self.delete_windows_except(doctor_id, &kept_ids, auth_token)
            .await?;

        info!(
            "Saved schedule for doctor {}: {} open day(s)",
            doctor_id,
            inserted.len()
        );
        Ok(inserted)
    }

    /// Persisted windows for a doctor, ordered by weekday then start time.
    pub async fn get_schedule(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ScheduleWindow>, ScheduleError> {
        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))
    }

    /// Refresh hint for a doctor's schedule rows. Dropping the returned
    /// handle tears the subscription down.
    pub fn watch_schedule(&self, doctor_id: Uuid, auth_token: &str) -> ChangeSubscription {
        self.watcher.subscribe(
            "doctor_schedules",
            &format!("doctor_id=eq.{}", doctor_id),
            auth_token,
        )
    }

    async fn delete_windows_except(
        &self,
        doctor_id: Uuid,
        kept_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        let mut path = format!("/rest/v1/doctor_schedules?doctor_id=eq.{}", doctor_id);
        if !kept_ids.is_empty() {
            let ids = kept_ids
                .iter()
                .map(Uuid::to_string)
                .collect::<Vec<_>>()
                .join(",");
            path.push_str(&format!("&id=not.in.({})", ids));
        }

        let _: Value = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| {
                warn!(
                    "Failed to delete superseded schedule rows for doctor {}: {}",
                    doctor_id, e
                );
                ScheduleError::SaveFailed(e.to_string())
            })?;

        Ok(())
    }
}

/// Validate and collapse the per-weekday selections into windows.
fn compute_windows(
    selections: &BTreeMap<u8, Vec<String>>,
) -> Result<Vec<(u8, NaiveTime, NaiveTime)>, ScheduleError> {
    let mut windows = Vec::new();

    for (&day, raw_times) in selections {
        if day > 6 {
            return Err(ScheduleError::InvalidSelection(format!(
                "Day of week must be between 0 (Sunday) and 6 (Saturday), got {}",
                day
            )));
        }

        let mut times = Vec::with_capacity(raw_times.len());
        for raw in raw_times {
            let time = parse_clock_time(raw).map_err(|_| {
                ScheduleError::InvalidSelection(format!("Unparseable time {:?}", raw))
            })?;
            if time.second() != 0 || (time.minute() as i64) % SLOT_MINUTES != 0 {
                return Err(ScheduleError::InvalidSelection(format!(
                    "Time {:?} is not on a half-hour boundary",
                    raw
                )));
            }
            times.push(time);
        }

        if let Some((start, end)) = collapse_selection(&times) {
            windows.push((day, start, end));
        }
    }

    Ok(windows)
}

/// Collapse a sparse selection into its contiguous span: `[min, max+30)`.
/// Empty selections collapse to nothing (the day is closed). A selection
/// ending at 23:30 clamps the close to 23:59.
pub(crate) fn collapse_selection(times: &[NaiveTime]) -> Option<(NaiveTime, NaiveTime)> {
    let start = *times.iter().min()?;
    let last = *times.iter().max()?;

    let (end, wrapped) = last.overflowing_add_signed(Duration::minutes(SLOT_MINUTES));
    let end = if wrapped != 0 { end_of_day() } else { end };

    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn sparse_selection_collapses_to_outer_span() {
        // A deselected 09:00 inside the range is not preserved.
        let times = vec![t(8, 0), t(8, 30), t(9, 30)];
        let (start, end) = collapse_selection(&times).unwrap();
        assert_eq!(start, t(8, 0));
        assert_eq!(end, t(10, 0));
    }

    #[test]
    fn single_slot_selection_spans_one_step() {
        let (start, end) = collapse_selection(&[t(14, 0)]).unwrap();
        assert_eq!(start, t(14, 0));
        assert_eq!(end, t(14, 30));
    }

    #[test]
    fn empty_selection_means_closed() {
        assert!(collapse_selection(&[]).is_none());
    }

    #[test]
    fn last_slot_of_day_clamps_close() {
        let (start, end) = collapse_selection(&[t(23, 0), t(23, 30)]).unwrap();
        assert_eq!(start, t(23, 0));
        assert_eq!(end, t(23, 59));
    }

    #[test]
    fn window_is_never_zero_width() {
        for times in [vec![t(0, 0)], vec![t(23, 30)], vec![t(12, 0), t(12, 30)]] {
            let (start, end) = collapse_selection(&times).unwrap();
            assert!(end > start);
        }
    }

    #[test]
    fn compute_windows_rejects_bad_weekday() {
        let mut selections = BTreeMap::new();
        selections.insert(7u8, vec!["08:00".to_string()]);
        assert!(matches!(
            compute_windows(&selections),
            Err(ScheduleError::InvalidSelection(_))
        ));
    }

    #[test]
    fn compute_windows_rejects_off_grid_times() {
        let mut selections = BTreeMap::new();
        selections.insert(1u8, vec!["08:15".to_string()]);
        assert!(matches!(
            compute_windows(&selections),
            Err(ScheduleError::InvalidSelection(_))
        ));
    }

    #[test]
    fn compute_windows_skips_closed_days() {
        let mut selections = BTreeMap::new();
        selections.insert(1u8, vec!["08:00".to_string(), "08:30".to_string()]);
        selections.insert(2u8, vec![]);

        let windows = compute_windows(&selections).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0], (1, t(8, 0), t(9, 0)));
    }
}
