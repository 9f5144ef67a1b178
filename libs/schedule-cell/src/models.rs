// libs/schedule-cell/src/models.rs
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::time::hhmm;

/// One persisted availability window: a contiguous open/close range for a
/// doctor on one weekday (0 = Sunday .. 6 = Saturday).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: i32,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A derived half-hour candidate appointment time. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub available: bool,
}

/// Weekly schedule save payload: for each weekday 0-6, the half-hour start
/// times the doctor selected (as `HH:MM` strings). Weekdays with an empty
/// or missing selection are treated as closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveScheduleRequest {
    pub selections: BTreeMap<u8, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid schedule selection: {0}")]
    InvalidSelection(String),

    #[error("Schedule save failed: {0}")]
    SaveFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
