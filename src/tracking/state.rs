use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::SessionType;

/// Where a user is in their day.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DayState {
    /// Nothing recorded today and nothing running.
    #[default]
    NotStarted,
    /// Exactly one session is open.
    Active,
    /// Sessions were recorded today but none is open.
    Ended,
}

/// Live status for a work panel. `elapsed_minutes` is always recomputed from
/// the session start, never read back from storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStatus {
    pub is_working: bool,
    pub day_state: DayState,
    pub session_id: Option<String>,
    pub session_type: Option<SessionType>,
    pub started_at: Option<NaiveDateTime>,
    pub elapsed_minutes: i64,
    /// Task title or activity display name.
    pub label: Option<String>,
    pub task_id: Option<i64>,
    pub activity_key: Option<String>,
    pub message: String,
}

/// Result of asking whether an activity may start now.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LimitCheck {
    pub can_use: bool,
    pub remaining_minutes: i64,
}
