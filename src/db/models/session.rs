//! Work-session data models.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::utils::clock::elapsed_minutes;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SessionType {
    Task,
    DailyActivity,
    Idle,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Task => "task",
            SessionType::DailyActivity => "daily_activity",
            SessionType::Idle => "idle",
        }
    }
}

/// One contiguous timed interval of a user's day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkSession {
    pub id: String,
    pub user_id: i64,
    pub session_type: SessionType,
    /// Task id for task sessions. `None` for activities, and for task sessions
    /// whose task has since been deleted.
    pub reference_id: Option<i64>,
    pub activity_key: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub duration_minutes: Option<i64>,
    /// Logical day, frozen to the start date.
    pub date: NaiveDate,
    pub is_active: bool,
}

impl WorkSession {
    /// Minutes this session contributes as of `now`: the stored duration once
    /// closed, live elapsed time while open. Never negative.
    pub fn accrued_minutes(&self, now: &NaiveDateTime) -> i64 {
        if self.is_active {
            elapsed_minutes(&self.start_time, now)
        } else {
            self.duration_minutes.unwrap_or(0).max(0)
        }
    }
}

/// What a new session will be about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKind {
    Task { task_id: i64 },
    Activity { activity_key: String },
}

impl SessionKind {
    pub fn session_type(&self) -> SessionType {
        match self {
            SessionKind::Task { .. } => SessionType::Task,
            SessionKind::Activity { .. } => SessionType::DailyActivity,
        }
    }

    pub fn reference_id(&self) -> Option<i64> {
        match self {
            SessionKind::Task { task_id } => Some(*task_id),
            SessionKind::Activity { .. } => None,
        }
    }

    pub fn activity_key(&self) -> Option<&str> {
        match self {
            SessionKind::Task { .. } => None,
            SessionKind::Activity { activity_key } => Some(activity_key.as_str()),
        }
    }
}
