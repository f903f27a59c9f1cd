//! Derived report shapes. Nothing here is persisted.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Minutes per bucket for one user on one day.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: Option<NaiveDate>,
    pub task_time: i64,
    pub lunch_time: i64,
    pub break_time: i64,
    pub idle_time: i64,
    pub total_time: i64,
}

impl DailySummary {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    /// Adds `other`'s buckets into this one, keeping this date.
    pub(crate) fn absorb(&mut self, other: &DailySummary) {
        self.task_time += other.task_time;
        self.lunch_time += other.lunch_time;
        self.break_time += other.break_time;
        self.idle_time += other.idle_time;
        self.recompute_total();
    }

    pub(crate) fn recompute_total(&mut self) {
        self.total_time = self.task_time + self.lunch_time + self.break_time + self.idle_time;
    }
}

/// Sum of daily summaries across an inclusive date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RangeSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<DailySummary>,
    pub totals: DailySummary,
    /// Days with any recorded time.
    pub work_days: u32,
}

/// One employee's line in a team report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub user_id: i64,
    pub user_name: String,
    pub totals: DailySummary,
    pub work_days: u32,
}

/// Every employee's totals over `from..=to`, plus the team sum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub members: Vec<MemberSummary>,
    pub totals: DailySummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub session_id: String,
    pub label: String,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub minutes: i64,
    pub in_progress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayTimeline {
    pub user_id: i64,
    pub date: NaiveDate,
    pub entries: Vec<TimelineEntry>,
    pub total_minutes: i64,
}

/// A user currently timing a task, for the admin "current work" view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWork {
    pub user_id: i64,
    pub user_name: String,
    pub task_id: i64,
    pub task_title: String,
    pub started_at: NaiveDateTime,
    pub elapsed_minutes: i64,
}
