use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};

use crate::db::models::{HolidayKind, SessionType, TaskStatus, UserRole};
use crate::utils::clock;

pub fn parse_datetime(value: &str, field: &str) -> Result<NaiveDateTime> {
    clock::parse_timestamp(value).with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<NaiveDateTime>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_day(value: &str, field: &str) -> Result<NaiveDate> {
    clock::parse_date(value).with_context(|| format!("failed to parse {field}"))
}

pub fn parse_session_type(value: &str) -> Result<SessionType> {
    match value {
        "task" => Ok(SessionType::Task),
        "daily_activity" => Ok(SessionType::DailyActivity),
        "idle" => Ok(SessionType::Idle),
        other => Err(anyhow!("unknown session type {other}")),
    }
}

pub fn parse_task_status(value: &str) -> Result<TaskStatus> {
    match value {
        "pending" => Ok(TaskStatus::Pending),
        "in_progress" => Ok(TaskStatus::InProgress),
        "completed" => Ok(TaskStatus::Completed),
        "on_hold" => Ok(TaskStatus::OnHold),
        "archived" => Ok(TaskStatus::Archived),
        other => Err(anyhow!("unknown task status {other}")),
    }
}

pub fn parse_role(value: &str) -> Result<UserRole> {
    match value {
        "admin" => Ok(UserRole::Admin),
        "employee" => Ok(UserRole::Employee),
        "pending" => Ok(UserRole::Pending),
        other => Err(anyhow!("unknown user role {other}")),
    }
}

pub fn parse_holiday_kind(value: &str) -> Result<HolidayKind> {
    match value {
        "weekly" => Ok(HolidayKind::Weekly),
        "occasional" => Ok(HolidayKind::Occasional),
        other => Err(anyhow!("unknown holiday kind {other}")),
    }
}
