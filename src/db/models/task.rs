//! The task and user records the time engine reads.
//!
//! Full task management (reviews, attachments, scores) lives in the bot; only
//! the columns time accounting depends on are modelled here.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    OnHold,
    Archived,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::OnHold => "on_hold",
            TaskStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub assigned_to: Option<i64>,
    /// 1 is the most important.
    pub importance: Option<i64>,
    /// 1 is the most urgent.
    pub priority: Option<i64>,
    pub status: TaskStatus,
    pub allocated_minutes: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub assigned_to: Option<i64>,
    pub importance: Option<i64>,
    pub priority: Option<i64>,
    pub allocated_minutes: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Employee,
    Pending,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Employee => "employee",
            UserRole::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub role: UserRole,
}
