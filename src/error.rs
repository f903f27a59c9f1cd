//! Refusals and the success/failure result handed back to the bot.
//!
//! Storage problems travel as `anyhow::Error` inside the crate. Expected,
//! user-caused refusals are [`Refusal`]s, whose `Display` text is shown to
//! the user as-is.

use chrono::NaiveDate;
use serde::Serialize;

/// Why a lifecycle operation was declined. None of these are faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Refusal {
    // Not found
    #[error("User not found!")]
    UnknownUser(i64),

    #[error("Task not found!")]
    UnknownTask(i64),

    #[error("Activity not found!")]
    UnknownActivity(String),

    // Policy
    #[error("{0} is a holiday!")]
    Holiday(NaiveDate),

    #[error("You have already started your work day!")]
    DayAlreadyStarted,

    #[error("This task is not assigned to you!")]
    TaskNotAssigned { task_id: i64 },

    #[error("The daily limit for {activity} has been reached!")]
    DailyLimitReached { activity: String },

    #[error("No task timer is running.")]
    NoActiveTask,
}

pub const STORAGE_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// The `(success, message)` pair every lifecycle entry point returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip)]
    pub refusal: Option<Refusal>,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            refusal: None,
        }
    }

    pub fn refused(refusal: Refusal) -> Self {
        Self {
            success: false,
            message: refusal.to_string(),
            refusal: Some(refusal),
        }
    }

    /// A storage-layer failure. The detail is logged, not shown.
    pub fn failed() -> Self {
        Self {
            success: false,
            message: STORAGE_FAILURE_MESSAGE.to_string(),
            refusal: None,
        }
    }
}

impl From<Refusal> for ActionOutcome {
    fn from(refusal: Refusal) -> Self {
        Self::refused(refusal)
    }
}
