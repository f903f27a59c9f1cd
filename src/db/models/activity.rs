//! Daily activity catalog entries (break, lunch, idle).

use serde::{Deserialize, Serialize};

pub const LUNCH_PRAYER: &str = "lunch_prayer";
pub const BREAK: &str = "break";
pub const IDLE: &str = "idle";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub activity_key: String,
    pub display_name: String,
    pub icon: Option<String>,
    /// `None` means unlimited.
    pub max_duration_minutes: Option<i64>,
    /// Usable once per day for exactly `max_duration_minutes`.
    pub is_fixed_duration: bool,
    pub affects_payroll: bool,
    pub description: Option<String>,
}

impl DailyActivity {
    /// `icon display_name`, or just the name when no icon is set.
    pub fn label(&self) -> String {
        match &self.icon {
            Some(icon) if !self.display_name.starts_with(icon.as_str()) => {
                format!("{} {}", icon, self.display_name)
            }
            _ => self.display_name.clone(),
        }
    }

    pub fn default_catalog() -> Vec<DailyActivity> {
        vec![
            DailyActivity {
                activity_key: LUNCH_PRAYER.into(),
                display_name: "Lunch & prayer".into(),
                icon: Some("🍽".into()),
                max_duration_minutes: Some(60),
                is_fixed_duration: true,
                affects_payroll: false,
                description: Some("Daily lunch and prayer time (fixed 60 minutes)".into()),
            },
            DailyActivity {
                activity_key: BREAK.into(),
                display_name: "Break".into(),
                icon: Some("☕".into()),
                max_duration_minutes: None,
                is_fixed_duration: false,
                affects_payroll: true,
                description: Some("Rest time; counts against payroll and score".into()),
            },
            DailyActivity {
                activity_key: IDLE.into(),
                display_name: "Idle".into(),
                icon: Some("⏸".into()),
                max_duration_minutes: None,
                is_fixed_duration: false,
                affects_payroll: false,
                description: Some("No task to work on".into()),
            },
        ]
    }
}
