use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HolidayKind {
    /// A dated entry for the weekly rest day.
    Weekly,
    Occasional,
}

impl HolidayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HolidayKind::Weekly => "weekly",
            HolidayKind::Occasional => "occasional",
        }
    }
}

/// A recorded day off. The recurring weekly rest day itself comes from
/// settings and needs no rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub id: i64,
    pub date: NaiveDate,
    pub title: String,
    pub kind: HolidayKind,
}
