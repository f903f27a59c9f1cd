//! The daily activity catalog. Seeded from settings on startup, read-only
//! afterwards.

use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{models::DailyActivity, Database};

const ACTIVITY_COLUMNS: &str = "activity_key, display_name, icon, max_duration_minutes, is_fixed_duration, affects_payroll, description";

fn row_to_activity(row: &Row) -> Result<DailyActivity> {
    let is_fixed: i64 = row.get("is_fixed_duration")?;
    let affects_payroll: i64 = row.get("affects_payroll")?;

    Ok(DailyActivity {
        activity_key: row.get("activity_key")?,
        display_name: row.get("display_name")?,
        icon: row.get("icon")?,
        max_duration_minutes: row.get("max_duration_minutes")?,
        is_fixed_duration: is_fixed != 0,
        affects_payroll: affects_payroll != 0,
        description: row.get("description")?,
    })
}

impl Database {
    /// Inserts or refreshes each entry by key. Keys absent from `activities`
    /// are left alone so historic sessions keep resolving.
    pub async fn seed_activities(&self, activities: &[DailyActivity]) -> Result<()> {
        let activities = activities.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            for activity in &activities {
                tx.execute(
                    "INSERT INTO daily_activities (activity_key, display_name, icon, max_duration_minutes, is_fixed_duration, affects_payroll, description)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(activity_key) DO UPDATE SET
                        display_name = excluded.display_name,
                        icon = excluded.icon,
                        max_duration_minutes = excluded.max_duration_minutes,
                        is_fixed_duration = excluded.is_fixed_duration,
                        affects_payroll = excluded.affects_payroll,
                        description = excluded.description",
                    params![
                        activity.activity_key,
                        activity.display_name,
                        activity.icon,
                        activity.max_duration_minutes,
                        activity.is_fixed_duration,
                        activity.affects_payroll,
                        activity.description,
                    ],
                )
                .with_context(|| format!("failed to seed activity {}", activity.activity_key))?;
            }

            tx.commit().context("failed to commit activity catalog")?;
            Ok(())
        })
        .await
    }

    pub async fn get_activity(&self, activity_key: &str) -> Result<Option<DailyActivity>> {
        let activity_key = activity_key.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM daily_activities WHERE activity_key = ?1"
            ))?;
            let mut rows = stmt.query(params![activity_key])?;
            let activity = match rows.next()? {
                Some(row) => Some(row_to_activity(row)?),
                None => None,
            };
            Ok(activity)
        })
        .await
    }

    pub async fn list_activities(&self) -> Result<Vec<DailyActivity>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACTIVITY_COLUMNS} FROM daily_activities ORDER BY rowid ASC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut activities = Vec::new();
            while let Some(row) = rows.next()? {
                activities.push(row_to_activity(row)?);
            }
            Ok(activities)
        })
        .await
    }
}
