//! Per-activity daily caps.
//!
//! Usage counts closed sessions by their stored duration plus the live
//! elapsed time of an open session of the same activity, so a user cannot
//! restart lunch halfway through it.

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};

use crate::db::{DailyActivity, Database};

use super::state::LimitCheck;

/// Reported as the remaining time of uncapped activities.
pub const UNLIMITED_MINUTES: i64 = 999_999;

/// Applies an activity's cap to minutes already used today.
pub fn evaluate_limit(activity: &DailyActivity, used_minutes: i64) -> LimitCheck {
    let Some(max) = activity.max_duration_minutes else {
        return LimitCheck {
            can_use: true,
            remaining_minutes: UNLIMITED_MINUTES,
        };
    };

    let used = used_minutes.max(0);

    if activity.is_fixed_duration {
        let unused = used == 0;
        LimitCheck {
            can_use: unused,
            remaining_minutes: if unused { max } else { 0 },
        }
    } else {
        let remaining = max - used;
        LimitCheck {
            can_use: remaining > 0,
            remaining_minutes: remaining.max(0),
        }
    }
}

/// Unknown activities are never usable.
pub async fn check_daily_limit(
    db: &Database,
    user_id: i64,
    activity_key: &str,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<LimitCheck> {
    let Some(activity) = db.get_activity(activity_key).await? else {
        return Ok(LimitCheck {
            can_use: false,
            remaining_minutes: 0,
        });
    };

    check_activity_limit(db, user_id, &activity, date, now).await
}

pub(crate) async fn check_activity_limit(
    db: &Database,
    user_id: i64,
    activity: &DailyActivity,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<LimitCheck> {
    if activity.max_duration_minutes.is_none() {
        return Ok(evaluate_limit(activity, 0));
    }

    let used = db
        .activity_minutes_used(user_id, &activity.activity_key, date, now)
        .await?;
    Ok(evaluate_limit(activity, used))
}
