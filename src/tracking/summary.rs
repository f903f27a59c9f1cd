//! Daily, range and per-task totals derived from stored sessions.
//!
//! Reads never write. Open sessions contribute their live elapsed time to the
//! date they started on, however long ago that was.

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use log::warn;

use crate::db::{
    models::{
        activity::{BREAK, IDLE, LUNCH_PRAYER},
        DailySummary, DayTimeline, MemberSummary, RangeSummary, TeamSummary, TimelineEntry,
        UserRole,
    },
    Database, SessionType, WorkSession,
};

/// Label for task sessions whose task no longer exists.
pub const DELETED_TASK_LABEL: &str = "Deleted task";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Task,
    Lunch,
    Break,
    Idle,
}

fn bucket_of(session: &WorkSession) -> Option<Bucket> {
    match session.session_type {
        SessionType::Task => Some(Bucket::Task),
        SessionType::Idle => Some(Bucket::Idle),
        SessionType::DailyActivity => match session.activity_key.as_deref() {
            Some(LUNCH_PRAYER) => Some(Bucket::Lunch),
            Some(BREAK) => Some(Bucket::Break),
            Some(IDLE) => Some(Bucket::Idle),
            _ => None,
        },
    }
}

/// Buckets `sessions` that belong to `date`. Sessions attributed to other
/// dates are skipped.
pub fn summarize_day(
    date: NaiveDate,
    sessions: &[WorkSession],
    now: &NaiveDateTime,
) -> DailySummary {
    let mut summary = DailySummary::empty(date);

    for session in sessions.iter().filter(|s| s.date == date) {
        let minutes = session.accrued_minutes(now);
        match bucket_of(session) {
            Some(Bucket::Task) => summary.task_time += minutes,
            Some(Bucket::Lunch) => summary.lunch_time += minutes,
            Some(Bucket::Break) => summary.break_time += minutes,
            Some(Bucket::Idle) => summary.idle_time += minutes,
            None => {}
        }
    }

    summary.recompute_total();
    summary
}

/// One summary per calendar day in `from..=to`, days without sessions
/// included as zeros.
pub fn summarize_range(
    from: NaiveDate,
    to: NaiveDate,
    sessions: &[WorkSession],
    now: &NaiveDateTime,
) -> RangeSummary {
    let mut by_date: BTreeMap<NaiveDate, Vec<WorkSession>> = BTreeMap::new();
    for session in sessions {
        by_date.entry(session.date).or_default().push(session.clone());
    }

    let mut days = Vec::new();
    let mut totals = DailySummary::default();
    let mut work_days = 0;

    for date in from.iter_days().take_while(|d| *d <= to) {
        let day = match by_date.get(&date) {
            Some(sessions) => summarize_day(date, sessions, now),
            None => DailySummary::empty(date),
        };

        totals.absorb(&day);
        if day.total_time > 0 {
            work_days += 1;
        }
        days.push(day);
    }

    RangeSummary {
        from,
        to,
        days,
        totals,
        work_days,
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub async fn daily_summary(
    db: &Database,
    user_id: i64,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<DailySummary> {
    let sessions = db.get_sessions_by_date(user_id, date).await?;
    Ok(summarize_day(date, &sessions, &now))
}

pub async fn range_summary(
    db: &Database,
    user_id: i64,
    from: NaiveDate,
    to: NaiveDate,
    now: NaiveDateTime,
) -> Result<RangeSummary> {
    if from > to {
        bail!("invalid range: {from} is after {to}");
    }
    let sessions = db.get_sessions_in_range(user_id, from, to).await?;
    Ok(summarize_range(from, to, &sessions, &now))
}

pub async fn weekly_summary(
    db: &Database,
    user_id: i64,
    any_day: NaiveDate,
    now: NaiveDateTime,
) -> Result<RangeSummary> {
    let from = week_start(any_day);
    let to = from + Duration::days(6);
    range_summary(db, user_id, from, to, now).await
}

/// Range totals for every employee, idle ones included as zeros.
pub async fn team_summary(
    db: &Database,
    from: NaiveDate,
    to: NaiveDate,
    now: NaiveDateTime,
) -> Result<TeamSummary> {
    let mut members = Vec::new();
    let mut totals = DailySummary::default();

    for user in db.list_users_by_role(UserRole::Employee).await? {
        let range = range_summary(db, user.id, from, to, now).await?;
        totals.absorb(&range.totals);
        members.push(MemberSummary {
            user_id: user.id,
            user_name: user.name,
            totals: range.totals,
            work_days: range.work_days,
        });
    }

    Ok(TeamSummary {
        from,
        to,
        members,
        totals,
    })
}

/// Total minutes the user has spent on one task, across all days.
pub async fn task_time_spent(
    db: &Database,
    user_id: i64,
    task_id: i64,
    now: NaiveDateTime,
) -> Result<i64> {
    let sessions = db.get_task_sessions(user_id, task_id).await?;
    Ok(sessions.iter().map(|s| s.accrued_minutes(&now)).sum())
}

pub async fn day_timeline(
    db: &Database,
    user_id: i64,
    date: NaiveDate,
    now: NaiveDateTime,
) -> Result<DayTimeline> {
    let sessions = db.get_sessions_by_date(user_id, date).await?;

    let activity_labels: HashMap<String, String> = db
        .list_activities()
        .await?
        .into_iter()
        .map(|a| (a.activity_key.clone(), a.label()))
        .collect();

    let mut task_titles: HashMap<i64, Option<String>> = HashMap::new();
    let mut entries = Vec::with_capacity(sessions.len());

    for session in &sessions {
        let label = match (session.session_type, session.reference_id) {
            (SessionType::Task, Some(task_id)) => {
                if !task_titles.contains_key(&task_id) {
                    let title = db.get_task(task_id).await?.map(|t| t.title);
                    task_titles.insert(task_id, title);
                }
                match task_titles.get(&task_id).cloned().flatten() {
                    Some(title) => title,
                    None => {
                        warn!("Session {} references missing task {}", session.id, task_id);
                        DELETED_TASK_LABEL.to_string()
                    }
                }
            }
            (SessionType::Task, None) => DELETED_TASK_LABEL.to_string(),
            _ => {
                let key = session.activity_key.as_deref().unwrap_or(IDLE);
                activity_labels
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| key.to_string())
            }
        };

        entries.push(TimelineEntry {
            session_id: session.id.clone(),
            label,
            start_time: session.start_time,
            end_time: session.end_time,
            minutes: session.accrued_minutes(&now),
            in_progress: session.is_active,
        });
    }

    let total_minutes = entries.iter().map(|e| e.minutes).sum();

    Ok(DayTimeline {
        user_id,
        date,
        entries,
        total_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewTask, SessionKind, UserRole};
    use crate::db::DailyActivity;
    use crate::utils::clock::parse_timestamp;
    use pretty_assertions::assert_eq;

    fn ts(value: &str) -> NaiveDateTime {
        parse_timestamp(value).unwrap()
    }

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    fn closed(kind: SessionType, key: Option<&str>, start: &str, minutes: i64) -> WorkSession {
        let start_time = ts(start);
        WorkSession {
            id: format!("{start}-{minutes}"),
            user_id: 1,
            session_type: kind,
            reference_id: if kind == SessionType::Task { Some(42) } else { None },
            activity_key: key.map(str::to_string),
            start_time,
            end_time: Some(start_time + Duration::minutes(minutes)),
            duration_minutes: Some(minutes),
            date: start_time.date(),
            is_active: false,
        }
    }

    #[test]
    fn buckets_add_up_to_total() {
        let sessions = vec![
            closed(SessionType::DailyActivity, Some(IDLE), "2024-03-04 08:00:00", 15),
            closed(SessionType::Task, None, "2024-03-04 08:15:00", 120),
            closed(SessionType::DailyActivity, Some(LUNCH_PRAYER), "2024-03-04 12:00:00", 60),
            closed(SessionType::DailyActivity, Some(BREAK), "2024-03-04 15:00:00", 10),
            closed(SessionType::DailyActivity, Some("meeting"), "2024-03-04 16:00:00", 30),
        ];

        let summary = summarize_day(day("2024-03-04"), &sessions, &ts("2024-03-04 18:00:00"));
        assert_eq!(
            summary,
            DailySummary {
                date: Some(day("2024-03-04")),
                task_time: 120,
                lunch_time: 60,
                break_time: 10,
                idle_time: 15,
                total_time: 205,
            }
        );
    }

    #[test]
    fn open_session_counts_live_on_its_start_date() {
        let mut open = closed(SessionType::Task, None, "2024-03-01 09:00:00", 0);
        open.end_time = None;
        open.duration_minutes = None;
        open.is_active = true;

        let now = ts("2024-03-04 09:00:00");
        let start_day = summarize_day(day("2024-03-01"), &[open.clone()], &now);
        assert_eq!(start_day.task_time, 3 * 24 * 60);

        let today = summarize_day(day("2024-03-04"), &[open], &now);
        assert_eq!(today.total_time, 0);
    }

    #[test]
    fn negative_stored_durations_count_as_zero() {
        let mut broken = closed(SessionType::Task, None, "2024-03-04 09:00:00", 0);
        broken.duration_minutes = Some(-40);
        let summary = summarize_day(day("2024-03-04"), &[broken], &ts("2024-03-04 10:00:00"));
        assert_eq!(summary.task_time, 0);
    }

    #[test]
    fn range_counts_work_days() {
        let sessions = vec![
            closed(SessionType::Task, None, "2024-03-02 09:00:00", 90),
            closed(SessionType::DailyActivity, Some(BREAK), "2024-03-02 11:00:00", 10),
            closed(SessionType::Task, None, "2024-03-04 09:00:00", 30),
        ];
        let range = summarize_range(
            day("2024-03-02"),
            day("2024-03-05"),
            &sessions,
            &ts("2024-03-06 09:00:00"),
        );

        assert_eq!(range.days.len(), 4);
        assert_eq!(range.work_days, 2);
        assert_eq!(range.totals.task_time, 120);
        assert_eq!(range.totals.break_time, 10);
        assert_eq!(range.totals.total_time, 130);
        assert_eq!(range.totals.date, None);
    }

    #[test]
    fn weeks_start_on_monday() {
        // 2024-03-04 is a Monday.
        assert_eq!(week_start(day("2024-03-06")), day("2024-03-04"));
        assert_eq!(week_start(day("2024-03-04")), day("2024-03-04"));
        assert_eq!(week_start(day("2024-03-10")), day("2024-03-04"));
        assert_eq!(week_start(day("2024-03-11")), day("2024-03-11"));
    }

    #[tokio::test]
    async fn summary_reads_have_no_side_effects() {
        let db = Database::open_in_memory().unwrap();
        let start = ts("2024-03-04 09:00:00");
        let user = db.insert_user("Reza", UserRole::Employee, start).await.unwrap();
        db.start_session(
            user.id,
            SessionKind::Activity {
                activity_key: IDLE.into(),
            },
            start,
        )
        .await
        .unwrap();

        let now = ts("2024-03-04 09:25:00");
        let first = daily_summary(&db, user.id, start.date(), now).await.unwrap();
        let second = daily_summary(&db, user.id, start.date(), now).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.idle_time, 25);
        assert_eq!(db.count_active_sessions(user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deleted_task_is_labelled_not_fatal() {
        let db = Database::open_in_memory().unwrap();
        db.seed_activities(&DailyActivity::default_catalog())
            .await
            .unwrap();
        let start = ts("2024-03-04 09:00:00");
        let user = db.insert_user("Reza", UserRole::Employee, start).await.unwrap();
        let task = db
            .insert_task(
                NewTask {
                    title: "Quarterly report".into(),
                    assigned_to: Some(user.id),
                    importance: Some(1),
                    priority: Some(1),
                    allocated_minutes: None,
                },
                start,
            )
            .await
            .unwrap();

        db.switch_session(user.id, SessionKind::Task { task_id: task.id }, start)
            .await
            .unwrap();
        db.switch_session(
            user.id,
            SessionKind::Activity {
                activity_key: BREAK.into(),
            },
            ts("2024-03-04 09:40:00"),
        )
        .await
        .unwrap();
        assert!(db.delete_task(task.id).await.unwrap());

        let now = ts("2024-03-04 09:50:00");
        let timeline = day_timeline(&db, user.id, start.date(), now).await.unwrap();
        let labels: Vec<&str> = timeline.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec![DELETED_TASK_LABEL, "☕ Break"]);
        assert_eq!(timeline.total_minutes, 50);
        assert!(timeline.entries[1].in_progress);

        let summary = daily_summary(&db, user.id, start.date(), now).await.unwrap();
        assert_eq!(summary.task_time, 40);
        assert_eq!(summary.break_time, 10);
    }

    #[tokio::test]
    async fn task_time_spans_days() {
        let db = Database::open_in_memory().unwrap();
        let start = ts("2024-03-03 09:00:00");
        let user = db.insert_user("Reza", UserRole::Employee, start).await.unwrap();
        let task = db
            .insert_task(
                NewTask {
                    title: "Inventory".into(),
                    assigned_to: Some(user.id),
                    importance: None,
                    priority: None,
                    allocated_minutes: Some(300),
                },
                start,
            )
            .await
            .unwrap();

        let kind = SessionKind::Task { task_id: task.id };
        db.switch_session(user.id, kind.clone(), start).await.unwrap();
        db.end_all_active_sessions(user.id, ts("2024-03-03 10:30:00"))
            .await
            .unwrap();
        db.switch_session(user.id, kind, ts("2024-03-04 09:00:00"))
            .await
            .unwrap();

        let spent = task_time_spent(&db, user.id, task.id, ts("2024-03-04 09:20:00"))
            .await
            .unwrap();
        assert_eq!(spent, 110);
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let now = ts("2024-03-04 09:00:00");
        assert!(range_summary(&db, 1, day("2024-03-05"), day("2024-03-01"), now)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn team_summary_covers_every_employee() {
        let db = Database::open_in_memory().unwrap();
        let start = ts("2024-03-04 09:00:00");
        let busy = db.insert_user("Babak", UserRole::Employee, start).await.unwrap();
        let quiet = db.insert_user("Dena", UserRole::Employee, start).await.unwrap();
        let admin = db.insert_user("Admin", UserRole::Admin, start).await.unwrap();

        let idle = SessionKind::Activity {
            activity_key: IDLE.into(),
        };
        for user in [busy.id, admin.id] {
            db.switch_session(user, idle.clone(), start).await.unwrap();
            db.end_all_active_sessions(user, ts("2024-03-04 09:30:00"))
                .await
                .unwrap();
        }
        db.switch_session(busy.id, idle, ts("2024-03-05 09:00:00"))
            .await
            .unwrap();

        let now = ts("2024-03-05 09:15:00");
        let team = team_summary(&db, day("2024-03-04"), day("2024-03-10"), now)
            .await
            .unwrap();

        let lines: Vec<(&str, i64, u32)> = team
            .members
            .iter()
            .map(|m| (m.user_name.as_str(), m.totals.total_time, m.work_days))
            .collect();
        assert_eq!(lines, vec![("Babak", 45, 2), ("Dena", 0, 0)]);
        assert_eq!(team.totals.idle_time, 45);
        assert_eq!(team.totals.total_time, 45);
        assert_eq!(quiet.id, team.members[1].user_id);
    }
}
