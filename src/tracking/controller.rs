use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex as StdMutex},
};

use anyhow::Result;
use chrono::{NaiveDate, Weekday};
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    db::{
        models::{
            activity::IDLE, ActiveWork, DailySummary, DayTimeline, RangeSummary, Task,
            TeamSummary,
        },
        Database, SessionKind, SessionType, WorkSession,
    },
    error::{ActionOutcome, Refusal},
    utils::{
        clock::{elapsed_minutes, format_minutes},
        Clock,
    },
};

use super::{
    limits,
    state::{CurrentStatus, DayState, LimitCheck},
    summary,
};

/// Inner result of a lifecycle step: a storage error, a refusal, or the
/// success message.
type Attempt = Result<Result<String, Refusal>>;

/// Every session transition for every user goes through here.
#[derive(Clone)]
pub struct WorkTracker {
    db: Database,
    clock: Arc<dyn Clock>,
    weekly_holiday: Weekday,
    user_locks: Arc<StdMutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl WorkTracker {
    pub fn new(db: Database, clock: Arc<dyn Clock>, weekly_holiday: Weekday) -> Self {
        Self {
            db,
            clock,
            weekly_holiday,
            user_locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Serializes transitions per user. Unknown users get `None` and never
    /// enter the lock map.
    async fn lock_user(&self, user_id: i64) -> Result<Option<OwnedMutexGuard<()>>> {
        if self.db.get_user(user_id).await?.is_none() {
            return Ok(None);
        }

        let lock = {
            let mut locks = match self.user_locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks.entry(user_id).or_default().clone()
        };
        Ok(Some(lock.lock_owned().await))
    }

    async fn guarded<F, Fut>(&self, operation: &str, user_id: i64, step: F) -> ActionOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Attempt>,
    {
        let attempt = match self.lock_user(user_id).await {
            Ok(Some(_guard)) => step().await,
            Ok(None) => Ok(Err(Refusal::UnknownUser(user_id))),
            Err(err) => Err(err),
        };
        settle(operation, user_id, attempt)
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        match self.user_locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub async fn start_work_day(&self, user_id: i64) -> ActionOutcome {
        self.guarded("start_work_day", user_id, || self.try_start_work_day(user_id))
            .await
    }

    async fn try_start_work_day(&self, user_id: i64) -> Attempt {
        let now = self.clock.now();
        let today = now.date();
        if self.db.is_holiday(today, self.weekly_holiday).await? {
            return Ok(Err(Refusal::Holiday(today)));
        }

        if self.db.get_active_session(user_id).await?.is_some() {
            return Ok(Err(Refusal::DayAlreadyStarted));
        }

        let switch = self
            .db
            .switch_session(user_id, idle_kind(), now)
            .await?;
        info!("User {} started the work day (session {})", user_id, switch.opened.id);

        Ok(Ok(
            "Your work day has started. Pick a task or an activity to continue.".to_string(),
        ))
    }

    pub async fn end_work_day(&self, user_id: i64) -> ActionOutcome {
        self.guarded("end_work_day", user_id, || self.try_end_work_day(user_id))
            .await
    }

    async fn try_end_work_day(&self, user_id: i64) -> Attempt {
        let now = self.clock.now();
        let closed = self.db.end_all_active_sessions(user_id, now).await?;
        info!("User {} ended the work day ({} session(s) closed)", user_id, closed.len());

        let today = summary::daily_summary(&self.db, user_id, now.date(), now).await?;
        Ok(Ok(format!(
            "Your work day has ended.\n{}",
            describe_summary(&today)
        )))
    }

    pub async fn start_task(&self, user_id: i64, task_id: i64) -> ActionOutcome {
        self.guarded("start_task", user_id, || self.try_start_task(user_id, task_id))
            .await
    }

    async fn try_start_task(&self, user_id: i64, task_id: i64) -> Attempt {
        let Some(task) = self.db.get_task(task_id).await? else {
            return Ok(Err(Refusal::UnknownTask(task_id)));
        };
        if task.assigned_to != Some(user_id) {
            return Ok(Err(Refusal::TaskNotAssigned { task_id }));
        }

        let now = self.clock.now();
        let switch = self
            .db
            .switch_session(user_id, SessionKind::Task { task_id }, now)
            .await?;
        info!(
            "User {} started task {} (session {}, {} closed)",
            user_id,
            task_id,
            switch.opened.id,
            switch.closed.len()
        );

        let spent = summary::task_time_spent(&self.db, user_id, task_id, now).await?;
        let mut message = format!("Timer for \"{}\" started.", task.title);
        if spent > 0 {
            message.push_str(&format!("\nTime spent so far: {}", format_minutes(spent)));
        }
        Ok(Ok(message))
    }

    pub async fn start_daily_activity(&self, user_id: i64, activity_key: &str) -> ActionOutcome {
        self.guarded("start_daily_activity", user_id, || {
            self.try_start_daily_activity(user_id, activity_key)
        })
        .await
    }

    async fn try_start_daily_activity(&self, user_id: i64, activity_key: &str) -> Attempt {
        let Some(activity) = self.db.get_activity(activity_key).await? else {
            return Ok(Err(Refusal::UnknownActivity(activity_key.to_string())));
        };

        let now = self.clock.now();
        let check =
            limits::check_activity_limit(&self.db, user_id, &activity, now.date(), now).await?;
        if !check.can_use {
            return Ok(Err(Refusal::DailyLimitReached {
                activity: activity.display_name.clone(),
            }));
        }

        let switch = self
            .db
            .switch_session(
                user_id,
                SessionKind::Activity {
                    activity_key: activity.activity_key.clone(),
                },
                now,
            )
            .await?;
        info!(
            "User {} started {} (session {}, {} closed)",
            user_id,
            activity.activity_key,
            switch.opened.id,
            switch.closed.len()
        );

        let mut message = format!("{} started.", activity.label());
        if activity.max_duration_minutes.is_some() {
            message.push_str(&format!(
                "\nRemaining today: {} min",
                check.remaining_minutes
            ));
        }
        Ok(Ok(message))
    }

    /// Closes a running task session and drops the user back to idle.
    pub async fn stop_current_task(&self, user_id: i64) -> ActionOutcome {
        self.guarded("stop_current_task", user_id, || self.try_stop_current_task(user_id))
            .await
    }

    async fn try_stop_current_task(&self, user_id: i64) -> Attempt {
        let active = self.db.get_active_session(user_id).await?;
        let Some(active) = active.filter(|s| s.session_type == SessionType::Task) else {
            return Ok(Err(Refusal::NoActiveTask));
        };

        let now = self.clock.now();
        let title = self.task_title(&active).await?;
        self.db.switch_session(user_id, idle_kind(), now).await?;
        info!("User {} stopped task session {}", user_id, active.id);

        Ok(Ok(format!(
            "Stopped \"{}\" after {}.",
            title.unwrap_or_else(|| summary::DELETED_TASK_LABEL.to_string()),
            format_minutes(elapsed_minutes(&active.start_time, &now))
        )))
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub async fn get_current_status(&self, user_id: i64) -> Result<CurrentStatus> {
        let now = self.clock.now();

        let Some(active) = self.db.get_active_session(user_id).await? else {
            let recorded = !self
                .db
                .get_sessions_by_date(user_id, now.date())
                .await?
                .is_empty();
            let (day_state, message) = if recorded {
                (DayState::Ended, "Your work day has ended.")
            } else {
                (DayState::NotStarted, "Your work day has not started yet.")
            };
            return Ok(CurrentStatus {
                day_state,
                message: message.to_string(),
                ..CurrentStatus::default()
            });
        };

        let elapsed = elapsed_minutes(&active.start_time, &now);
        let label = match active.session_type {
            SessionType::Task => self.task_title(&active).await?,
            SessionType::DailyActivity | SessionType::Idle => {
                let key = active.activity_key.as_deref().unwrap_or(IDLE);
                match self.db.get_activity(key).await? {
                    Some(activity) => Some(activity.label()),
                    None => Some(key.to_string()),
                }
            }
        };

        let message = format!(
            "{}: {}",
            label.as_deref().unwrap_or(summary::DELETED_TASK_LABEL),
            format_minutes(elapsed)
        );

        Ok(CurrentStatus {
            is_working: true,
            day_state: DayState::Active,
            session_id: Some(active.id.clone()),
            session_type: Some(active.session_type),
            started_at: Some(active.start_time),
            elapsed_minutes: elapsed,
            label,
            task_id: match active.session_type {
                SessionType::Task => active.reference_id,
                _ => None,
            },
            activity_key: active.activity_key.clone(),
            message,
        })
    }

    /// `None` when the session's task was deleted.
    async fn task_title(&self, session: &WorkSession) -> Result<Option<String>> {
        let Some(task_id) = session.reference_id else {
            return Ok(None);
        };
        let task = self.db.get_task(task_id).await?;
        if task.is_none() {
            warn!("Session {} references missing task {}", session.id, task_id);
        }
        Ok(task.map(|t| t.title))
    }

    pub async fn check_daily_limit(&self, user_id: i64, activity_key: &str) -> Result<LimitCheck> {
        let now = self.clock.now();
        limits::check_daily_limit(&self.db, user_id, activity_key, now.date(), now).await
    }

    pub async fn get_today_summary(&self, user_id: i64) -> Result<DailySummary> {
        let now = self.clock.now();
        summary::daily_summary(&self.db, user_id, now.date(), now).await
    }

    pub async fn get_daily_summary(&self, user_id: i64, date: NaiveDate) -> Result<DailySummary> {
        summary::daily_summary(&self.db, user_id, date, self.clock.now()).await
    }

    pub async fn get_range_summary(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<RangeSummary> {
        summary::range_summary(&self.db, user_id, from, to, self.clock.now()).await
    }

    /// The week containing `any_day`.
    pub async fn get_weekly_summary(
        &self,
        user_id: i64,
        any_day: NaiveDate,
    ) -> Result<RangeSummary> {
        summary::weekly_summary(&self.db, user_id, any_day, self.clock.now()).await
    }

    /// Every employee's numbers for today.
    pub async fn get_team_today_summary(&self) -> Result<TeamSummary> {
        let now = self.clock.now();
        summary::team_summary(&self.db, now.date(), now.date(), now).await
    }

    pub async fn get_team_range_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<TeamSummary> {
        summary::team_summary(&self.db, from, to, self.clock.now()).await
    }

    /// Every employee's numbers for the Monday-to-Sunday week containing
    /// `any_day`.
    pub async fn get_team_weekly_summary(&self, any_day: NaiveDate) -> Result<TeamSummary> {
        let from = summary::week_start(any_day);
        let to = from + chrono::Duration::days(6);
        self.get_team_range_summary(from, to).await
    }

    /// Pending and in-progress tasks, most important first.
    pub async fn get_unfinished_tasks_during_break(&self, user_id: i64) -> Result<Vec<Task>> {
        self.db.list_unfinished_tasks(user_id).await
    }

    pub async fn get_task_time_spent(&self, user_id: i64, task_id: i64) -> Result<i64> {
        summary::task_time_spent(&self.db, user_id, task_id, self.clock.now()).await
    }

    pub async fn get_day_timeline(&self, user_id: i64, date: NaiveDate) -> Result<DayTimeline> {
        summary::day_timeline(&self.db, user_id, date, self.clock.now()).await
    }

    pub async fn list_active_work(&self) -> Result<Vec<ActiveWork>> {
        self.db.list_active_work(self.clock.now()).await
    }

    /// Closes all but the most recent active session of every user.
    pub async fn reconcile_all(&self) -> Result<usize> {
        let closed = self.db.reconcile_active_sessions(self.clock.now()).await?;
        if closed > 0 {
            warn!("Closed {} duplicate active session(s)", closed);
        }
        Ok(closed)
    }
}

fn idle_kind() -> SessionKind {
    SessionKind::Activity {
        activity_key: IDLE.to_string(),
    }
}

fn settle(operation: &str, user_id: i64, attempt: Attempt) -> ActionOutcome {
    match attempt {
        Ok(Ok(message)) => ActionOutcome::ok(message),
        Ok(Err(refusal)) => {
            debug!("{} refused for user {}: {}", operation, user_id, refusal);
            ActionOutcome::refused(refusal)
        }
        Err(err) => {
            error!("{} failed for user {}: {:#}", operation, user_id, err);
            ActionOutcome::failed()
        }
    }
}

fn describe_summary(summary: &DailySummary) -> String {
    format!(
        "Task time: {}\nLunch & prayer: {}\nBreak: {}\nIdle: {}\nTotal: {}",
        format_minutes(summary.task_time),
        format_minutes(summary.lunch_time),
        format_minutes(summary.break_time),
        format_minutes(summary.idle_time),
        format_minutes(summary.total_time),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        models::{
            activity::{BREAK, LUNCH_PRAYER},
            HolidayKind, NewTask, TaskStatus, UserRole,
        },
        DailyActivity,
    };
    use crate::error::STORAGE_FAILURE_MESSAGE;
    use crate::utils::{clock::parse_timestamp, ManualClock};
    use chrono::NaiveDateTime;

    fn ts(value: &str) -> NaiveDateTime {
        parse_timestamp(value).unwrap()
    }

    struct Fixture {
        tracker: WorkTracker,
        clock: Arc<ManualClock>,
        user_id: i64,
    }

    impl Fixture {
        fn db(&self) -> &Database {
            self.tracker.database()
        }

        async fn task_for(&self, user_id: Option<i64>, title: &str) -> Task {
            self.db()
                .insert_task(
                    NewTask {
                        title: title.into(),
                        assigned_to: user_id,
                        importance: Some(2),
                        priority: Some(2),
                        allocated_minutes: None,
                    },
                    self.clock.now(),
                )
                .await
                .unwrap()
        }
    }

    // 2024-03-04 is a Monday.
    async fn fixture_with(catalog: Vec<DailyActivity>) -> Fixture {
        let db = Database::open_in_memory().unwrap();
        db.seed_activities(&catalog).await.unwrap();

        let clock = Arc::new(ManualClock::new(ts("2024-03-04 08:00:00")));
        let user = db
            .insert_user("Maryam", UserRole::Employee, clock.now())
            .await
            .unwrap();

        Fixture {
            tracker: WorkTracker::new(db, clock.clone(), Weekday::Fri),
            clock,
            user_id: user.id,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(DailyActivity::default_catalog()).await
    }

    #[tokio::test]
    async fn work_day_task_and_end_add_up() {
        let fx = fixture().await;
        let task = fx.task_for(Some(fx.user_id), "Invoice batch").await;

        assert!(fx.tracker.start_work_day(fx.user_id).await.success);
        let status = fx.tracker.get_current_status(fx.user_id).await.unwrap();
        assert!(status.is_working);
        assert_eq!(status.activity_key.as_deref(), Some(IDLE));
        let idle_id = status.session_id.unwrap();

        fx.clock.advance_minutes(12);
        let started = fx.tracker.start_task(fx.user_id, task.id).await;
        assert!(started.success, "{}", started.message);

        let status = fx.tracker.get_current_status(fx.user_id).await.unwrap();
        assert_eq!(status.session_type, Some(SessionType::Task));
        assert_eq!(status.task_id, Some(task.id));
        assert_eq!(status.label.as_deref(), Some("Invoice batch"));

        let idle = fx.db().get_session(&idle_id).await.unwrap().unwrap();
        assert!(!idle.is_active);
        assert_eq!(idle.duration_minutes, Some(12));

        let task = fx.db().get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);

        fx.clock.advance_minutes(95);
        let ended = fx.tracker.end_work_day(fx.user_id).await;
        assert!(ended.success);
        assert!(ended.message.contains("Total: 1:47"), "{}", ended.message);
        assert_eq!(fx.db().count_active_sessions(fx.user_id).await.unwrap(), 0);

        let summary = fx.tracker.get_today_summary(fx.user_id).await.unwrap();
        assert_eq!(summary.task_time, 95);
        assert_eq!(summary.idle_time, 12);
        assert_eq!(summary.task_time + summary.idle_time, summary.total_time);

        let status = fx.tracker.get_current_status(fx.user_id).await.unwrap();
        assert!(!status.is_working);
        assert_eq!(status.day_state, DayState::Ended);
    }

    #[tokio::test]
    async fn only_one_session_stays_active() {
        let fx = fixture().await;
        let first = fx.task_for(Some(fx.user_id), "First").await;
        let second = fx.task_for(Some(fx.user_id), "Second").await;

        assert!(fx.tracker.start_work_day(fx.user_id).await.success);
        for step in 0..4 {
            fx.clock.advance_minutes(5);
            let outcome = match step % 3 {
                0 => fx.tracker.start_task(fx.user_id, first.id).await,
                1 => fx.tracker.start_daily_activity(fx.user_id, BREAK).await,
                _ => fx.tracker.start_task(fx.user_id, second.id).await,
            };
            assert!(outcome.success, "{}", outcome.message);
            assert_eq!(fx.db().count_active_sessions(fx.user_id).await.unwrap(), 1);
        }

        let (a, b, c) = tokio::join!(
            fx.tracker.start_task(fx.user_id, second.id),
            fx.tracker.start_daily_activity(fx.user_id, BREAK),
            fx.tracker.start_task(fx.user_id, first.id),
        );
        assert!(a.success && b.success && c.success);
        assert_eq!(fx.db().count_active_sessions(fx.user_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_start_of_the_day_is_refused() {
        let fx = fixture().await;
        assert!(fx.tracker.start_work_day(fx.user_id).await.success);

        let again = fx.tracker.start_work_day(fx.user_id).await;
        assert!(!again.success);
        assert_eq!(again.refusal, Some(Refusal::DayAlreadyStarted));
    }

    #[tokio::test]
    async fn holidays_block_the_work_day() {
        let fx = fixture().await;
        fx.db()
            .add_holiday(
                fx.clock.today(),
                "Nowruz",
                HolidayKind::Occasional,
                fx.clock.now(),
            )
            .await
            .unwrap();

        let outcome = fx.tracker.start_work_day(fx.user_id).await;
        assert_eq!(outcome.refusal, Some(Refusal::Holiday(fx.clock.today())));

        fx.clock.set(ts("2024-03-08 08:00:00"));
        let friday = fx.tracker.start_work_day(fx.user_id).await;
        assert!(!friday.success);
        assert_eq!(friday.message, "2024-03-08 is a holiday!");
        assert_eq!(fx.db().count_active_sessions(fx.user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn tasks_must_exist_and_belong_to_the_user() {
        let fx = fixture().await;
        let colleague = fx
            .db()
            .insert_user("Ali", UserRole::Employee, fx.clock.now())
            .await
            .unwrap();
        let theirs = fx.task_for(Some(colleague.id), "Not mine").await;
        let unassigned = fx.task_for(None, "Nobody's").await;

        let outcome = fx.tracker.start_task(fx.user_id, theirs.id).await;
        assert_eq!(
            outcome.refusal,
            Some(Refusal::TaskNotAssigned { task_id: theirs.id })
        );
        let outcome = fx.tracker.start_task(fx.user_id, unassigned.id).await;
        assert!(!outcome.success);
        let outcome = fx.tracker.start_task(fx.user_id, 9_999).await;
        assert_eq!(outcome.refusal, Some(Refusal::UnknownTask(9_999)));
        let outcome = fx.tracker.start_task(9_999, theirs.id).await;
        assert_eq!(outcome.message, "User not found!");

        assert_eq!(fx.db().count_active_sessions(fx.user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn lunch_is_single_use() {
        let fx = fixture().await;
        assert!(fx.tracker.start_work_day(fx.user_id).await.success);

        let lunch = fx.tracker.start_daily_activity(fx.user_id, LUNCH_PRAYER).await;
        assert!(lunch.success);
        assert!(lunch.message.contains("Remaining today: 60 min"), "{}", lunch.message);

        fx.clock.advance_minutes(3);
        let again = fx.tracker.start_daily_activity(fx.user_id, LUNCH_PRAYER).await;
        assert!(!again.success);
        assert_eq!(
            again.message,
            "The daily limit for Lunch & prayer has been reached!"
        );

        fx.clock.advance_minutes(57);
        assert!(fx.tracker.start_daily_activity(fx.user_id, BREAK).await.success);
        fx.clock.advance_minutes(5);
        assert!(!fx
            .tracker
            .start_daily_activity(fx.user_id, LUNCH_PRAYER)
            .await
            .success);
    }

    #[tokio::test]
    async fn metered_break_counts_down() {
        let mut catalog = DailyActivity::default_catalog();
        if let Some(brk) = catalog.iter_mut().find(|a| a.activity_key == BREAK) {
            brk.max_duration_minutes = Some(30);
        }
        let fx = fixture_with(catalog).await;
        assert!(fx.tracker.start_work_day(fx.user_id).await.success);

        assert!(fx.tracker.start_daily_activity(fx.user_id, BREAK).await.success);
        fx.clock.advance_minutes(20);
        assert!(fx.tracker.start_daily_activity(fx.user_id, IDLE).await.success);

        let check = fx.tracker.check_daily_limit(fx.user_id, BREAK).await.unwrap();
        assert_eq!(
            check,
            LimitCheck {
                can_use: true,
                remaining_minutes: 10
            }
        );

        let resumed = fx.tracker.start_daily_activity(fx.user_id, BREAK).await;
        assert!(resumed.message.contains("Remaining today: 10 min"));
        fx.clock.advance_minutes(10);

        let check = fx.tracker.check_daily_limit(fx.user_id, BREAK).await.unwrap();
        assert!(!check.can_use);
        let refused = fx.tracker.start_daily_activity(fx.user_id, BREAK).await;
        assert!(!refused.success);
    }

    #[tokio::test]
    async fn unknown_activity_is_refused() {
        let fx = fixture().await;
        let outcome = fx.tracker.start_daily_activity(fx.user_id, "nap").await;
        assert_eq!(outcome.refusal, Some(Refusal::UnknownActivity("nap".into())));
    }

    #[tokio::test]
    async fn stopping_a_task_returns_to_idle() {
        let fx = fixture().await;
        let task = fx.task_for(Some(fx.user_id), "Audit").await;

        let nothing = fx.tracker.stop_current_task(fx.user_id).await;
        assert_eq!(nothing.refusal, Some(Refusal::NoActiveTask));

        assert!(fx.tracker.start_task(fx.user_id, task.id).await.success);
        fx.clock.advance_minutes(75);
        let stopped = fx.tracker.stop_current_task(fx.user_id).await;
        assert_eq!(stopped.message, "Stopped \"Audit\" after 1:15.");

        let status = fx.tracker.get_current_status(fx.user_id).await.unwrap();
        assert_eq!(status.activity_key.as_deref(), Some(IDLE));
        assert_eq!(
            fx.tracker
                .get_task_time_spent(fx.user_id, task.id)
                .await
                .unwrap(),
            75
        );
    }

    #[tokio::test]
    async fn deleted_task_leaves_a_readable_status() {
        let fx = fixture().await;
        let task = fx.task_for(Some(fx.user_id), "Temporary").await;

        assert!(fx.tracker.start_task(fx.user_id, task.id).await.success);
        fx.clock.advance_minutes(30);
        assert!(fx.db().delete_task(task.id).await.unwrap());

        let status = fx.tracker.get_current_status(fx.user_id).await.unwrap();
        assert!(status.is_working);
        assert_eq!(status.label, None);
        assert_eq!(status.task_id, None);
        assert_eq!(status.elapsed_minutes, 30);

        let summary = fx.tracker.get_today_summary(fx.user_id).await.unwrap();
        assert_eq!(summary.task_time, 30);

        let active = fx.tracker.list_active_work().await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn nudge_lists_unfinished_tasks_by_importance() {
        let fx = fixture().await;
        let now = fx.clock.now();
        for (title, importance, priority) in [("Low", 3, 1), ("Urgent", 1, 2), ("Top", 1, 1)] {
            fx.db()
                .insert_task(
                    NewTask {
                        title: title.into(),
                        assigned_to: Some(fx.user_id),
                        importance: Some(importance),
                        priority: Some(priority),
                        allocated_minutes: None,
                    },
                    now,
                )
                .await
                .unwrap();
        }

        let titles: Vec<String> = fx
            .tracker
            .get_unfinished_tasks_during_break(fx.user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["Top", "Urgent", "Low"]);
    }

    #[tokio::test]
    async fn not_started_status() {
        let fx = fixture().await;
        let status = fx.tracker.get_current_status(fx.user_id).await.unwrap();
        assert!(!status.is_working);
        assert_eq!(status.day_state, DayState::NotStarted);
        assert_eq!(status.elapsed_minutes, 0);
    }

    #[tokio::test]
    async fn storage_failures_are_reported_not_hidden() {
        let fx = fixture().await;
        let task = fx.task_for(Some(fx.user_id), "Payroll").await;

        fx.db()
            .execute(|conn| {
                conn.execute_batch("DROP TABLE work_sessions")?;
                Ok(())
            })
            .await
            .unwrap();

        let day = fx.tracker.start_work_day(fx.user_id).await;
        assert!(!day.success);
        assert!(day.refusal.is_none());
        assert_eq!(day.message, STORAGE_FAILURE_MESSAGE);

        let started = fx.tracker.start_task(fx.user_id, task.id).await;
        assert!(!started.success);
        assert_eq!(started.message, STORAGE_FAILURE_MESSAGE);

        let task = fx.db().get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        assert!(fx.tracker.get_today_summary(fx.user_id).await.is_err());
        assert!(fx.tracker.get_current_status(fx.user_id).await.is_err());
    }

    #[tokio::test]
    async fn unknown_users_are_not_tracked() {
        let fx = fixture().await;
        for ghost in 1_000..1_010 {
            let outcome = fx.tracker.start_work_day(ghost).await;
            assert_eq!(outcome.refusal, Some(Refusal::UnknownUser(ghost)));
        }
        assert_eq!(fx.tracker.tracked_users(), 0);

        assert!(fx.tracker.start_work_day(fx.user_id).await.success);
        assert_eq!(fx.tracker.tracked_users(), 1);
    }

    #[tokio::test]
    async fn team_reports_cover_today_and_the_week() {
        let fx = fixture().await;
        let colleague = fx
            .db()
            .insert_user("Kian", UserRole::Employee, fx.clock.now())
            .await
            .unwrap();

        assert!(fx.tracker.start_work_day(fx.user_id).await.success);
        fx.clock.advance_minutes(40);
        assert!(fx.tracker.end_work_day(fx.user_id).await.success);

        // Wednesday of the same week.
        fx.clock.set(ts("2024-03-06 08:00:00"));
        assert!(fx.tracker.start_work_day(colleague.id).await.success);
        fx.clock.advance_minutes(20);

        let today = fx.tracker.get_team_today_summary().await.unwrap();
        assert_eq!(today.from, today.to);
        assert_eq!(today.totals.idle_time, 20);

        let week = fx
            .tracker
            .get_team_weekly_summary(fx.clock.today())
            .await
            .unwrap();
        assert_eq!(week.from, ts("2024-03-04 00:00:00").date());
        assert_eq!(week.to, ts("2024-03-10 00:00:00").date());
        assert_eq!(week.totals.total_time, 60);

        let days: Vec<(&str, u32)> = week
            .members
            .iter()
            .map(|m| (m.user_name.as_str(), m.work_days))
            .collect();
        assert_eq!(days, vec![("Kian", 1), ("Maryam", 1)]);
    }
}
