use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    helpers::{parse_datetime, parse_day, parse_optional_datetime, parse_session_type},
    models::{ActiveWork, SessionKind, TaskStatus, WorkSession},
    Database,
};
use crate::utils::clock::{elapsed_minutes, format_date, format_timestamp, raw_elapsed_minutes};

const SESSION_COLUMNS: &str = "id, user_id, session_type, reference_id, activity_key, start_time, end_time, duration_minutes, date, is_active";

fn row_to_session(row: &Row) -> Result<WorkSession> {
    let session_type: String = row.get("session_type")?;
    let start_time: String = row.get("start_time")?;
    let end_time: Option<String> = row.get("end_time")?;
    let date: String = row.get("date")?;
    let is_active: i64 = row.get("is_active")?;

    Ok(WorkSession {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        session_type: parse_session_type(&session_type)?,
        reference_id: row.get("reference_id")?,
        activity_key: row.get("activity_key")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_optional_datetime(end_time, "end_time")?,
        duration_minutes: row.get("duration_minutes")?,
        date: parse_day(&date, "date")?,
        is_active: is_active != 0,
    })
}

fn query_sessions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<WorkSession>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_session(row)?);
    }
    Ok(sessions)
}

/// Active sessions for a user, most recently started first.
fn active_sessions(conn: &Connection, user_id: i64) -> Result<Vec<WorkSession>> {
    query_sessions(
        conn,
        &format!(
            "SELECT {SESSION_COLUMNS}
             FROM work_sessions
             WHERE user_id = ?1 AND is_active = 1
             ORDER BY start_time DESC, rowid DESC"
        ),
        params![user_id],
    )
}

fn insert_session(
    conn: &Connection,
    user_id: i64,
    kind: &SessionKind,
    now: NaiveDateTime,
) -> Result<WorkSession> {
    let session = WorkSession {
        id: Uuid::new_v4().to_string(),
        user_id,
        session_type: kind.session_type(),
        reference_id: kind.reference_id(),
        activity_key: kind.activity_key().map(str::to_string),
        start_time: now,
        end_time: None,
        duration_minutes: None,
        date: now.date(),
        is_active: true,
    };

    conn.execute(
        "INSERT INTO work_sessions (id, user_id, session_type, reference_id, activity_key, start_time, end_time, duration_minutes, date, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL, ?7, 1)",
        params![
            session.id,
            session.user_id,
            session.session_type.as_str(),
            session.reference_id,
            session.activity_key,
            format_timestamp(&session.start_time),
            format_date(&session.date),
        ],
    )
    .with_context(|| "failed to insert work session")?;

    Ok(session)
}

/// Stamps `end_time`, `duration_minutes` and clears `is_active`.
fn close_session(
    conn: &Connection,
    session: &WorkSession,
    now: NaiveDateTime,
) -> Result<WorkSession> {
    let raw = raw_elapsed_minutes(&session.start_time, &now);
    if raw < 0 {
        warn!(
            "Session {} ends before it started ({} min); storing zero duration",
            session.id, raw
        );
    }
    let duration = raw.max(0);

    conn.execute(
        "UPDATE work_sessions
         SET end_time = ?1,
             duration_minutes = ?2,
             is_active = 0
         WHERE id = ?3",
        params![format_timestamp(&now), duration, session.id],
    )
    .with_context(|| format!("failed to close work session {}", session.id))?;

    Ok(WorkSession {
        end_time: Some(now),
        duration_minutes: Some(duration),
        is_active: false,
        ..session.clone()
    })
}

/// Closes the user's active sessions, newest first. The newest ends at `now`
/// unless `keep_newest` is set; every older duplicate ends where the next
/// newer one started, so overlapping minutes are counted once.
fn close_active_sessions(
    conn: &Connection,
    user_id: i64,
    now: NaiveDateTime,
    keep_newest: bool,
) -> Result<Vec<WorkSession>> {
    let active = active_sessions(conn, user_id)?;
    let mut closed = Vec::with_capacity(active.len());

    for (index, session) in active.iter().enumerate() {
        let end = match index.checked_sub(1) {
            None if keep_newest => continue,
            None => now,
            Some(newer) => active[newer].start_time.min(now),
        };
        closed.push(close_session(conn, session, end)?);
    }

    Ok(closed)
}

/// Outcome of closing whatever was running and opening the next session.
#[derive(Debug, Clone)]
pub struct SessionSwitch {
    pub closed: Vec<WorkSession>,
    pub opened: WorkSession,
}

impl Database {
    /// Opens a session without touching any other; callers own the
    /// single-active invariant. Prefer [`Database::switch_session`].
    pub async fn start_session(
        &self,
        user_id: i64,
        kind: SessionKind,
        now: NaiveDateTime,
    ) -> Result<WorkSession> {
        self.execute(move |conn| insert_session(conn, user_id, &kind, now))
            .await
    }

    /// Closes one session. Returns `false` when the id is unknown or the
    /// session was already closed.
    pub async fn end_session(&self, session_id: &str, now: NaiveDateTime) -> Result<bool> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let session = conn
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM work_sessions WHERE id = ?1"),
                    params![session_id],
                    |row| Ok(row_to_session(row)),
                )
                .optional()?
                .transpose()?;

            match session {
                Some(session) if session.is_active => {
                    close_session(conn, &session, now)?;
                    Ok(true)
                }
                Some(_) => Ok(false),
                None => {
                    warn!("Cannot end unknown session {session_id}");
                    Ok(false)
                }
            }
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<WorkSession>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut sessions = query_sessions(
                conn,
                &format!("SELECT {SESSION_COLUMNS} FROM work_sessions WHERE id = ?1"),
                params![session_id],
            )?;
            Ok(sessions.pop())
        })
        .await
    }

    /// The user's most recently started active session.
    pub async fn get_active_session(&self, user_id: i64) -> Result<Option<WorkSession>> {
        self.execute(move |conn| {
            let sessions = active_sessions(conn, user_id)?;
            if sessions.len() > 1 {
                warn!(
                    "User {} has {} active sessions; using the most recent",
                    user_id,
                    sessions.len()
                );
            }
            Ok(sessions.into_iter().next())
        })
        .await
    }

    pub async fn count_active_sessions(&self, user_id: i64) -> Result<usize> {
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM work_sessions WHERE user_id = ?1 AND is_active = 1",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    /// Every session (open or closed) attributed to `date`, oldest first.
    pub async fn get_sessions_by_date(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<WorkSession>> {
        self.execute(move |conn| {
            query_sessions(
                conn,
                &format!(
                    "SELECT {SESSION_COLUMNS}
                     FROM work_sessions
                     WHERE user_id = ?1 AND date = ?2
                     ORDER BY start_time ASC, rowid ASC"
                ),
                params![user_id, format_date(&date)],
            )
        })
        .await
    }

    /// Sessions attributed to any day in `from..=to`, oldest first.
    pub async fn get_sessions_in_range(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WorkSession>> {
        self.execute(move |conn| {
            query_sessions(
                conn,
                &format!(
                    "SELECT {SESSION_COLUMNS}
                     FROM work_sessions
                     WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
                     ORDER BY start_time ASC, rowid ASC"
                ),
                params![user_id, format_date(&from), format_date(&to)],
            )
        })
        .await
    }

    /// All of a user's sessions on one task, across days.
    pub async fn get_task_sessions(&self, user_id: i64, task_id: i64) -> Result<Vec<WorkSession>> {
        self.execute(move |conn| {
            query_sessions(
                conn,
                &format!(
                    "SELECT {SESSION_COLUMNS}
                     FROM work_sessions
                     WHERE reference_id = ?1 AND user_id = ?2 AND session_type = 'task'
                     ORDER BY start_time ASC, rowid ASC"
                ),
                params![task_id, user_id],
            )
        })
        .await
    }

    /// Minutes spent on `activity_key` on `date`. Closed sessions count their
    /// stored duration; an open one counts its live elapsed time as of `now`.
    pub async fn activity_minutes_used(
        &self,
        user_id: i64,
        activity_key: &str,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<i64> {
        let activity_key = activity_key.to_string();
        self.execute(move |conn| {
            let sessions = query_sessions(
                conn,
                &format!(
                    "SELECT {SESSION_COLUMNS}
                     FROM work_sessions
                     WHERE user_id = ?1 AND activity_key = ?2 AND date = ?3"
                ),
                params![user_id, activity_key, format_date(&date)],
            )?;
            Ok(sessions.iter().map(|s| s.accrued_minutes(&now)).sum())
        })
        .await
    }

    /// Closes every active session for the user, returning the closed rows.
    pub async fn end_all_active_sessions(
        &self,
        user_id: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<WorkSession>> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let closed = close_active_sessions(&tx, user_id, now, false)?;
            tx.commit().context("failed to commit session close")?;
            Ok(closed)
        })
        .await
    }

    /// Closes whatever the user has running and opens `kind`, in one
    /// transaction. Starting a task session also marks the task in progress.
    pub async fn switch_session(
        &self,
        user_id: i64,
        kind: SessionKind,
        now: NaiveDateTime,
    ) -> Result<SessionSwitch> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let closed = close_active_sessions(&tx, user_id, now, false)?;

            let opened = insert_session(&tx, user_id, &kind, now)?;

            if let SessionKind::Task { task_id } = kind {
                tx.execute(
                    "UPDATE tasks SET status = ?1 WHERE id = ?2 AND status = ?3",
                    params![
                        TaskStatus::InProgress.as_str(),
                        task_id,
                        TaskStatus::Pending.as_str(),
                    ],
                )
                .with_context(|| format!("failed to mark task {task_id} in progress"))?;
            }

            tx.commit().context("failed to commit session switch")?;
            Ok(SessionSwitch { closed, opened })
        })
        .await
    }

    /// Keeps only the most recent active session per user. Each stale one is
    /// closed where its successor started. Returns the number closed.
    pub async fn reconcile_active_sessions(&self, now: NaiveDateTime) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let users: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT user_id FROM work_sessions
                     WHERE is_active = 1
                     GROUP BY user_id
                     HAVING COUNT(*) > 1",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            let mut closed = 0;
            for user_id in users {
                let stale = close_active_sessions(&tx, user_id, now, true)?;
                warn!(
                    "User {} had {} duplicate active session(s); kept the most recent",
                    user_id,
                    stale.len()
                );
                closed += stale.len();
            }

            tx.commit().context("failed to commit session reconciliation")?;
            Ok(closed)
        })
        .await
    }

    /// Everyone currently timing a task.
    pub async fn list_active_work(&self, now: NaiveDateTime) -> Result<Vec<ActiveWork>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.user_id, u.name, s.reference_id, t.title, s.start_time
                 FROM work_sessions s
                 JOIN users u ON u.id = s.user_id
                 JOIN tasks t ON t.id = s.reference_id
                 WHERE s.is_active = 1 AND s.session_type = 'task'
                 ORDER BY s.start_time ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut work = Vec::new();
            while let Some(row) = rows.next()? {
                let started_at: String = row.get(4)?;
                let started_at = parse_datetime(&started_at, "start_time")?;
                work.push(ActiveWork {
                    user_id: row.get(0)?,
                    user_name: row.get(1)?,
                    task_id: row.get(2)?,
                    task_title: row.get(3)?,
                    started_at,
                    elapsed_minutes: elapsed_minutes(&started_at, &now),
                });
            }
            Ok(work)
        })
        .await
    }
}
