use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Row};

use crate::db::{
    helpers::{parse_datetime, parse_role, parse_task_status},
    models::{NewTask, Task, TaskStatus, User, UserRole},
    Database,
};
use crate::utils::clock::format_timestamp;

const TASK_COLUMNS: &str =
    "id, title, assigned_to, importance, priority, status, allocated_minutes, created_at";

fn row_to_task(row: &Row) -> Result<Task> {
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        assigned_to: row.get("assigned_to")?,
        importance: row.get("importance")?,
        priority: row.get("priority")?,
        status: parse_task_status(&status)?,
        allocated_minutes: row.get("allocated_minutes")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

fn row_to_user(row: &Row) -> Result<User> {
    let role: String = row.get("role")?;
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        role: parse_role(&role)?,
    })
}

impl Database {
    pub async fn insert_user(
        &self,
        name: &str,
        role: UserRole,
        now: NaiveDateTime,
    ) -> Result<User> {
        let name = name.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO users (name, role, created_at) VALUES (?1, ?2, ?3)",
                params![name, role.as_str(), format_timestamp(&now)],
            )
            .with_context(|| "failed to insert user")?;

            Ok(User {
                id: conn.last_insert_rowid(),
                name,
                role,
            })
        })
        .await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare("SELECT id, name, role FROM users WHERE id = ?1")?;
            let mut rows = stmt.query(params![user_id])?;
            let user = match rows.next()? {
                Some(row) => Some(row_to_user(row)?),
                None => None,
            };
            Ok(user)
        })
        .await
    }

    /// Users holding `role`, in name order.
    pub async fn list_users_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, role FROM users WHERE role = ?1 ORDER BY name ASC, id ASC",
            )?;
            let mut rows = stmt.query(params![role.as_str()])?;
            let mut users = Vec::new();
            while let Some(row) = rows.next()? {
                users.push(row_to_user(row)?);
            }
            Ok(users)
        })
        .await
    }

    pub async fn insert_task(&self, task: NewTask, now: NaiveDateTime) -> Result<Task> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO tasks (title, assigned_to, importance, priority, status, allocated_minutes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    task.title,
                    task.assigned_to,
                    task.importance,
                    task.priority,
                    TaskStatus::Pending.as_str(),
                    task.allocated_minutes,
                    format_timestamp(&now),
                ],
            )
            .with_context(|| "failed to insert task")?;

            let task_id = conn.last_insert_rowid();
            let mut stmt =
                conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
            let mut rows = stmt.query(params![task_id])?;
            match rows.next()? {
                Some(row) => row_to_task(row),
                None => Err(anyhow!("Task not found after insert")),
            }
        })
        .await
    }

    pub async fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        self.execute(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
            let mut rows = stmt.query(params![task_id])?;
            let task = match rows.next()? {
                Some(row) => Some(row_to_task(row)?),
                None => None,
            };
            Ok(task)
        })
        .await
    }

    pub async fn update_task_status(&self, task_id: i64, status: TaskStatus) -> Result<()> {
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2",
                params![status.as_str(), task_id],
            )?;

            if rows_affected == 0 {
                return Err(anyhow!("Task not found"));
            }
            Ok(())
        })
        .await
    }

    /// Deletes a task. Its work sessions survive with `reference_id` nulled by
    /// the foreign key. Returns `false` when nothing was deleted.
    pub async fn delete_task(&self, task_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let rows_affected = conn
                .execute("DELETE FROM tasks WHERE id = ?1", params![task_id])
                .with_context(|| format!("failed to delete task {task_id}"))?;
            Ok(rows_affected > 0)
        })
        .await
    }

    /// Pending and in-progress tasks assigned to the user, most important
    /// first, then most urgent. Unranked tasks sort last.
    pub async fn list_unfinished_tasks(&self, user_id: i64) -> Result<Vec<Task>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS}
                 FROM tasks
                 WHERE assigned_to = ?1 AND status IN ('pending', 'in_progress')
                 ORDER BY importance IS NULL, importance ASC,
                          priority IS NULL, priority ASC,
                          id ASC"
            ))?;

            let mut rows = stmt.query(params![user_id])?;
            let mut tasks = Vec::new();
            while let Some(row) = rows.next()? {
                tasks.push(row_to_task(row)?);
            }
            Ok(tasks)
        })
        .await
    }
}
