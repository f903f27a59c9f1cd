use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{parse_day, parse_holiday_kind},
    models::{Holiday, HolidayKind},
    Database,
};
use crate::utils::clock::{format_date, format_timestamp};

fn row_to_holiday(row: &Row) -> Result<Holiday> {
    let date: String = row.get("holiday_date")?;
    let kind: String = row.get("holiday_kind")?;
    Ok(Holiday {
        id: row.get("id")?,
        date: parse_day(&date, "holiday_date")?,
        title: row.get("title")?,
        kind: parse_holiday_kind(&kind)?,
    })
}

impl Database {
    pub async fn add_holiday(
        &self,
        date: NaiveDate,
        title: &str,
        kind: HolidayKind,
        now: NaiveDateTime,
    ) -> Result<Holiday> {
        let title = title.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO holidays (holiday_date, title, holiday_kind, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![format_date(&date), title, kind.as_str(), format_timestamp(&now)],
            )
            .with_context(|| format!("failed to add holiday on {date}"))?;

            Ok(Holiday {
                id: conn.last_insert_rowid(),
                date,
                title,
                kind,
            })
        })
        .await
    }

    /// Newest first.
    pub async fn list_holidays(&self) -> Result<Vec<Holiday>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, holiday_date, title, holiday_kind
                 FROM holidays
                 ORDER BY holiday_date DESC",
            )?;
            let mut rows = stmt.query([])?;
            let mut holidays = Vec::new();
            while let Some(row) = rows.next()? {
                holidays.push(row_to_holiday(row)?);
            }
            Ok(holidays)
        })
        .await
    }

    pub async fn delete_holiday(&self, holiday_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM holidays WHERE id = ?1", params![holiday_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }

    /// True on the weekly rest day or any recorded holiday.
    pub async fn is_holiday(&self, date: NaiveDate, weekly_rest_day: Weekday) -> Result<bool> {
        if date.weekday() == weekly_rest_day {
            return Ok(true);
        }

        self.execute(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT id FROM holidays WHERE holiday_date = ?1",
                    params![format_date(&date)],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }
}
