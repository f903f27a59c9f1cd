use anyhow::{Context, Result};
use chrono::Weekday;
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::db::DailyActivity;

/// Overrides `databasePath` when set.
pub const DATABASE_PATH_ENV: &str = "WORKTIME_DB";

const DEFAULT_DB_FILE: &str = "worktime.sqlite3";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub database_path: Option<PathBuf>,
    /// Rest day of every week; starting the work day is refused on it.
    pub weekly_holiday: Weekday,
    /// How often live status displays are redrawn.
    pub refresh_interval_secs: u64,
    /// Catalog seed, upserted into the database on open.
    pub activities: Vec<DailyActivity>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            weekly_holiday: Weekday::Fri,
            refresh_interval_secs: 60,
            activities: DailyActivity::default_catalog(),
        }
    }
}

impl Settings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// `WORKTIME_DB`, then `databasePath`, then the platform data directory.
    pub fn resolve_database_path(&self) -> PathBuf {
        if let Ok(path) = std::env::var(DATABASE_PATH_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.database_path {
            return path.clone();
        }

        match dirs::data_dir() {
            Some(dir) => dir.join("worktime").join(DEFAULT_DB_FILE),
            None => PathBuf::from(DEFAULT_DB_FILE),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(
                        "Ignoring malformed settings at {}: {err}",
                        path.display()
                    );
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> Settings {
        self.read().clone()
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create settings directory {}", parent.display())
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, Settings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Settings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
