pub mod db;
pub mod error;
pub mod settings;
pub mod tracking;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use log::{info, warn};

pub use db::Database;
pub use error::{ActionOutcome, Refusal};
pub use settings::{Settings, SettingsStore};
pub use tracking::{CurrentStatus, StatusTicker, WorkTracker};
pub use utils::{Clock, ManualClock, SystemClock};

/// Reads `RUST_LOG`, defaulting to `info`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Everything the conversational layer needs, wired together.
pub struct AppState {
    pub db: Database,
    pub tracker: WorkTracker,
    pub settings: SettingsStore,
}

impl AppState {
    /// Loads settings from `settings_path`, opens the configured database and
    /// runs the wall clock.
    pub async fn open(settings_path: PathBuf) -> Result<Self> {
        let settings = SettingsStore::new(settings_path)?;
        Self::with_clock(settings, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(settings: SettingsStore, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = settings.settings();

        let db_path = config.resolve_database_path();
        info!("Opening work-session database at {}", db_path.display());
        let database = Database::new(db_path)?;

        Self::assemble(database, settings, clock).await
    }

    /// Seeds the activity catalog and repairs duplicate active sessions left
    /// behind by an earlier crash.
    pub async fn assemble(
        database: Database,
        settings: SettingsStore,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let config = settings.settings();

        database.seed_activities(&config.activities).await?;

        let tracker = WorkTracker::new(database.clone(), clock, config.weekly_holiday);
        let repaired = tracker.reconcile_all().await?;
        if repaired > 0 {
            warn!("Recovered {} stale active session(s) on startup", repaired);
        }

        Ok(Self {
            db: database,
            tracker,
            settings,
        })
    }

    /// Starts a live status feed for one user at the configured interval.
    pub fn watch_status<F>(&self, user_id: i64, on_refresh: F) -> StatusTicker
    where
        F: Fn(CurrentStatus) + Send + 'static,
    {
        let every = self.settings.settings().refresh_interval();
        StatusTicker::spawn(self.tracker.clone(), user_id, every, on_refresh)
    }
}
