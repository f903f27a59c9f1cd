pub mod controller;
pub mod limits;
pub mod state;
pub mod summary;
pub mod ticker;

pub use controller::WorkTracker;
pub use limits::{check_daily_limit, evaluate_limit, UNLIMITED_MINUTES};
pub use state::{CurrentStatus, DayState, LimitCheck};
pub use ticker::StatusTicker;
