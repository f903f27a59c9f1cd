pub mod activity;
pub mod holiday;
pub mod session;
pub mod summary;
pub mod task;

pub use activity::DailyActivity;
pub use holiday::{Holiday, HolidayKind};
pub use session::{SessionKind, SessionType, WorkSession};
pub use summary::{
    ActiveWork, DailySummary, DayTimeline, MemberSummary, RangeSummary, TeamSummary,
    TimelineEntry,
};
pub use task::{NewTask, Task, TaskStatus, User, UserRole};
