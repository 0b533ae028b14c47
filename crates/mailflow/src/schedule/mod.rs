//! Scheduled-send queue.

pub mod model;
pub mod queue;

pub use model::{ScheduleHistoryEntry, ScheduleRecord, ScheduleStatus, ScheduledEmail, SweepReport};
pub use queue::{ScheduleQueue, HISTORY_LIMIT, MAX_RETRIES, MIN_LEAD_SECONDS};
