pub mod autoreply;
pub mod classify;
pub mod clock;
pub mod config;
pub mod email;
pub mod error;
pub mod records;
pub mod sanitize;
pub mod schedule;
pub mod service;
pub mod store;
pub mod telemetry;

pub use autoreply::{AutoReplyOutcome, AutoReplyThrottle, AutomationState, Category, SkipReason};
pub use classify::{
    ClassificationCache, ClassificationResult, ClassificationSource, Classifier,
    HeuristicClassifier,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AutomationConfig, ConfigStore};
pub use email::{Attachment, IncomingEmail, Mailer, OutgoingMail};
pub use error::{
    AutomationError, ClassifierError, ConfigError, Result, ScheduleError, SendError, StoreError,
};
pub use schedule::{
    ScheduleHistoryEntry, ScheduleQueue, ScheduleStatus, ScheduledEmail, SweepReport,
};
pub use service::{EmailAutomation, EmailAutomationBuilder, ProcessedEmail};
pub use store::{KvStore, MemoryStore, SqliteStore};
pub use telemetry::{init_tracing, LogFormat, TelemetryError};
