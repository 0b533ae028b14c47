use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Errors from the key-value persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// Failed to serialize a record before writing it.
    #[error("Failed to serialize record '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The store lock was poisoned.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Partial config update must be a JSON object")]
    InvalidPartial,

    #[error("Config does not match the automation schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("Failed to persist config: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by `schedule_email_send` and the queue sweep.
///
/// The first four variants are caller contract violations and are never
/// swallowed.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("scheduledAt is required")]
    MissingScheduledAt,

    #[error("Invalid scheduled date '{value}': {reason}")]
    InvalidScheduledAt { value: String, reason: String },

    #[error("Scheduling emails with attachments is not supported ({count} attached)")]
    AttachmentsUnsupported { count: usize },

    #[error("Scheduled date must be at least 1 minute in the future (got {scheduled_at}, earliest {earliest})")]
    TooSoon {
        scheduled_at: String,
        earliest: String,
    },

    #[error("Failed to persist schedule: {0}")]
    Store(#[from] StoreError),
}

/// Error returned by an injected classifier capability.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid classifier response: {0}")]
    InvalidResponse(String),

    #[error("Classifier timed out")]
    Timeout,
}

/// Error returned by an injected mailer capability.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("{0}")]
    Rejected(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Send timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, AutomationError>;
