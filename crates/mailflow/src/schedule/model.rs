use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::email::OutgoingMail;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Scheduled,
    Sent,
    Failed,
}

/// An outgoing email waiting in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEmail {
    /// `sched_<ms>_<6 base36 chars>`.
    pub id: String,
    pub payload: OutgoingMail,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: ScheduleStatus,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ScheduledEmail {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }
}

/// A queue entry that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleHistoryEntry {
    #[serde(flatten)]
    pub email: ScheduledEmail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScheduleHistoryEntry {
    pub fn sent(mut email: ScheduledEmail, at: DateTime<Utc>) -> Self {
        email.status = ScheduleStatus::Sent;
        Self {
            email,
            sent_at: Some(at),
            failed_at: None,
            error: None,
        }
    }

    pub fn failed(mut email: ScheduledEmail, at: DateTime<Utc>, error: String) -> Self {
        email.status = ScheduleStatus::Failed;
        Self {
            email,
            sent_at: None,
            failed_at: Some(at),
            error: Some(error),
        }
    }

    pub fn status(&self) -> ScheduleStatus {
        self.email.status
    }
}

/// The persisted queue plus its bounded history (oldest first).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    #[serde(default)]
    pub queue: Vec<ScheduledEmail>,
    #[serde(default)]
    pub history: Vec<ScheduleHistoryEntry>,
}

/// Counts from one sweep of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub sent: usize,
    /// Failed attempts put back in the queue.
    pub retried: usize,
    /// Entries that exhausted their retries.
    pub failed: usize,
    /// Entries left in the queue afterwards.
    pub pending: usize,
}
