//! Persisted queue of emails to send later.
//!
//! The crate owns no timers: the caller runs [`ScheduleQueue::sweep`]
//! periodically. Sweeps are exclusive per queue; `schedule` and `cancel`
//! may run while a sweep is sending and are merged into its result.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use log::{debug, info, warn};
use tokio::sync::Mutex;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::model::{
    ScheduleHistoryEntry, ScheduleRecord, ScheduleStatus, ScheduledEmail, SweepReport,
};
use crate::clock::Clock;
use crate::email::{Mailer, OutgoingMail};
use crate::error::ScheduleError;
use crate::records::Records;
use crate::sanitize::redact_address;
use crate::store::keys;

/// Attempts before an entry is moved to history as failed.
pub const MAX_RETRIES: u32 = 3;
/// Most recent history entries kept.
pub const HISTORY_LIMIT: usize = 100;
/// How far ahead a new entry must be scheduled.
pub const MIN_LEAD_SECONDS: i64 = 60;

const SUFFIX_LEN: usize = 6;
/// Offset-less forms accepted after RFC 3339, as sent by `datetime-local` inputs.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const DEFAULT_SEND_ERROR: &str = "send_failed";

pub struct ScheduleQueue {
    records: Records,
    clock: Arc<dyn Clock>,
    sweep_lock: Mutex<()>,
}

impl ScheduleQueue {
    pub fn new(records: Records, clock: Arc<dyn Clock>) -> Self {
        Self {
            records,
            clock,
            sweep_lock: Mutex::new(()),
        }
    }

    /// Queues `payload` for the ISO 8601 time `scheduled_at`. Times without
    /// an offset are taken as UTC.
    pub fn schedule(
        &self,
        payload: OutgoingMail,
        scheduled_at: &str,
    ) -> Result<String, ScheduleError> {
        let raw = scheduled_at.trim();
        if raw.is_empty() {
            return Err(ScheduleError::MissingScheduledAt);
        }

        self.schedule_at(payload, parse_scheduled_at(raw)?)
    }

    pub fn schedule_at(
        &self,
        payload: OutgoingMail,
        at: DateTime<Utc>,
    ) -> Result<String, ScheduleError> {
        if !payload.attachments.is_empty() {
            return Err(ScheduleError::AttachmentsUnsupported {
                count: payload.attachments.len(),
            });
        }

        let now = self.clock.now();
        let earliest = now + Duration::seconds(MIN_LEAD_SECONDS);
        if at < earliest {
            return Err(ScheduleError::TooSoon {
                scheduled_at: at.to_rfc3339(),
                earliest: earliest.to_rfc3339(),
            });
        }

        let id = format!("sched_{}_{}", now.timestamp_millis(), random_suffix());
        let to = redact_address(&payload.to);
        let entry = ScheduledEmail {
            id: id.clone(),
            payload,
            scheduled_at: at,
            created_at: now,
            status: ScheduleStatus::Scheduled,
            retry_count: 0,
            last_error: None,
        };

        self.records
            .update(keys::SCHEDULE, |record: &mut ScheduleRecord| {
                record.queue.push(entry);
            })?;

        info!("Scheduled email {} to {} for {}", id, to, at.to_rfc3339());
        Ok(id)
    }

    /// Removes an entry from the active queue. History is never touched.
    pub fn cancel(&self, id: &str) -> Result<bool, ScheduleError> {
        let removed = self
            .records
            .update(keys::SCHEDULE, |record: &mut ScheduleRecord| {
                let before = record.queue.len();
                record.queue.retain(|entry| entry.id != id);
                record.queue.len() != before
            })?;

        if removed {
            info!("Cancelled scheduled email {}", id);
        } else {
            debug!("No scheduled email {} to cancel", id);
        }
        Ok(removed)
    }

    pub fn pending(&self) -> Vec<ScheduledEmail> {
        self.read().queue
    }

    /// Terminal entries, oldest first.
    pub fn history(&self) -> Vec<ScheduleHistoryEntry> {
        self.read().history
    }

    /// Sends every due entry once, in queue order.
    ///
    /// Without a mailer nothing is sent and the queue is left as is.
    pub async fn sweep(&self, mailer: Option<&dyn Mailer>) -> Result<SweepReport, ScheduleError> {
        let Some(mailer) = mailer else {
            debug!("Schedule sweep skipped: no mailer");
            return Ok(SweepReport {
                pending: self.read().queue.len(),
                ..Default::default()
            });
        };

        let span = info_span!("schedule_sweep");
        self.sweep_with(mailer).instrument(span).await
    }

    async fn sweep_with(&self, mailer: &dyn Mailer) -> Result<SweepReport, ScheduleError> {
        let _sweep = self.sweep_lock.lock().await;

        let snapshot = self.read().queue;
        let snapshot_ids: HashSet<String> = snapshot.iter().map(|e| e.id.clone()).collect();
        let now = self.clock.now();

        let mut report = SweepReport::default();
        let mut remaining: Vec<ScheduledEmail> = Vec::with_capacity(snapshot.len());
        let mut finished: Vec<ScheduleHistoryEntry> = Vec::new();

        for mut entry in snapshot {
            if !entry.is_due(now) {
                remaining.push(entry);
                continue;
            }

            match mailer.send(&entry.payload).await {
                Ok(()) => {
                    info!("Sent scheduled email {}", entry.id);
                    report.sent += 1;
                    finished.push(ScheduleHistoryEntry::sent(entry, self.clock.now()));
                }
                Err(e) => {
                    let message = Some(e.to_string())
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| DEFAULT_SEND_ERROR.to_string());
                    entry.retry_count += 1;

                    if entry.retry_count >= MAX_RETRIES {
                        warn!(
                            "Scheduled email {} failed after {} attempts: {}",
                            entry.id, entry.retry_count, message
                        );
                        report.failed += 1;
                        let failed_at = self.clock.now();
                        finished.push(ScheduleHistoryEntry::failed(entry, failed_at, message));
                    } else {
                        warn!(
                            "Scheduled email {} failed (attempt {}), will retry: {}",
                            entry.id, entry.retry_count, message
                        );
                        report.retried += 1;
                        entry.last_error = Some(message);
                        entry.status = ScheduleStatus::Scheduled;
                        remaining.push(entry);
                    }
                }
            }
        }

        report.pending = self
            .records
            .update(keys::SCHEDULE, |record: &mut ScheduleRecord| {
                let live: HashSet<&str> = record.queue.iter().map(|e| e.id.as_str()).collect();
                let mut queue: Vec<ScheduledEmail> = remaining
                    .into_iter()
                    .filter(|e| live.contains(e.id.as_str()))
                    .collect();
                queue.extend(
                    record
                        .queue
                        .iter()
                        .filter(|e| !snapshot_ids.contains(&e.id))
                        .cloned(),
                );
                record.queue = queue;

                record.history.extend(finished);
                if record.history.len() > HISTORY_LIMIT {
                    let overflow = record.history.len() - HISTORY_LIMIT;
                    record.history.drain(..overflow);
                }

                record.queue.len()
            })?;

        debug!(
            "Schedule sweep done: {} sent, {} retried, {} failed, {} pending",
            report.sent, report.retried, report.failed, report.pending
        );
        Ok(report)
    }

    fn read(&self) -> ScheduleRecord {
        self.records.read_or_default(keys::SCHEDULE)
    }
}

fn parse_scheduled_at(raw: &str) -> Result<DateTime<Utc>, ScheduleError> {
    let rfc3339_err = match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => return Ok(at.with_timezone(&Utc)),
        Err(e) => e,
    };

    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .map(|at| Utc.from_utc_datetime(&at))
        .ok_or_else(|| ScheduleError::InvalidScheduledAt {
            value: raw.to_string(),
            reason: rfc3339_err.to_string(),
        })
}

/// Six random base-36 characters.
fn random_suffix() -> String {
    let mut n = Uuid::new_v4().as_u128();
    let mut out = String::with_capacity(SUFFIX_LEN);
    for _ in 0..SUFFIX_LEN {
        let digit = (n % 36) as u32;
        out.push(std::char::from_digit(digit, 36).unwrap_or('0'));
        n /= 36;
    }
    out
}
