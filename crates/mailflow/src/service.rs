//! The automation facade: incoming-mail processing, config access and the
//! scheduled-send queue behind one handle.

use std::sync::Arc;

use log::info;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info_span, Instrument};

use crate::autoreply::{AutoReplyOutcome, AutoReplyThrottle};
use crate::classify::{fingerprint, ClassificationCache, ClassificationResult, Classifier};
use crate::clock::{Clock, SystemClock};
use crate::config::{AutomationConfig, ConfigStore};
use crate::email::{IncomingEmail, Mailer, OutgoingMail};
use crate::error::Result;
use crate::records::Records;
use crate::schedule::{ScheduleHistoryEntry, ScheduleQueue, ScheduledEmail, SweepReport};
use crate::store::KvStore;

/// An incoming email after classification and the auto-reply decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedEmail {
    #[serde(flatten)]
    pub email: IncomingEmail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
    pub auto_reply: AutoReplyOutcome,
}

pub struct EmailAutomation {
    configs: ConfigStore,
    classifications: ClassificationCache,
    replies: AutoReplyThrottle,
    schedule: ScheduleQueue,
    /// Held for a whole incoming batch so two batches never interleave
    /// their reply-state read-modify-write.
    state_lock: Mutex<()>,
}

pub struct EmailAutomationBuilder {
    store: Arc<dyn KvStore>,
    clock: Option<Arc<dyn Clock>>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl EmailAutomationBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// External classifier consulted before the heuristic.
    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn build(self) -> EmailAutomation {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let records = Records::new(self.store);

        EmailAutomation {
            configs: ConfigStore::new(records.clone()),
            classifications: ClassificationCache::new(
                records.clone(),
                clock.clone(),
                self.classifier,
            ),
            replies: AutoReplyThrottle::new(records.clone(), clock.clone()),
            schedule: ScheduleQueue::new(records, clock),
            state_lock: Mutex::new(()),
        }
    }
}

impl EmailAutomation {
    pub fn builder(store: Arc<dyn KvStore>) -> EmailAutomationBuilder {
        EmailAutomationBuilder {
            store,
            clock: None,
            classifier: None,
        }
    }

    /// System clock, no external classifier.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::builder(store).build()
    }

    pub fn automation_config(&self) -> AutomationConfig {
        self.configs.load()
    }

    pub fn save_automation_config(&self, config: AutomationConfig) -> Result<AutomationConfig> {
        Ok(self.configs.save(config)?)
    }

    /// Deep-merges `partial` (a JSON object) over the current config.
    pub fn update_automation_config(&self, partial: Value) -> Result<AutomationConfig> {
        Ok(self.configs.update(partial)?)
    }

    /// Classifies a single email with the current config.
    pub async fn classify_email(&self, email: &IncomingEmail) -> Option<ClassificationResult> {
        let config = self.configs.load();
        self.classifications.classify(email, &config).await
    }

    /// Classifies each email and sends at most one auto-reply per email,
    /// in input order. Per-email failures never abort the batch.
    pub async fn process_incoming_emails(
        &self,
        emails: Vec<IncomingEmail>,
        mailer: Option<&dyn Mailer>,
    ) -> Vec<ProcessedEmail> {
        if emails.is_empty() {
            return Vec::new();
        }

        let span = info_span!("process_incoming", count = emails.len());
        self.process_batch(emails, mailer).instrument(span).await
    }

    async fn process_batch(
        &self,
        emails: Vec<IncomingEmail>,
        mailer: Option<&dyn Mailer>,
    ) -> Vec<ProcessedEmail> {
        let config = self.configs.load();
        let _state = self.state_lock.lock().await;
        let mut state = self.replies.load_state();

        let mut processed = Vec::with_capacity(emails.len());
        for mut email in emails {
            let classification = self.classifications.classify(&email, &config).await;
            if let Some(result) = &classification {
                if email.suggested_tags.is_none() && !result.tags.is_empty() {
                    email.suggested_tags = Some(result.tags.clone());
                }
                if email.suggested_folder.is_none() {
                    email.suggested_folder = result.folder.clone();
                }
            }

            let message_key = message_key(&email);
            let auto_reply = self
                .replies
                .maybe_auto_reply(
                    &email,
                    &message_key,
                    classification.as_ref(),
                    &config,
                    &mut state,
                    mailer,
                )
                .await;

            processed.push(ProcessedEmail {
                email,
                classification,
                auto_reply,
            });
        }

        self.replies.save_state(&mut state);

        let sent = processed.iter().filter(|p| p.auto_reply.is_sent()).count();
        info!(
            "Processed {} incoming emails, {} auto-replies sent",
            processed.len(),
            sent
        );
        processed
    }

    pub fn scheduled_emails(&self) -> Vec<ScheduledEmail> {
        self.schedule.pending()
    }

    pub fn scheduled_history(&self) -> Vec<ScheduleHistoryEntry> {
        self.schedule.history()
    }

    /// Queues `payload` for `scheduled_at` (ISO 8601, UTC when no offset is
    /// given) and returns its id.
    pub fn schedule_email_send(&self, payload: OutgoingMail, scheduled_at: &str) -> Result<String> {
        Ok(self.schedule.schedule(payload, scheduled_at)?)
    }

    pub fn cancel_scheduled_email(&self, id: &str) -> Result<bool> {
        Ok(self.schedule.cancel(id)?)
    }

    /// Sends every due scheduled email. Meant to be called periodically.
    pub async fn process_scheduled_emails(
        &self,
        mailer: Option<&dyn Mailer>,
    ) -> Result<SweepReport> {
        Ok(self.schedule.sweep(mailer).await?)
    }
}

/// Key for the once-per-message reply rule: the email id, or its
/// fingerprint when it has none.
fn message_key(email: &IncomingEmail) -> String {
    email
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fingerprint(email))
}
