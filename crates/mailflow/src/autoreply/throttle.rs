//! Per-sender, per-message auto-reply gate.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use super::category::map_to_category;
use super::state::AutomationState;
use super::template::{format_reply_date, render, TemplateContext};
use crate::classify::ClassificationResult;
use crate::clock::Clock;
use crate::config::schema::DEFAULT_REPLY_INTERVAL_HOURS;
use crate::config::AutomationConfig;
use crate::email::{extract_email_address, extract_sender_name, IncomingEmail, Mailer, OutgoingMail};
use crate::records::Records;
use crate::sanitize::{hash_address, redact_address};
use crate::store::keys;

const FALLBACK_SUBJECT_TEMPLATE: &str = "Re: [Asunto]";
const FALLBACK_SUBJECT: &str = "tu mensaje";
const MS_PER_HOUR: f64 = 60.0 * 60.0 * 1000.0;

/// Why an auto-reply was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Disabled,
    NoMailer,
    NoSender,
    UnparsableSender,
    OwnAddress,
    Excluded,
    AlreadyReplied,
    Throttled,
    NoTemplate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Disabled => "auto-reply disabled",
            SkipReason::NoMailer => "no mailer configured",
            SkipReason::NoSender => "email has no sender",
            SkipReason::UnparsableSender => "sender address is not parsable",
            SkipReason::OwnAddress => "sender is the account's own address",
            SkipReason::Excluded => "sender is excluded",
            SkipReason::AlreadyReplied => "message already answered",
            SkipReason::Throttled => "sender answered within the reply interval",
            SkipReason::NoTemplate => "no reply template",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum AutoReplyOutcome {
    Sent,
    Skipped(SkipReason),
    /// The mailer rejected the reply; carries its error message.
    Failed(String),
}

impl AutoReplyOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, AutoReplyOutcome::Sent)
    }
}

pub struct AutoReplyThrottle {
    records: Records,
    clock: Arc<dyn Clock>,
}

impl AutoReplyThrottle {
    pub fn new(records: Records, clock: Arc<dyn Clock>) -> Self {
        Self { records, clock }
    }

    pub fn load_state(&self) -> AutomationState {
        self.records.read_or_default(keys::STATE)
    }

    /// Prunes and persists `state`. Failures are logged, not returned.
    pub fn save_state(&self, state: &mut AutomationState) {
        state.prune();
        if let Err(e) = self.records.write(keys::STATE, state) {
            warn!("Failed to persist auto-reply state: {}", e);
        }
    }

    /// Sends at most one automatic reply for `email`.
    ///
    /// `message_key` identifies the email for the once-per-message rule.
    /// On success `state` is updated and persisted; otherwise it is left
    /// untouched.
    pub async fn maybe_auto_reply(
        &self,
        email: &IncomingEmail,
        message_key: &str,
        classification: Option<&ClassificationResult>,
        config: &AutomationConfig,
        state: &mut AutomationState,
        mailer: Option<&dyn Mailer>,
    ) -> AutoReplyOutcome {
        let prepared = self.prepare(
            email,
            message_key,
            classification,
            config,
            state,
            mailer.is_some(),
        );
        let (sender, mail) = match prepared {
            Ok(prepared) => prepared,
            Err(reason) => {
                debug!("Auto-reply skipped for {}: {}", message_key, reason);
                return AutoReplyOutcome::Skipped(reason);
            }
        };
        let Some(mailer) = mailer else {
            return AutoReplyOutcome::Skipped(SkipReason::NoMailer);
        };

        if let Err(e) = mailer.send(&mail).await {
            warn!(
                "Auto-reply to {} for {} failed: {}",
                redact_address(&sender),
                message_key,
                e
            );
            return AutoReplyOutcome::Failed(e.to_string());
        }

        state.record_reply(
            message_key,
            &sender,
            email.subject.as_deref(),
            classification,
            self.clock.now(),
        );
        self.save_state(state);

        info!("Auto-reply sent to {} for {}", redact_address(&sender), message_key);
        AutoReplyOutcome::Sent
    }

    /// Runs every gate and builds the reply, returning the normalized
    /// sender with it.
    fn prepare(
        &self,
        email: &IncomingEmail,
        message_key: &str,
        classification: Option<&ClassificationResult>,
        config: &AutomationConfig,
        state: &AutomationState,
        has_mailer: bool,
    ) -> Result<(String, OutgoingMail), SkipReason> {
        let reply = &config.auto_reply;
        if !reply.enabled {
            return Err(SkipReason::Disabled);
        }
        if !has_mailer {
            return Err(SkipReason::NoMailer);
        }

        let raw_from = email
            .from
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .ok_or(SkipReason::NoSender)?;
        let sender = extract_email_address(raw_from);
        if !sender.contains('@') {
            return Err(SkipReason::UnparsableSender);
        }

        let own = reply
            .identity_email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        if own.as_deref() == Some(sender.as_str()) {
            return Err(SkipReason::OwnAddress);
        }

        if reply
            .exclude_senders
            .iter()
            .any(|excluded| excluded.trim().to_lowercase() == sender)
        {
            return Err(SkipReason::Excluded);
        }

        if state.has_replied_to(message_key) {
            return Err(SkipReason::AlreadyReplied);
        }

        let now = self.clock.now();
        if let Some(last) = state.last_reply_to(&sender) {
            let hours = reply.reply_interval_hours;
            let interval_hours = if hours.is_finite() && hours > 0.0 {
                hours
            } else {
                DEFAULT_REPLY_INTERVAL_HOURS
            };
            let elapsed_ms = (now - last).num_milliseconds();
            if (elapsed_ms as f64) < interval_hours * MS_PER_HOUR {
                debug!(
                    "Sender {} last answered {}ms ago",
                    hash_address(&sender),
                    elapsed_ms
                );
                return Err(SkipReason::Throttled);
            }
        }

        let (tags, folder) = match classification {
            Some(c) => (c.tags.as_slice(), c.folder.as_deref()),
            None => (&[][..], None),
        };
        let category = map_to_category(tags, folder);

        let template = reply
            .categories
            .get(category.as_str())
            .filter(|c| c.enabled && !c.message.trim().is_empty())
            .map(|c| c.message.as_str())
            .unwrap_or(reply.general_message.as_str());
        if template.trim().is_empty() {
            return Err(SkipReason::NoTemplate);
        }

        let name = Some(extract_sender_name(raw_from))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| sender.clone());
        let ctx = TemplateContext {
            name,
            category: category.to_string(),
            subject: email.subject_str().to_string(),
            date: format_reply_date(now),
        };

        let body = render(template, &ctx);
        if body.trim().is_empty() {
            return Err(SkipReason::NoTemplate);
        }

        let subject_template = Some(reply.subject_template.as_str())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(FALLBACK_SUBJECT_TEMPLATE);
        let mut subject = render(subject_template, &ctx);
        if subject.trim().is_empty() {
            let original = Some(email.subject_str())
                .filter(|s| !s.is_empty())
                .unwrap_or(FALLBACK_SUBJECT);
            subject = format!("Re: {}", original);
        }

        let mail = OutgoingMail {
            to: sender.clone(),
            subject,
            body,
            ..Default::default()
        };
        Ok((sender, mail))
    }
}
