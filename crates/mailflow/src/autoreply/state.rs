//! Persisted auto-reply bookkeeping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{ClassificationResult, ClassificationSource};

pub const MAX_HISTORY_ENTRIES: usize = 50;
pub const MAX_SENDER_ENTRIES: usize = 200;
pub const MAX_MAIL_ENTRIES: usize = 500;
const MAX_HISTORY_TAGS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationState {
    /// Last reply per normalized sender address.
    #[serde(default)]
    pub last_auto_reply_by_sender: BTreeMap<String, SenderReply>,
    /// Replies keyed by the message they answered.
    #[serde(default)]
    pub auto_replies_by_mail: BTreeMap<String, MailReply>,
    /// Newest first.
    #[serde(default)]
    pub history: Vec<AutoReplyRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderReply {
    pub mail_id: String,
    pub replied_at: DateTime<Utc>,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailReply {
    pub sender: String,
    pub replied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoReplyRecord {
    pub mail_id: String,
    pub sender: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub replied_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<ReplyClassification>,
}

/// Classification summary stored alongside a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyClassification {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub source: Option<ClassificationSource>,
}

impl From<&ClassificationResult> for ReplyClassification {
    fn from(result: &ClassificationResult) -> Self {
        Self {
            tags: result.tags.iter().take(MAX_HISTORY_TAGS).cloned().collect(),
            folder: result.folder.clone(),
            source: Some(result.source),
        }
    }
}

impl AutomationState {
    pub fn has_replied_to(&self, message_key: &str) -> bool {
        self.auto_replies_by_mail.contains_key(message_key)
    }

    pub fn last_reply_to(&self, sender: &str) -> Option<DateTime<Utc>> {
        self.last_auto_reply_by_sender
            .get(sender)
            .map(|entry| entry.replied_at)
    }

    /// Records a successful reply in both maps and at the head of the
    /// history.
    pub fn record_reply(
        &mut self,
        message_key: &str,
        sender: &str,
        subject: Option<&str>,
        classification: Option<&ClassificationResult>,
        replied_at: DateTime<Utc>,
    ) {
        let subject = subject.filter(|s| !s.is_empty()).map(str::to_string);

        self.auto_replies_by_mail.insert(
            message_key.to_string(),
            MailReply {
                sender: sender.to_string(),
                replied_at,
            },
        );
        self.last_auto_reply_by_sender.insert(
            sender.to_string(),
            SenderReply {
                mail_id: message_key.to_string(),
                replied_at,
                subject: subject.clone(),
            },
        );
        self.history.insert(
            0,
            AutoReplyRecord {
                mail_id: message_key.to_string(),
                sender: sender.to_string(),
                subject,
                replied_at,
                classification: classification.map(ReplyClassification::from),
            },
        );
        self.history.truncate(MAX_HISTORY_ENTRIES);
    }

    /// Bounds the maps to their most recent entries and the history to its
    /// cap.
    pub fn prune(&mut self) {
        prune_by_date(&mut self.last_auto_reply_by_sender, MAX_SENDER_ENTRIES, |e| {
            e.replied_at
        });
        prune_by_date(&mut self.auto_replies_by_mail, MAX_MAIL_ENTRIES, |e| {
            e.replied_at
        });
        self.history.truncate(MAX_HISTORY_ENTRIES);
    }
}

fn prune_by_date<V, F>(map: &mut BTreeMap<String, V>, limit: usize, replied_at: F)
where
    F: Fn(&V) -> DateTime<Utc>,
{
    if map.len() <= limit {
        return;
    }

    let mut by_date: Vec<(DateTime<Utc>, String)> = map
        .iter()
        .map(|(key, value)| (replied_at(value), key.clone()))
        .collect();
    by_date.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, key) in by_date.into_iter().skip(limit) {
        map.remove(&key);
    }
}
