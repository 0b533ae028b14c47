//! Builders for test emails and configs.

#![allow(dead_code)]

use mailflow::{AutomationConfig, IncomingEmail, OutgoingMail};

/// Builder for creating `IncomingEmail` instances.
pub struct EmailBuilder {
    email: IncomingEmail,
}

impl EmailBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            email: IncomingEmail {
                id: Some(id.to_string()),
                ..Default::default()
            },
        }
    }

    /// An email without an id, keyed by its content hash.
    pub fn anonymous() -> Self {
        Self {
            email: IncomingEmail::default(),
        }
    }

    pub fn from(mut self, from: &str) -> Self {
        self.email.from = Some(from.to_string());
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.email.subject = Some(subject.to_string());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.email.body = Some(body.to_string());
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.email.date = Some(date.to_string());
        self
    }

    pub fn build(self) -> IncomingEmail {
        self.email
    }
}

/// Default config with auto-reply switched on.
pub fn auto_reply_config() -> AutomationConfig {
    let mut config = AutomationConfig::default();
    config.auto_reply.enabled = true;
    config
}

pub fn outgoing(to: &str, subject: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: subject.to_string(),
        body: "Mensaje programado".to_string(),
        ..Default::default()
    }
}
