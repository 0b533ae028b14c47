//! Email shapes exchanged with the surrounding application, and the mailer
//! capability it injects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SendError;

/// An email handed to `process_incoming_emails`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingEmail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// A classification attached upstream (e.g. by the mail backend).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_classification: Option<PrecomputedClassification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_folder: Option<String>,
}

impl IncomingEmail {
    pub fn subject_str(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }

    pub fn body_str(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

/// Classification data that may already travel with an incoming email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecomputedClassification {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// An outgoing message passed to the [`Mailer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Send capability supplied by the caller. Expected to fail on any
/// delivery problem; timeouts are the implementation's concern.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), SendError>;
}

/// Extracts the bare, lowercased address from `"Name <addr>"` or `addr`.
pub fn extract_email_address(raw: &str) -> String {
    let address = angle_bracketed(raw).unwrap_or(raw);
    address.trim().to_lowercase()
}

/// Returns the display name of a sender.
///
/// Uses the name part of `"Name <addr>"` when present, otherwise the local
/// part of the address with `.` and `_` turned into spaces.
pub fn extract_sender_name(raw: &str) -> String {
    if let Some(open) = raw.find('<') {
        let name = raw[..open].trim().trim_matches('"').trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }

    let address = extract_email_address(raw);
    address
        .split('@')
        .next()
        .unwrap_or("")
        .replace(['.', '_'], " ")
        .trim()
        .to_string()
}

fn angle_bracketed(raw: &str) -> Option<&str> {
    let open = raw.find('<')?;
    let rest = &raw[open + 1..];
    let close = rest.find('>')?;
    (close > 0).then(|| &rest[..close])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_address_from_display_form() {
        assert_eq!(
            extract_email_address("Ana García <Ana.Garcia@Example.COM>"),
            "ana.garcia@example.com"
        );
    }

    #[test]
    fn test_extract_address_bare() {
        assert_eq!(extract_email_address("  Guest@Mail.com "), "guest@mail.com");
        assert_eq!(extract_email_address(""), "");
    }

    #[test]
    fn test_extract_sender_name_display_form() {
        assert_eq!(extract_sender_name("Ana García <ana@example.com>"), "Ana García");
        assert_eq!(
            extract_sender_name("\"Floristería Rosa\" <info@rosa.es>"),
            "Floristería Rosa"
        );
    }

    #[test]
    fn test_extract_sender_name_from_local_part() {
        assert_eq!(extract_sender_name("john.doe@example.com"), "john doe");
        assert_eq!(extract_sender_name("<maria_lopez@example.com>"), "maria lopez");
    }

    #[test]
    fn test_outgoing_mail_omits_empty_attachments() {
        let mail = OutgoingMail {
            to: "a@b.com".into(),
            subject: "Hola".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&mail).unwrap();
        assert!(json.get("attachments").is_none());
        assert!(json.get("cc").is_none());
    }
}
