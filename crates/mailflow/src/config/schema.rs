use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hours between two automatic replies to the same sender.
pub const DEFAULT_REPLY_INTERVAL_HOURS: f64 = 24.0;
pub const MIN_REPLY_INTERVAL_HOURS: f64 = 1.0;
pub const MAX_REPLY_INTERVAL_HOURS: f64 = 168.0;
pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const MAX_EXCLUDED_SENDERS: usize = 100;

const DEFAULT_SUBJECT_TEMPLATE: &str = "Re: [Asunto]";

const DEFAULT_GENERAL_MESSAGE: &str = "Hola [Nombre],\n\nHemos recibido tu mensaje y nuestro equipo lo revisará en breve. Te contactaremos lo antes posible.\n\n¡Gracias por escribirnos!";

/// Built-in per-category replies, keyed by category name.
const DEFAULT_CATEGORY_MESSAGES: &[(&str, &str)] = &[
    (
        "Proveedor",
        "Hola [Nombre],\n\nGracias por tu propuesta. Estamos revisando los detalles y te responderemos en breve con la información necesaria.\n\nUn saludo,",
    ),
    (
        "Invitado",
        "Hola [Nombre],\n\n¡Gracias por tu mensaje! Hemos tomado nota y te responderemos pronto con más detalles.\n\nUn abrazo,",
    ),
    (
        "Finanzas",
        "Hola [Nombre],\n\nGracias por la información. Nuestro equipo financiero lo revisará y te contactará en cuanto tengamos novedades.\n\nSaludos,",
    ),
    (
        "Contratos",
        "Hola [Nombre],\n\nHemos recibido el contrato y nuestro equipo legal lo está revisando. Te enviaremos la respuesta en breve.\n\nSaludos,",
    ),
    (
        "Facturas",
        "Hola [Nombre],\n\nGracias por enviarnos la factura. La estamos revisando y confirmaremos el pago en cuanto sea posible.\n\nSaludos,",
    ),
    (
        "Reuniones",
        "Hola [Nombre],\n\nGracias por proponer la reunión. Revisaremos nuestra agenda y te enviaremos la confirmación muy pronto.\n\nSaludos,",
    ),
    (
        "RSVP",
        "Hola [Nombre],\n\n¡Gracias por tu confirmación! Hemos registrado tu respuesta y te mantendremos informado con las novedades.\n\nUn abrazo,",
    ),
    (
        "Urgente",
        "Hola [Nombre],\n\nHemos recibido tu mensaje y estamos priorizando la respuesta. Te contactaremos lo antes posible.\n\nSaludos,",
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationConfig {
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub auto_reply: AutoReplyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoReplyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_subject_template")]
    pub subject_template: String,
    #[serde(default = "default_general_message")]
    pub general_message: String,
    #[serde(default = "default_reply_interval_hours")]
    pub reply_interval_hours: f64,
    #[serde(default)]
    pub exclude_senders: Vec<String>,
    /// The account's own address; mail from it never gets an auto-reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_email: Option<String>,
    #[serde(default = "default_categories")]
    pub categories: BTreeMap<String, CategoryReply>,
}

fn default_subject_template() -> String {
    DEFAULT_SUBJECT_TEMPLATE.to_string()
}

fn default_general_message() -> String {
    DEFAULT_GENERAL_MESSAGE.to_string()
}

fn default_reply_interval_hours() -> f64 {
    DEFAULT_REPLY_INTERVAL_HOURS
}

fn default_categories() -> BTreeMap<String, CategoryReply> {
    DEFAULT_CATEGORY_MESSAGES
        .iter()
        .map(|(name, message)| {
            (
                name.to_string(),
                CategoryReply {
                    enabled: true,
                    message: message.to_string(),
                },
            )
        })
        .collect()
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            subject_template: default_subject_template(),
            general_message: default_general_message(),
            reply_interval_hours: DEFAULT_REPLY_INTERVAL_HOURS,
            exclude_senders: Vec::new(),
            identity_email: None,
            categories: default_categories(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            classification: ClassificationConfig::default(),
            auto_reply: AutoReplyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReply {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub message: String,
}

impl AutomationConfig {
    /// Normalizes user-supplied values before they are persisted.
    ///
    /// Messages are trimmed and truncated; blank messages fall back to the
    /// built-in text. The reply interval is clamped and the exclusion list
    /// is lowercased and deduplicated.
    pub fn sanitized(mut self) -> Self {
        let defaults = AutoReplyConfig::default();
        let reply = &mut self.auto_reply;

        reply.subject_template =
            sanitize_message(&reply.subject_template, &defaults.subject_template);
        reply.general_message = sanitize_message(&reply.general_message, &defaults.general_message);

        reply.reply_interval_hours = if reply.reply_interval_hours.is_finite() {
            reply
                .reply_interval_hours
                .clamp(MIN_REPLY_INTERVAL_HOURS, MAX_REPLY_INTERVAL_HOURS)
        } else {
            DEFAULT_REPLY_INTERVAL_HOURS
        };

        let mut seen = std::collections::HashSet::new();
        reply.exclude_senders = reply
            .exclude_senders
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .take(MAX_EXCLUDED_SENDERS)
            .collect();

        reply.identity_email = reply
            .identity_email
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        for (name, category) in reply.categories.iter_mut() {
            let fallback = defaults
                .categories
                .get(name)
                .map(|c| c.message.as_str())
                .unwrap_or("");
            category.message = sanitize_message(&category.message, fallback);
        }

        self
    }
}

fn sanitize_message(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    trimmed.chars().take(MAX_MESSAGE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AutomationConfig::default();
        assert!(config.classification.enabled);
        assert!(!config.auto_reply.enabled);
        assert_eq!(config.auto_reply.subject_template, "Re: [Asunto]");
        assert_eq!(config.auto_reply.reply_interval_hours, 24.0);
        assert_eq!(config.auto_reply.categories.len(), 8);
        assert!(config.auto_reply.categories["RSVP"].enabled);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(AutomationConfig::default()).unwrap();
        assert!(json["autoReply"]["replyIntervalHours"].is_number());
        assert!(json["autoReply"]["excludeSenders"].is_array());
        assert!(json["autoReply"].get("identityEmail").is_none());
    }

    #[test]
    fn test_sanitize_clamps_interval() {
        let mut config = AutomationConfig::default();
        config.auto_reply.reply_interval_hours = 0.1;
        assert_eq!(config.sanitized().auto_reply.reply_interval_hours, 1.0);

        let mut config = AutomationConfig::default();
        config.auto_reply.reply_interval_hours = 1000.0;
        assert_eq!(config.sanitized().auto_reply.reply_interval_hours, 168.0);

        let mut config = AutomationConfig::default();
        config.auto_reply.reply_interval_hours = f64::NAN;
        assert_eq!(config.sanitized().auto_reply.reply_interval_hours, 24.0);
    }

    #[test]
    fn test_sanitize_normalizes_exclusions() {
        let mut config = AutomationConfig::default();
        config.auto_reply.exclude_senders = vec![
            "  Boss@Example.com ".to_string(),
            "".to_string(),
            "boss@example.com".to_string(),
            "other@example.com".to_string(),
        ];
        let config = config.sanitized();
        assert_eq!(
            config.auto_reply.exclude_senders,
            vec!["boss@example.com", "other@example.com"]
        );
    }

    #[test]
    fn test_sanitize_blank_message_falls_back() {
        let mut config = AutomationConfig::default();
        config.auto_reply.general_message = "   ".to_string();
        config
            .auto_reply
            .categories
            .get_mut("Facturas")
            .unwrap()
            .message = String::new();
        let config = config.sanitized();
        assert_eq!(config.auto_reply.general_message, DEFAULT_GENERAL_MESSAGE);
        assert!(config.auto_reply.categories["Facturas"]
            .message
            .contains("factura"));
    }

    #[test]
    fn test_sanitize_truncates_long_message() {
        let mut config = AutomationConfig::default();
        config.auto_reply.general_message = "x".repeat(5000);
        let config = config.sanitized();
        assert_eq!(config.auto_reply.general_message.chars().count(), MAX_MESSAGE_CHARS);
    }
}
