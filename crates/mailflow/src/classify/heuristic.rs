//! Keyword/regex categorizer used when no external classification is
//! available.
//!
//! Rules are evaluated in a fixed priority order. Every matching rule adds
//! its tag; only the first folder-bearing match sets the folder. Auto-reply
//! template selection depends on this order, so it must not change.

use log::error;
use regex::Regex;

use super::result::{ClassificationResult, ClassificationSource};

const MATCHED_CONFIDENCE: f32 = 0.35;
const UNMATCHED_CONFIDENCE: f32 = 0.1;
const REASON: &str = "heuristic_rules";

struct HeuristicRule {
    tag: &'static str,
    folder: Option<&'static str>,
    pattern: &'static str,
}

const RULES: &[HeuristicRule] = &[
    HeuristicRule {
        tag: "RSVP",
        folder: Some("RSVP"),
        pattern: r"rsvp|confirmaci(?:ó|o)n|asistencia|save the date",
    },
    HeuristicRule {
        tag: "Invitado",
        folder: None,
        pattern: r"invitado|guest",
    },
    HeuristicRule {
        tag: "Facturas",
        folder: Some("Facturas"),
        pattern: r"factura|invoice|recibo|nota de cargo|bill",
    },
    HeuristicRule {
        tag: "Finanzas",
        folder: Some("Finanzas"),
        pattern: r"presupuesto|pago|importe|transferencia|budget|finanzas",
    },
    HeuristicRule {
        tag: "Contratos",
        folder: Some("Contratos"),
        pattern: r"contrato|legal|firma|acuerdo|anexo",
    },
    HeuristicRule {
        tag: "Reuniones",
        folder: Some("Reuniones"),
        pattern: r"reuni(?:ó|o)n|meeting|cita|llamada|videollamada",
    },
    HeuristicRule {
        tag: "Proveedor",
        folder: Some("Proveedores"),
        pattern: r"proveedor|catering|fot(?:ó|o)grafo|dj|m(?:ú|u)sica|flor|banquete|venue|servicio",
    },
    HeuristicRule {
        tag: "Invitaciones",
        folder: Some("RSVP"),
        pattern: r"invitaci(?:ó|o)n|save the date",
    },
    HeuristicRule {
        tag: "Urgente",
        folder: None,
        pattern: r"urgente|emergencia|asap|prioritario",
    },
];

pub struct HeuristicClassifier {
    /// Compiled rules, in priority order.
    rules: Vec<(&'static HeuristicRule, Regex)>,
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicClassifier {
    pub fn new() -> Self {
        let rules = RULES
            .iter()
            .filter_map(|rule| match Regex::new(rule.pattern) {
                Ok(regex) => Some((rule, regex)),
                Err(e) => {
                    error!("Invalid heuristic pattern for '{}': {}", rule.tag, e);
                    None
                }
            })
            .collect();

        Self { rules }
    }

    /// Classifies `subject` and `body`, stamping the result with `now_ms`.
    pub fn classify(&self, subject: &str, body: &str, now_ms: i64) -> ClassificationResult {
        let text = format!("{} {}", subject, body).to_lowercase();

        let mut tags: Vec<String> = Vec::new();
        let mut folder: Option<&'static str> = None;

        for (rule, regex) in &self.rules {
            if !regex.is_match(&text) {
                continue;
            }
            if !tags.iter().any(|t| t == rule.tag) {
                tags.push(rule.tag.to_string());
            }
            if folder.is_none() {
                folder = rule.folder;
            }
        }

        let confidence = if tags.is_empty() {
            UNMATCHED_CONFIDENCE
        } else {
            MATCHED_CONFIDENCE
        };

        ClassificationResult {
            tags,
            folder: folder.map(str::to_string),
            source: ClassificationSource::Heuristic,
            created_at: now_ms,
            confidence: Some(confidence),
            reason: Some(REASON.to_string()),
        }
    }
}
