//! `[Placeholder]` substitution for reply templates.

use chrono::{DateTime, Utc};

/// Values available to a reply template.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub name: String,
    pub category: String,
    pub subject: String,
    pub date: String,
}

impl TemplateContext {
    fn value_for(&self, token: &str) -> Option<&str> {
        match token.trim().to_lowercase().as_str() {
            "nombre" | "name" => Some(&self.name),
            "categoria" | "categoría" | "category" => Some(&self.category),
            "asunto" | "subject" => Some(&self.subject),
            "fecha" | "date" => Some(&self.date),
            _ => None,
        }
    }
}

/// Formats a date as `d/m/yyyy`.
pub fn format_reply_date(at: DateTime<Utc>) -> String {
    at.format("%-d/%-m/%Y").to_string()
}

/// Replaces known placeholders (case-insensitive); unknown bracketed text
/// is left as is.
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find(']') else {
            out.push_str(&rest[open..]);
            return out;
        };

        match ctx.value_for(&after[..close]) {
            Some(value) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('[');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
