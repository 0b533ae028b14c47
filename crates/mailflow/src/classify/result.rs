use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    Ai,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Tags in detection order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Suggested mailbox.
    #[serde(default)]
    pub folder: Option<String>,
    pub source: ClassificationSource,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ClassificationResult {
    pub fn has_signal(&self) -> bool {
        !self.tags.is_empty() || self.folder.is_some()
    }

    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        self.created_at > 0 && now_ms - self.created_at < ttl_ms
    }
}

/// Clamps a confidence value to `[0, 1]`; NaN is dropped.
pub fn clamp_confidence(value: Option<f32>) -> Option<f32> {
    value.filter(|v| !v.is_nan()).map(|v| v.clamp(0.0, 1.0))
}

/// Trims tags, drops empties and duplicates, keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

pub fn normalize_folder(folder: Option<&str>) -> Option<String> {
    folder
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
}
