//! Helpers for keeping email addresses out of log lines and span fields.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::email::extract_email_address;

/// Masks the local part of an address, keeping its first character and
/// the domain.
///
/// - `Ana <ana.garcia@example.com>` → `a***@example.com`
/// - `not-an-address` → `****`
pub fn redact_address(raw: &str) -> String {
    let address = extract_email_address(raw);
    match address.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let first = local.chars().next().unwrap_or('*');
            format!("{}***@{}", first, domain)
        }
        _ => "****".to_string(),
    }
}

/// Returns a short deterministic hash of a normalized address, for
/// correlating log lines without exposing the address.
pub fn hash_address(raw: &str) -> String {
    let mut hasher = DefaultHasher::new();
    extract_email_address(raw).hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
