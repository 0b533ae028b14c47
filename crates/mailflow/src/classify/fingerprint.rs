use crate::email::IncomingEmail;

/// Cache key for an email: its id when present, else a hash of
/// subject, date and lowercased sender.
pub fn fingerprint(email: &IncomingEmail) -> String {
    if let Some(id) = email.id.as_deref().filter(|id| !id.is_empty()) {
        return format!("id:{}", id);
    }

    let composite = format!(
        "{}::{}::{}",
        email.subject.as_deref().unwrap_or(""),
        email.date.as_deref().unwrap_or(""),
        email.from.as_deref().unwrap_or("").to_lowercase()
    );
    format!("hash:{}", rolling_hash(&composite))
}

/// 32-bit signed multiply-by-31 hash over UTF-16 code units.
pub fn rolling_hash(value: &str) -> i32 {
    value
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}
