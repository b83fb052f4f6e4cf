//! Keyword-based error classification shared by `RetryPolicy`'s own default
//! filter. Lives here rather than in `dispatch-pipeline` so that crate's
//! classifier and this one's default can consult the same rules without
//! `RetryPolicy::default()` needing a dependency on `dispatch-pipeline`.

const NETWORK_KEYWORDS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timeout",
    "network unreachable",
    "host unreachable",
    "broken pipe",
    "no route to host",
    "dns",
];

const TIMEOUT_KEYWORDS: &[&str] = &["timeout", "deadline exceeded"];

const OS_ERRNO_KEYWORDS: &[&str] =
    &["econnrefused", "econnreset", "ehostunreach", "enetunreach"];

const CANCELLATION_KEYWORDS: &[&str] = &["context canceled", "context cancelled", "operation cancelled"];

const TYPE_CONVERSION_KEYWORDS: &[&str] =
    &["type assertion failed", "interface conversion", "cannot convert"];

const JSON_KEYWORDS: &[&str] =
    &["invalid character", "unexpected end of json", "cannot unmarshal", "cannot marshal"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// Keyword/type-based retryability classification. Precedence order is
/// significant — first match wins.
pub fn classify(message: &str) -> bool {
    if contains_any(message, CANCELLATION_KEYWORDS) {
        return false;
    }
    if contains_any(message, NETWORK_KEYWORDS) {
        return true;
    }
    if contains_any(message, TIMEOUT_KEYWORDS) {
        return true;
    }
    if contains_any(message, OS_ERRNO_KEYWORDS) {
        return true;
    }
    if is_5xx_status_in_text(message) {
        return true;
    }
    if contains_any(message, TYPE_CONVERSION_KEYWORDS) {
        return false;
    }
    if contains_any(message, JSON_KEYWORDS) {
        return false;
    }
    false
}

pub fn is_5xx_status_in_text(message: &str) -> bool {
    message
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| s.len() == 3)
        .any(|s| matches!(s.as_bytes()[0], b'5') && s.parse::<u16>().is_ok_and(|n| (500..600).contains(&n)))
}
