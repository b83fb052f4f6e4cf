//! `ShouldRetry`/`NextDelay` — the retry-policy algorithm consuming
//! `dispatch_core::RetryPolicy`'s shape.

use std::time::Duration;

use dispatch_core::RetryPolicy;
use rand::Rng;

/// `attempt` is 0-indexed. Returns `false` once `attempt >= MaxAttempts`, or
/// unconditionally if `policy.filter` is `None` — a `None` filter is a hard
/// opt-out, not a request to fall back to the classifier. Otherwise
/// delegates fully to the filter; a filter that itself returns `None` (no
/// opinion) is treated as not retryable.
pub fn should_retry(policy: &RetryPolicy, attempt: u32, err: &(dyn std::error::Error + 'static)) -> bool {
    if attempt >= policy.max_attempts {
        return false;
    }
    match &policy.filter {
        Some(filter) => filter(err).unwrap_or(false),
        None => false,
    }
}

/// Full-jitter exponential backoff: `base = InitialDelay * BackoffFactor^attempt`,
/// capped at `MaxDelay`, then a uniform sample in `[0, base]`.
pub fn next_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base_secs = policy.initial_delay.as_secs_f64() * policy.backoff_factor.powi(attempt as i32);
    let capped = base_secs.min(policy.max_delay.as_secs_f64()).max(0.0);
    let jittered = if capped > 0.0 { rand::rng().random_range(0.0..=capped) } else { 0.0 };
    Duration::from_secs_f64(jittered)
}

/// The equal-jitter alternative (`base/2 + uniform(0, base/2)`), documented
/// in the spec as an acceptable variant but not the default.
pub fn next_delay_equal_jitter(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base_secs = policy.initial_delay.as_secs_f64() * policy.backoff_factor.powi(attempt as i32);
    let capped = base_secs.min(policy.max_delay.as_secs_f64()).max(0.0);
    let half = capped / 2.0;
    let jitter = if half > 0.0 { rand::rng().random_range(0.0..=half) } else { 0.0 };
    Duration::from_secs_f64(half + jitter)
}
