//! Per-send options: async/priority/scheduling knobs, retry policy, and
//! the hook/callback extension points.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::classifier;
use crate::error::{CoreError, Result};
use crate::http::SendResult;

/// The retry filter type: return `Some(true/false)` to decide retryability
/// for a given error, `None` to abstain. Takes `&dyn Error` rather than
/// `&CoreError` so callers in `dispatch-pipeline` can filter on their own
/// error types too.
pub type RetryFilter = Arc<dyn Fn(&(dyn std::error::Error + 'static)) -> Option<bool> + Send + Sync>;

/// The default `Filter`: no explicit allow-list configured, so it defers
/// straight to the keyword classifier.
pub fn default_filter(err: &(dyn std::error::Error + 'static)) -> Option<bool> {
    Some(classifier::classify(&err.to_string()))
}

/// Backoff policy for provider-level retries. See `dispatch-pipeline` for
/// the `ShouldRetry`/`NextDelay` algorithm that consumes this shape.
///
/// A `filter` of `None` is a hard opt-out: `ShouldRetry` returns `false`
/// unconditionally, regardless of what the classifier would otherwise say.
/// The classifier-backed behavior lives *inside* the non-`None` default
/// filter, matching the documented contract for a nil/`None` `Filter`.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub filter: Option<RetryFilter>,
}

impl Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("filter", &self.filter.as_ref().map(|_| "Some"))
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            filter: Some(Arc::new(default_filter)),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.backoff_factor <= 0.0 {
            return Err(CoreError::invalid_config("backoff_factor must be > 0"));
        }
        if self.initial_delay > self.max_delay {
            return Err(CoreError::invalid_config("initial_delay must be <= max_delay"));
        }
        Ok(())
    }
}

/// Runs before the transformer builds the outgoing request: may mutate the
/// per-send context (route override, metadata) and may abort the send by
/// returning `Err`.
pub type BeforeHook = Arc<dyn Fn(&mut crate::context::DispatchContext) -> Result<()> + Send + Sync>;

/// Runs unconditionally with the final outcome, success or failure. The
/// error side is a formatted message rather than `SendResult`'s sibling
/// error type, mirroring [`Callback`] below, since that error type lives in
/// a crate this one can't depend on without a cycle.
pub type AfterHook = Arc<dyn Fn(std::result::Result<&SendResult, &str>) + Send + Sync>;

/// Invoked once a queued send settles, success or failure. The error side
/// is a formatted message rather than a concrete error type, since the
/// decorator that fires callbacks lives in a crate whose error type this
/// one can't depend on without a cycle.
pub type Callback = Arc<dyn Fn(&str, std::result::Result<&SendResult, String>) + Send + Sync>;

/// Per-send overrides threaded through `Sender::send`.
#[derive(Clone, Default)]
pub struct SendOptions {
    pub r#async: bool,
    pub priority: i32,
    pub delay_until: Option<DateTime<Utc>>,
    pub timeout: Option<Duration>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub account_name: Option<String>,
    pub strategy_name: Option<String>,
    pub disable_circuit_breaker: bool,
    pub disable_rate_limiter: bool,
    pub callback: Option<Callback>,
    pub retry_policy: Option<RetryPolicy>,
    pub before_hooks: Vec<BeforeHook>,
    pub after_hooks: Vec<AfterHook>,
}

impl Debug for SendOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendOptions")
            .field("async", &self.r#async)
            .field("priority", &self.priority)
            .field("delay_until", &self.delay_until)
            .field("timeout", &self.timeout)
            .field("metadata", &self.metadata)
            .field("account_name", &self.account_name)
            .field("strategy_name", &self.strategy_name)
            .field("disable_circuit_breaker", &self.disable_circuit_breaker)
            .field("disable_rate_limiter", &self.disable_rate_limiter)
            .field("has_callback", &self.callback.is_some())
            .field("retry_policy", &self.retry_policy.as_ref().map(|_| "Some"))
            .field("before_hooks", &self.before_hooks.len())
            .field("after_hooks", &self.after_hooks.len())
            .finish()
    }
}

impl SendOptions {
    pub fn validate(&self) -> Result<()> {
        if self.priority < 0 {
            return Err(CoreError::invalid_config("priority must be >= 0"));
        }
        if let Some(policy) = &self.retry_policy {
            policy.validate()?;
        }
        Ok(())
    }

    /// The key under which a scalar-only snapshot of these options is
    /// stashed in queue item metadata, so a persisted/re-enqueued item
    /// can reconstruct the non-function-valued fields. Hooks, the
    /// callback, and the retry filter are intentionally excluded — they
    /// carry closures that cannot round-trip through JSON.
    pub const METADATA_KEY: &'static str = "__dispatchkit_send_options";

    /// Build the serializable subset of these options.
    pub fn to_snapshot(&self) -> SendOptionsSnapshot {
        SendOptionsSnapshot {
            r#async: self.r#async,
            priority: self.priority,
            delay_until: self.delay_until,
            timeout_ms: self.timeout.map(|d| d.as_millis() as u64),
            account_name: self.account_name.clone(),
            strategy_name: self.strategy_name.clone(),
            disable_circuit_breaker: self.disable_circuit_breaker,
            disable_rate_limiter: self.disable_rate_limiter,
        }
    }

    /// Embed [`to_snapshot`] into `metadata` under [`Self::METADATA_KEY`].
    pub fn stash_snapshot(&mut self) {
        if let Ok(value) = serde_json::to_value(self.to_snapshot()) {
            self.metadata.insert(Self::METADATA_KEY.to_string(), value);
        }
    }
}

/// Scalar-only, JSON-roundtrippable subset of [`SendOptions`].
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SendOptionsSnapshot {
    pub r#async: bool,
    pub priority: i32,
    pub delay_until: Option<DateTime<Utc>>,
    pub timeout_ms: Option<u64>,
    pub account_name: Option<String>,
    pub strategy_name: Option<String>,
    pub disable_circuit_breaker: bool,
    pub disable_rate_limiter: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_rejects_non_positive_backoff_factor() {
        let policy = RetryPolicy { backoff_factor: 0.0, ..Default::default() };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn retry_policy_rejects_initial_greater_than_max_delay() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn send_options_rejects_negative_priority() {
        let opts = SendOptions { priority: -1, ..Default::default() };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn default_filter_defers_to_the_keyword_classifier() {
        let refused = std::io::Error::new(std::io::ErrorKind::Other, "connection refused");
        let unmarshal = std::io::Error::new(std::io::ErrorKind::Other, "invalid character in json");
        assert_eq!(default_filter(&refused), Some(true));
        assert_eq!(default_filter(&unmarshal), Some(false));
    }

    #[test]
    fn snapshot_excludes_hooks_and_round_trips_scalars() {
        let mut opts = SendOptions {
            r#async: true,
            priority: 5,
            account_name: Some("primary".to_string()),
            ..Default::default()
        };
        opts.stash_snapshot();
        let raw = opts.metadata.get(SendOptions::METADATA_KEY).unwrap();
        let snapshot: SendOptionsSnapshot = serde_json::from_value(raw.clone()).unwrap();
        assert!(snapshot.r#async);
        assert_eq!(snapshot.priority, 5);
        assert_eq!(snapshot.account_name.as_deref(), Some("primary"));
    }
}
