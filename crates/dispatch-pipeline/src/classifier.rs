//! Error classifier: decides retryability for an opaque error, independent
//! of the retry policy's own `Filter` override. The keyword rules
//! themselves live in `dispatch_core::classifier` so that crate's
//! `RetryPolicy::default()` can consult them without depending on this one.

pub use dispatch_core::classifier::classify;

/// Implemented by error types that know their own retryability, taking
/// precedence over the keyword-based classifier below.
pub trait IsRetryable {
    fn is_retryable(&self) -> Option<bool>;
}

impl IsRetryable for dispatch_core::CoreError {
    fn is_retryable(&self) -> Option<bool> {
        use dispatch_core::CoreError::*;
        match self {
            Validation { .. } | Cancelled { .. } | CircuitBreaker { .. } | RateLimit { .. } => {
                Some(false)
            }
            Timeout { .. } => Some(true),
            _ => None,
        }
    }
}

/// Classify any error: consult [`IsRetryable`] first (via the `CoreError`
/// impl, or any caller-supplied predicate), then fall back to keyword
/// matching over its `Display` text.
pub fn is_retryable(err: &dyn std::error::Error) -> bool {
    if let Some(core) = err.downcast_ref::<dispatch_core::CoreError>() {
        if let Some(explicit) = core.is_retryable() {
            return explicit;
        }
    }
    classify(&err.to_string())
}
