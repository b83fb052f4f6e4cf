//! Pipeline-level error taxonomy: selection, retry, circuit-breaker, and
//! rate-limit failures that don't belong to `dispatch_core` or
//! `dispatch_queue`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid config: {message}")]
    InvalidConfig { code: u16, message: String },

    #[error("no available account after filtering")]
    NoAvailableAccount { code: u16 },

    #[error("selected item is disabled")]
    ItemDisabled { code: u16 },

    #[error("no strategy specified or unknown strategy: {name}")]
    UnknownStrategy { code: u16, name: String },

    #[error("failed after {attempts} attempts: {cause}")]
    RetryExhausted { code: u16, attempts: u32, cause: String },

    #[error("circuit breaker open: {message}")]
    CircuitOpen { code: u16, message: String },

    #[error("rate limit exceeded")]
    RateLimitExceeded { code: u16 },

    #[error("provider not configured for channel: {channel}")]
    ProviderNotConfigured { code: u16, channel: String },

    #[error("message type not supported by this provider (channel: {channel})")]
    UnsupportedMessage { code: u16, channel: String },

    #[error("validation failed: {message}")]
    ValidationFailed { code: u16, message: String },

    #[error("cancelled: {message}")]
    Cancelled { code: u16, message: String },

    #[error("api error: {message} (code={provider_code})")]
    ApiError { code: u16, message: String, provider_code: String },

    #[error("internal error: {message}")]
    Internal { code: u16, message: String },
}

impl DispatchError {
    pub fn code(&self) -> u16 {
        match self {
            DispatchError::InvalidConfig { code, .. }
            | DispatchError::NoAvailableAccount { code }
            | DispatchError::ItemDisabled { code }
            | DispatchError::UnknownStrategy { code, .. }
            | DispatchError::RetryExhausted { code, .. }
            | DispatchError::CircuitOpen { code, .. }
            | DispatchError::RateLimitExceeded { code }
            | DispatchError::ProviderNotConfigured { code, .. }
            | DispatchError::UnsupportedMessage { code, .. }
            | DispatchError::ValidationFailed { code, .. }
            | DispatchError::Cancelled { code, .. }
            | DispatchError::ApiError { code, .. }
            | DispatchError::Internal { code, .. } => *code,
        }
    }

    pub fn no_available_account() -> Self {
        DispatchError::NoAvailableAccount { code: 2001 }
    }

    pub fn item_disabled() -> Self {
        DispatchError::ItemDisabled { code: 2002 }
    }

    pub fn unknown_strategy(name: impl Into<String>) -> Self {
        DispatchError::UnknownStrategy { code: 1001, name: name.into() }
    }

    pub fn retry_exhausted(attempts: u32, cause: impl std::fmt::Display) -> Self {
        DispatchError::RetryExhausted { code: 4000, attempts, cause: cause.to_string() }
    }

    pub fn circuit_open(message: impl Into<String>) -> Self {
        DispatchError::CircuitOpen { code: 5000, message: message.into() }
    }

    pub fn rate_limit_exceeded() -> Self {
        DispatchError::RateLimitExceeded { code: 6000 }
    }

    pub fn provider_not_configured(channel: impl Into<String>) -> Self {
        DispatchError::ProviderNotConfigured { code: 2000, channel: channel.into() }
    }

    pub fn unsupported_message(channel: impl Into<String>) -> Self {
        DispatchError::UnsupportedMessage { code: 2005, channel: channel.into() }
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        DispatchError::ValidationFailed { code: 9001, message: message.into() }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        DispatchError::Cancelled { code: 9002, message: message.into() }
    }

    /// `"api error: <msg> (code=<code>)"`, `msg` defaulting to `"unknown error"`.
    pub fn api_error(message: Option<String>, provider_code: impl Into<String>) -> Self {
        DispatchError::ApiError {
            code: 2004,
            message: message.unwrap_or_else(|| "unknown error".to_string()),
            provider_code: provider_code.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        DispatchError::Internal { code: 9000, message: message.into() }
    }

    /// Whether this error's *variant* is inherently non-retryable
    /// regardless of what the classifier would otherwise say (validation,
    /// cancellation, rate-limit and circuit-breaker refusals are never
    /// retried per spec §7's propagation policy).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchError::ValidationFailed { .. }
                | DispatchError::Cancelled { .. }
                | DispatchError::RateLimitExceeded { .. }
                | DispatchError::CircuitOpen { .. }
                | DispatchError::UnsupportedMessage { .. }
        )
    }
}

impl From<dispatch_core::CoreError> for DispatchError {
    fn from(err: dispatch_core::CoreError) -> Self {
        DispatchError::Internal { code: err.code(), message: err.to_string() }
    }
}

impl From<dispatch_queue::QueueError> for DispatchError {
    fn from(err: dispatch_queue::QueueError) -> Self {
        DispatchError::Internal { code: err.code(), message: err.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
