//! Structured error taxonomy.
//!
//! Every error the pipeline returns carries a stable numeric `code` in
//! addition to its `thiserror` message, so a caller debugging across process
//! or language boundaries can key off the code alone. Ranges:
//! 1xxx invalid-config, 2xxx provider, 3xxx queue, 4xxx retry,
//! 5xxx circuit-breaker, 6xxx rate-limit, 7xxx metrics, 9xxx general.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid config: {message}")]
    InvalidConfig { code: u16, message: String },

    #[error("provider error: {message}")]
    Provider { code: u16, message: String },

    #[error("queue error: {message}")]
    Queue { code: u16, message: String },

    #[error("retry exhausted: {message}")]
    Retry { code: u16, message: String },

    #[error("circuit breaker: {message}")]
    CircuitBreaker { code: u16, message: String },

    #[error("rate limited: {message}")]
    RateLimit { code: u16, message: String },

    #[error("validation failed: {message}")]
    Validation { code: u16, message: String },

    #[error("context cancelled: {message}")]
    Cancelled { code: u16, message: String },

    #[error("timeout: {message}")]
    Timeout { code: u16, message: String },

    #[error("internal error: {message}")]
    Internal { code: u16, message: String },
}

impl CoreError {
    pub fn code(&self) -> u16 {
        match self {
            CoreError::InvalidConfig { code, .. }
            | CoreError::Provider { code, .. }
            | CoreError::Queue { code, .. }
            | CoreError::Retry { code, .. }
            | CoreError::CircuitBreaker { code, .. }
            | CoreError::RateLimit { code, .. }
            | CoreError::Validation { code, .. }
            | CoreError::Cancelled { code, .. }
            | CoreError::Timeout { code, .. }
            | CoreError::Internal { code, .. } => *code,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        CoreError::InvalidConfig { code: 1000, message: message.into() }
    }

    pub fn no_strategy(message: impl Into<String>) -> Self {
        CoreError::InvalidConfig { code: 1001, message: message.into() }
    }

    pub fn provider_not_configured(channel: &str) -> Self {
        CoreError::Provider { code: 2000, message: format!("provider not configured for channel: {channel}") }
    }

    pub fn no_available_account(message: impl Into<String>) -> Self {
        CoreError::Provider { code: 2001, message: message.into() }
    }

    pub fn item_disabled(message: impl Into<String>) -> Self {
        CoreError::Provider { code: 2002, message: message.into() }
    }

    pub fn item_not_found(message: impl Into<String>) -> Self {
        CoreError::Provider { code: 2003, message: message.into() }
    }

    pub fn queue_full() -> Self {
        CoreError::Queue { code: 3000, message: "queue is full".to_string() }
    }

    pub fn queue_closed() -> Self {
        CoreError::Queue { code: 3001, message: "queue is closed".to_string() }
    }

    pub fn retry_exhausted(attempts: u32, cause: impl std::fmt::Display) -> Self {
        CoreError::Retry { code: 4000, message: format!("failed after {attempts} attempts: {cause}") }
    }

    pub fn circuit_open(message: impl Into<String>) -> Self {
        CoreError::CircuitBreaker { code: 5000, message: message.into() }
    }

    pub fn rate_limit_exceeded() -> Self {
        CoreError::RateLimit { code: 6000, message: "rate limit exceeded".to_string() }
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        CoreError::Validation { code: 9001, message: message.into() }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        CoreError::Cancelled { code: 9002, message: message.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        CoreError::Timeout { code: 9003, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal { code: 9000, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
