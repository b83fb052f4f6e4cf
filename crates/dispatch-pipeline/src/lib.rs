//! Selection strategies, the reliability middleware pipeline, the HTTP
//! provider shell, and the sender facade.

pub mod circuit_breaker;
pub mod classifier;
pub mod decorator;
pub mod error;
pub mod evaluator;
pub mod provider;
pub mod rate_limiter;
pub mod retry;
pub mod selection;
pub mod sender;
pub mod strategy;
pub mod transformer;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use decorator::{ProviderDecorator, SenderMiddleware};
pub use error::{DispatchError, Result};
pub use evaluator::{EvalBodyType, Mode, ResponseEvaluatorConfig};
pub use provider::{Provider, ProviderSendOptions, SharedProvider};
pub use rate_limiter::RateLimiter;
pub use sender::Sender;
pub use strategy::{Selectable, Strategy};
pub use transformer::{HttpProviderShell, Transformer};
