//! Per-provider circuit breaker, generalized from the teacher's
//! per-endpoint breaker: a sliding window of recent outcomes guarded by a
//! lock, `Open`/`HalfOpen`/`Closed` states, and a lazily-populated registry
//! keyed by provider name.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures within the last `window_size` results that trip the breaker.
    pub failure_threshold: usize,
    pub window_size: usize,
    /// How long the breaker stays open before allowing a half-open probe.
    pub open_duration: Duration,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, window_size: 10, open_duration: Duration::from_secs(30), half_open_max_calls: 1 }
    }
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<State>,
    opened_at: RwLock<Option<Instant>>,
    recent_results: Mutex<VecDeque<bool>>,
    half_open_calls: Mutex<u32>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::Closed),
            opened_at: RwLock::new(None),
            recent_results: Mutex::new(VecDeque::new()),
            half_open_calls: Mutex::new(0),
        }
    }

    pub fn is_open(&self) -> bool {
        *self.state.read() == State::Open
    }

    /// Run `f` behind the breaker. If the breaker is open and its cooldown
    /// hasn't elapsed, returns `circuit_open` without invoking `f`.
    pub async fn execute<F, Fut, T>(&self, f: F) -> Result<T, DispatchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
    {
        self.before_call()?;
        let result = f().await;
        self.record(result.is_ok());
        result
    }

    fn before_call(&self) -> Result<(), DispatchError> {
        let mut state = self.state.write();
        match *state {
            State::Open => {
                let elapsed = self.opened_at.read().map(|t| t.elapsed() >= self.config.open_duration).unwrap_or(false);
                if elapsed {
                    *state = State::HalfOpen;
                    *self.half_open_calls.lock() = 0;
                    Ok(())
                } else {
                    Err(DispatchError::circuit_open("circuit is open"))
                }
            }
            State::HalfOpen => {
                let mut calls = self.half_open_calls.lock();
                if *calls >= self.config.half_open_max_calls {
                    Err(DispatchError::circuit_open("half-open probe limit reached"))
                } else {
                    *calls += 1;
                    Ok(())
                }
            }
            State::Closed => Ok(()),
        }
    }

    fn record(&self, success: bool) {
        let mut recent = self.recent_results.lock();
        recent.push_back(success);
        while recent.len() > self.config.window_size {
            recent.pop_front();
        }
        let failures = recent.iter().filter(|ok| !**ok).count();

        let mut state = self.state.write();
        match *state {
            State::HalfOpen => {
                if success {
                    *state = State::Closed;
                    recent.clear();
                } else {
                    *state = State::Open;
                    *self.opened_at.write() = Some(Instant::now());
                }
            }
            State::Closed => {
                if failures >= self.config.failure_threshold {
                    *state = State::Open;
                    *self.opened_at.write() = Some(Instant::now());
                }
            }
            State::Open => {}
        }
    }
}

type Registry = RwLock<HashMap<String, Arc<CircuitBreaker>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Lazily create (or fetch) the breaker for `provider_name`, matching the
/// teacher's `CircuitBreakerRegistry::get_or_create` pattern.
pub fn get_or_create(provider_name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
    if let Some(existing) = registry().read().get(provider_name) {
        return existing.clone();
    }
    let mut write = registry().write();
    write.entry(provider_name.to_string()).or_insert_with(|| Arc::new(CircuitBreaker::new(config))).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok() -> Result<(), DispatchError> {
        Ok(())
    }

    async fn fail() -> Result<(), DispatchError> {
        Err(DispatchError::internal("boom"))
    }

    #[tokio::test]
    async fn opens_after_threshold_failures_and_rejects_without_calling() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig { failure_threshold: 2, window_size: 5, ..Default::default() });
        assert!(breaker.execute(fail).await.is_err());
        assert!(breaker.execute(fail).await.is_err());
        assert!(breaker.is_open());

        let err = breaker.execute(ok).await.unwrap_err();
        assert!(matches!(err, DispatchError::CircuitOpen { .. }));
    }

    #[tokio::test]
    async fn half_open_success_closes_the_breaker() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            window_size: 5,
            open_duration: Duration::from_millis(10),
            half_open_max_calls: 1,
        });
        assert!(breaker.execute(fail).await.is_err());
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(breaker.execute(ok).await.is_ok());
        assert!(!breaker.is_open());
    }

    #[test]
    fn registry_returns_the_same_instance_for_a_repeated_name() {
        let a = get_or_create("test-provider-xyz", CircuitBreakerConfig::default());
        let b = get_or_create("test-provider-xyz", CircuitBreakerConfig::default());
        assert!(Arc::ptr_eq(&a, &b));
    }
}
