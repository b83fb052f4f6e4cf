//! Token-bucket rate limiting via `governor`.

use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorLimiter};

/// A non-blocking rate limiter gate. `allow()` never waits; refusal is the
/// caller's signal to fail the send with `rate-limit-exceeded`.
pub struct RateLimiter {
    inner: GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RateLimiter {
    pub fn per_minute(n: u32) -> Self {
        Self { inner: GovernorLimiter::direct(Quota::per_minute(nonzero(n))) }
    }

    pub fn per_second(n: u32) -> Self {
        Self { inner: GovernorLimiter::direct(Quota::per_second(nonzero(n))) }
    }

    /// Non-blocking check: `true` if a token was available and consumed.
    pub fn allow(&self) -> bool {
        self.inner.check().is_ok()
    }
}

fn nonzero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::new(1).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_once_the_quota_is_exhausted() {
        let limiter = RateLimiter::per_second(1);
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }
}
