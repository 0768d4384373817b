//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Default admin API rate limit
pub const ADMIN_RATE_LIMIT: u32 = 20; // Max 20 admin requests per second

/// Global limiter shared by every admin request
#[derive(Clone)]
pub struct AdminRateLimiter {
    limiter: Arc<Limiter>,
}

impl AdminRateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            limiter: create_limiter(requests_per_second),
        }
    }

    /// Check if a request is allowed (returns true if allowed)
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for AdminRateLimiter {
    fn default() -> Self {
        Self::new(ADMIN_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_burst_over_quota() {
        let limiter = AdminRateLimiter::new(3);
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());
    }

    #[test]
    fn zero_quota_still_admits_one() {
        let limiter = AdminRateLimiter::new(0);
        assert!(limiter.check());
    }
}
