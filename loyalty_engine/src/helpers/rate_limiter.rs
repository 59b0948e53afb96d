use std::{num::NonZeroU32, sync::Arc};

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota,
    RateLimiter as GovernorLimiter,
};

/// A process-wide limiter on outbound requests.
///
/// Permits are released at a steady rate of `rate` per second, with no burst allowance, so no one-second window ever
/// sees more than `rate` permits. Clones share the same budget.
#[derive(Clone)]
pub struct RateLimiter {
    rate: NonZeroU32,
    limiter: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    /// Creates a new limiter that hands out `rate` permits per second. A rate of zero is treated as one.
    pub fn new(rate: u32) -> Self {
        let rate = NonZeroU32::new(rate).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rate).allow_burst(NonZeroU32::MIN);
        Self { rate, limiter: Arc::new(GovernorLimiter::direct(quota)) }
    }

    pub fn rate(&self) -> u32 {
        self.rate.get()
    }

    /// Waits until a permit is available, and takes it. Callers are served in the order that permits fall due, so
    /// nobody starves. Dropping the future gives up the place in line without consuming a permit.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await
    }

    /// Takes a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RateLimiter({}/s)", self.rate)
    }
}
