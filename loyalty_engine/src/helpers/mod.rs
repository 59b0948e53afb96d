//! Throttling primitives shared by everything that talks to the accrual system.
mod cooldown;
mod rate_limiter;

pub use cooldown::Cooldown;
pub use rate_limiter::RateLimiter;
