use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

/// Minimum spacing between outbound explorer requests.
///
/// One instance is shared (behind an `Arc`) by every task that talks to the
/// provider, so concurrent categories draw from the same budget.
pub struct RequestCadence {
    limiter: Option<DefaultDirectRateLimiter>,
    period: Duration,
}

impl RequestCadence {
    /// A zero period disables throttling
    pub fn new(period: Duration) -> Self {
        let limiter = Quota::with_period(period)
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(RateLimiter::direct);

        Self { limiter, period }
    }

    pub fn from_millis(period_ms: u64) -> Self {
        Self::new(Duration::from_millis(period_ms))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Wait until the next request is allowed
    pub async fn until_ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for RequestCadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCadence")
            .field("period", &self.period)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
