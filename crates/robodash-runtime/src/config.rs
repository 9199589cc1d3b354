//! Runtime settings of the dashboard loop.

use std::time::Duration;

/// Default bound on a single remote write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default period of synthetic distance readings in demo mode.
pub const DEFAULT_DEMO_INTERVAL: Duration = Duration::from_secs(2);

/// Default steering-wheel animation frame period (~30 fps).
pub const DEFAULT_ANIMATION_INTERVAL: Duration = Duration::from_millis(33);

/// Bounded exponential backoff for session establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total sign-in attempts, including the first one.
    pub attempts: u32,
    /// Delay after the first failure; doubled after each further failure.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Doubling exponent cap (base × 16).
    const MAX_EXPONENT: u32 = 4;

    /// A single attempt, no retry.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(Self::MAX_EXPONENT);
        self.base_delay.saturating_mul(2u32.pow(exponent))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Configuration bundle for [`Dashboard`][crate::dashboard::Dashboard].
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Run against the synthetic data generator instead of a remote store.
    pub demo: bool,
    pub write_timeout: Duration,
    pub session_retry: RetryPolicy,
    pub demo_interval: Duration,
    /// `None` disables the steering-wheel animation ticker.
    pub animation_interval: Option<Duration>,
    /// Fixed seed for the demo generator; random when `None`.
    pub demo_seed: Option<u64>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            demo: false,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            session_retry: RetryPolicy::default(),
            demo_interval: DEFAULT_DEMO_INTERVAL,
            animation_interval: Some(DEFAULT_ANIMATION_INTERVAL),
            demo_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles_then_caps() {
        let policy = RetryPolicy {
            attempts: 10,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(5), Duration::from_millis(1600));
        assert_eq!(policy.delay_after(9), Duration::from_millis(1600));
    }

    #[test]
    fn once_never_waits() {
        assert_eq!(RetryPolicy::once().attempts, 1);
        assert_eq!(RetryPolicy::once().delay_after(1), Duration::ZERO);
    }
}
