//! Retry backoff policy.

use crate::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;

/// Smallest delay ever returned, so a retried job is always strictly in
/// the future.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Upper bound on any configured delay. Keeps retry times representable.
pub const MAX_BACKOFF: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Exponential backoff with random jitter.
///
/// The un-jittered delay for attempt `n` (1-based) is
/// `base * 2^(n-1)`, capped at `max`. Jitter adds a uniform random extra
/// of up to `jitter * delay`, spreading retries of jobs that failed
/// together. The jittered delay is capped at `max` too. Both `base` and
/// `max` are clamped to [`MAX_BACKOFF`].
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    jitter: f64,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.min(MAX_BACKOFF);
        Self {
            base,
            max: max.min(MAX_BACKOFF).max(base),
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Delay before attempt `attempt + 1`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max);
        delay.max(MIN_DELAY)
    }

    /// Delay before attempt `attempt + 1`, jitter included.
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        if self.jitter == 0.0 {
            return delay;
        }

        let jitter_millis = (delay.as_millis() as f64 * self.jitter) as u64;
        if jitter_millis == 0 {
            return delay;
        }
        let extra = Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_millis));
        (delay + extra).min(self.max).max(MIN_DELAY)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffConfig::default().into()
    }
}

impl From<BackoffConfig> for BackoffPolicy {
    fn from(config: BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_ms),
            Duration::from_millis(config.max_ms),
        )
        .with_jitter(config.jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_per_attempt() {
        let policy = BackoffPolicy::new(Duration::from_secs(5), Duration::from_secs(300));
        assert_eq!(policy.delay(1), Duration::from_secs(5));
        assert_eq!(policy.delay(2), Duration::from_secs(10));
        assert_eq!(policy.delay(3), Duration::from_secs(20));
    }

    #[test]
    fn test_capped_at_max() {
        let policy = BackoffPolicy::new(Duration::from_secs(5), Duration::from_secs(300));
        assert_eq!(policy.delay(10), Duration::from_secs(300));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy =
            BackoffPolicy::new(Duration::from_secs(10), Duration::from_secs(60)).with_jitter(0.5);
        for _ in 0..100 {
            let d = policy.delay(1);
            assert!(d >= Duration::from_secs(10));
            assert!(d <= Duration::from_secs(15));
        }
    }

    #[test]
    fn test_jitter_never_exceeds_max() {
        let policy =
            BackoffPolicy::new(Duration::from_secs(40), Duration::from_secs(60)).with_jitter(1.0);
        for _ in 0..100 {
            assert!(policy.delay(1) <= Duration::from_secs(60));
            assert_eq!(policy.delay(5), Duration::from_secs(60));
        }
    }

    #[test]
    fn test_oversized_config_is_clamped() {
        let policy: BackoffPolicy = BackoffConfig::new(10_000_000_000_000_000, u64::MAX)
            .with_jitter(0.0)
            .into();
        assert_eq!(policy.delay(1), MAX_BACKOFF);
        assert_eq!(policy.delay(u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn test_never_zero() {
        let policy = BackoffPolicy::new(Duration::ZERO, Duration::ZERO);
        assert!(policy.delay(1) > Duration::ZERO);
    }

    #[test]
    fn test_from_config() {
        let policy: BackoffPolicy = BackoffConfig::new(100, 1000).with_jitter(0.0).into();
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(5), Duration::from_millis(1000));
    }
}
