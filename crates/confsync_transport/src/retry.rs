//! Retry/backoff policy for rate-limited requests.

use rand::Rng;
use std::time::Duration;

/// Maximum attempts per request before giving up.
pub const MAX_RETRIES: u32 = 10;

/// Backoff policy applied between rate-limited attempts.
///
/// The delay for retry `n` is `2^min(n, 5) / 5` time units, jittered by
/// ±25% so concurrent clients do not retry in lockstep. The time unit is
/// one second in production; tests shrink it to keep runs fast.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts per request.
    pub max_retries: u32,
    /// Duration of one backoff time unit.
    pub time_unit: Duration,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryPolicy {
    /// Creates the production policy.
    pub fn new() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            time_unit: Duration::from_secs(1),
            add_jitter: true,
        }
    }

    /// Sets the maximum number of attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff time unit.
    pub fn with_time_unit(mut self, time_unit: Duration) -> Self {
        self.time_unit = time_unit;
        self
    }

    /// Disables jitter for deterministic tests.
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Calculates the delay before retry `n` (0-indexed).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let units = f64::from(1u32 << retry.min(5)) / 5.0;
        let base = units * self.time_unit.as_secs_f64();

        let secs = if self.add_jitter {
            let jitter: f64 = rand::thread_rng().gen_range(-0.25..=0.25);
            base * (1.0 + jitter)
        } else {
            base
        };

        Duration::from_secs_f64(secs.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy::new().without_jitter();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs_f64(0.2));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs_f64(0.4));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs_f64(0.8));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs_f64(6.4));
        // Exponent caps at 5.
        assert_eq!(policy.delay_for_attempt(9), Duration::from_secs_f64(6.4));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::new();

        for retry in 0..8 {
            let expected = RetryPolicy::new()
                .without_jitter()
                .delay_for_attempt(retry)
                .as_secs_f64();
            let actual = policy.delay_for_attempt(retry).as_secs_f64();

            assert!(actual >= expected * 0.75 - f64::EPSILON);
            assert!(actual <= expected * 1.25 + f64::EPSILON);
        }
    }

    #[test]
    fn time_unit_scales_delays() {
        let policy = RetryPolicy::new()
            .with_time_unit(Duration::from_millis(10))
            .without_jitter();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs_f64(0.002));
    }
}
