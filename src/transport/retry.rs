//! Retry/backoff policy shared by every transport that opts into the retry
//! wrapper (§4.3).
//!
//! A historical bug — `reconnectAttempts += newAttempts` compounding the
//! counter by however many attempts a single health check made internally
//! — is avoided by keeping the health-check failure counter (owned by the
//! endpoint) entirely separate from the attempt counter used here, which is
//! purely local to one `with_retry` call.

use std::time::Duration;

/// Shape of the delay curve between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    Constant,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    pub policy: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
            policy: BackoffPolicy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep before the `attempt`-th retry (1-indexed: the delay
    /// before the first retry is `delay_for(1)`), capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = match self.policy {
            BackoffPolicy::Constant => self.base_delay,
            BackoffPolicy::Linear => self.base_delay.saturating_mul(attempt.max(1)),
            BackoffPolicy::Exponential => {
                let exp = attempt.saturating_sub(1).min(16);
                self.base_delay.saturating_mul(1u32 << exp)
            }
        };
        let capped = raw.min(self.max_delay);
        if self.jitter {
            jitter(capped, attempt)
        } else {
            capped
        }
    }
}

/// Deterministic pseudo-jitter: scales the delay by a factor in `[0.5, 1.0)`
/// derived from the attempt number. Avoids pulling in a RNG dependency for
/// what is, functionally, thundering-herd smoothing rather than security
/// sensitive randomness.
fn jitter(delay: Duration, attempt: u32) -> Duration {
    let steps = 1000u64;
    let phase = u64::from(attempt.wrapping_mul(2654435761)) % steps;
    let factor = 500 + (phase * 500 / steps);
    Duration::from_nanos(delay.as_nanos() as u64 * factor / 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_policy_never_grows() {
        let policy = RetryPolicy {
            jitter: false,
            policy: BackoffPolicy::Constant,
            base_delay: Duration::from_millis(100),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(5), Duration::from_millis(100));
    }

    #[test]
    fn linear_policy_scales_with_attempt() {
        let policy = RetryPolicy {
            jitter: false,
            policy: BackoffPolicy::Linear,
            base_delay: Duration::from_millis(100),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn exponential_policy_doubles() {
        let policy = RetryPolicy {
            jitter: false,
            policy: BackoffPolicy::Exponential,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let policy = RetryPolicy {
            jitter: false,
            policy: BackoffPolicy::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_within_half_to_full_scale() {
        let policy = RetryPolicy {
            jitter: true,
            policy: BackoffPolicy::Constant,
            base_delay: Duration::from_millis(1000),
            ..Default::default()
        };
        for attempt in 1..20 {
            let d = policy.delay_for(attempt);
            assert!(d >= Duration::from_millis(500));
            assert!(d <= Duration::from_millis(1000));
        }
    }
}
