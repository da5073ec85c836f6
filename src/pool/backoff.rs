//! Exponential backoff computation.
//!
//! A pure, attempt-counted calculation shared by the pool's degraded-target
//! gate and the remediation engine's retry loop. No timers live here; the
//! callers decide what to do with the computed interval.

use std::time::Duration;

/// Bounded exponential backoff: `base * 2^(attempt-1)`, capped at `ceiling`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    ceiling: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self { base, ceiling }
    }

    /// Delay before the given 1-based attempt. Attempt 1 waits the base
    /// interval; each further attempt doubles it up to the ceiling.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        // Beyond 2^32 the ceiling has long since taken over
        let exponent = (attempt - 1).min(32);
        let factor = 1u64 << exponent;
        let delay = self
            .base
            .checked_mul(u32::try_from(factor).unwrap_or(u32::MAX))
            .unwrap_or(self.ceiling);
        delay.min(self.ceiling)
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling_sequence() {
        let policy = BackoffPolicy::new(Duration::from_millis(500), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(4));
    }

    #[test]
    fn test_ceiling_caps_growth() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(30), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_attempt_zero_is_immediate() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
    }
}
