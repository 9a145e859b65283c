//! Retry policy with capped exponential backoff and full jitter.
//!
//! Used for the selected agent's answer call (§ error handling): transient
//! failures retry up to `max_attempts` with delays `base * factor^(n-1)`,
//! capped, with jitter subtracted so simultaneous retries spread out.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration for external invocation calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Maximum total attempts (first try included).
    pub max_attempts: u32,
    /// Base delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier applied per retry.
    pub factor: f64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Fraction of the computed delay randomized away, in [0, 1].
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            factor: 2.0,
            max_delay_ms: 30_000,
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    /// Backoff delay before retry number `attempt` (1-based: the delay
    /// taken after the first failure is `attempt == 1`).
    ///
    /// Deterministic component: `min(base * factor^(attempt-1), max)`.
    /// Jitter subtracts up to `jitter_factor` of that, never adding, so
    /// the documented floor (`base + base*factor + ...` minus jitter)
    /// holds.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let raw = self.base_delay_ms as f64 * self.factor.powi(exp as i32);
        let capped = raw.min(self.max_delay_ms as f64);
        let jitter_span = capped * self.jitter_factor.clamp(0.0, 1.0);
        let jitter = rand::random::<f64>() * jitter_span;
        Duration::from_millis((capped - jitter).max(0.0) as u64)
    }

    /// Lowest possible delay for retry `attempt` once jitter is applied.
    #[must_use]
    pub fn min_delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let raw = self.base_delay_ms as f64 * self.factor.powi(exp as i32);
        let capped = raw.min(self.max_delay_ms as f64);
        let floor = capped * (1.0 - self.jitter_factor.clamp(0.0, 1.0));
        Duration::from_millis(floor.max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn defaults_match_policy() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.base_delay_ms, 1_000);
        assert_eq!(cfg.factor, 2.0);
        assert_eq!(cfg.max_delay_ms, 30_000);
    }

    #[test]
    fn exponential_growth_without_jitter() {
        let cfg = no_jitter();
        assert_eq!(cfg.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(cfg.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(cfg.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn delay_caps_at_max() {
        let cfg = no_jitter();
        // 1s * 2^9 = 512s, well past the 30s cap.
        assert_eq!(cfg.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn jitter_only_subtracts() {
        let cfg = RetryConfig::default();
        for attempt in 1..=5 {
            let d = cfg.delay_for_attempt(attempt);
            let floor = cfg.min_delay_for_attempt(attempt);
            let ceiling = no_jitter().delay_for_attempt(attempt);
            assert!(d >= floor, "attempt {attempt}: {d:?} < floor {floor:?}");
            assert!(d <= ceiling, "attempt {attempt}: {d:?} > ceiling {ceiling:?}");
        }
    }

    #[test]
    fn min_delay_accounts_for_jitter() {
        let cfg = RetryConfig::default();
        // 25% jitter on a 1s base leaves at least 750ms.
        assert_eq!(cfg.min_delay_for_attempt(1), Duration::from_millis(750));
        assert_eq!(cfg.min_delay_for_attempt(2), Duration::from_millis(1_500));
    }
}
