use std::time::Duration;

use rand::Rng;

use crate::config::{BackoffConfig, BackoffStrategy};

/// Delay schedule between retries of one batch.
#[derive(Debug, Clone)]
pub struct Backoff {
    strategy: BackoffStrategy,
    base: Duration,
    multiplier: f64,
    max: Duration,
    jitter: f64,
}

impl Backoff {
    pub fn new(cfg: &BackoffConfig) -> Self {
        Self {
            strategy: cfg.strategy,
            base: Duration::from_millis(cfg.base_ms),
            multiplier: cfg.multiplier,
            max: Duration::from_millis(cfg.max_ms),
            jitter: cfg.jitter,
        }
    }

    /// Delay before retry number `retry` (1-based). Never exceeds the cap.
    pub fn delay(&self, retry: u32) -> Duration {
        if self.base.is_zero() {
            return Duration::ZERO;
        }
        let base = self.base.as_secs_f64();
        let max = self.max.as_secs_f64();

        let raw = match self.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Exponential => {
                let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
                base * self.multiplier.powi(exp)
            }
        };
        let capped = raw.min(max);

        let jittered = if self.jitter > 0.0 && capped > 0.0 {
            let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
            capped * (1.0 + spread)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered.clamp(0.0, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(strategy: BackoffStrategy, base_ms: u64, multiplier: f64, max_ms: u64, jitter: f64) -> BackoffConfig {
        BackoffConfig { strategy, base_ms, multiplier, max_ms, jitter }
    }

    #[test]
    fn fixed_is_constant() {
        let b = Backoff::new(&cfg(BackoffStrategy::Fixed, 250, 2.0, 5_000, 0.0));
        for retry in 1..10 {
            assert_eq!(b.delay(retry), Duration::from_millis(250));
        }
    }

    #[test]
    fn exponential_doubles_until_cap() {
        let b = Backoff::new(&cfg(BackoffStrategy::Exponential, 100, 2.0, 1_000, 0.0));
        assert_eq!(b.delay(1), Duration::from_millis(100));
        assert_eq!(b.delay(2), Duration::from_millis(200));
        assert_eq!(b.delay(3), Duration::from_millis(400));
        assert_eq!(b.delay(4), Duration::from_millis(800));
        assert_eq!(b.delay(5), Duration::from_millis(1_000));
        assert_eq!(b.delay(u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn aggressive_multiplier() {
        let b = Backoff::new(&cfg(BackoffStrategy::Exponential, 1_000, 40.0, 120_000, 0.0));
        assert_eq!(b.delay(2), Duration::from_secs(40));
        assert_eq!(b.delay(3), Duration::from_secs(120));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let b = Backoff::new(&cfg(BackoffStrategy::Fixed, 1_000, 1.0, 1_100, 0.25));
        for _ in 0..1_000 {
            let d = b.delay(1);
            assert!(d >= Duration::from_millis(750), "{d:?}");
            assert!(d <= Duration::from_millis(1_100), "{d:?}");
        }
    }

    #[test]
    fn zero_base_means_no_wait() {
        let b = Backoff::new(&cfg(BackoffStrategy::Exponential, 0, 2.0, 0, 0.5));
        assert_eq!(b.delay(3), Duration::ZERO);
    }

    #[test]
    fn zero_base_stays_zero_for_deep_retries() {
        let b = Backoff::new(&cfg(BackoffStrategy::Exponential, 0, 2.0, 5_000, 0.0));
        assert_eq!(b.delay(10), Duration::ZERO);
        assert_eq!(b.delay(1_100), Duration::ZERO);
        assert_eq!(b.delay(u32::MAX), Duration::ZERO);
    }
}
