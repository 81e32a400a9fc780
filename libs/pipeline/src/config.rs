use std::time::Duration;

use serde::Deserialize;

use ingest_api::MAX_BATCH_SIZE;

use crate::PipelineError;

/// Hard ceiling on records per window, enforced before startup.
pub const MAX_RATE_PER_WINDOW: u64 = 2_000_000;

/// Upper bound on queue slots regardless of the configured rate.
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

// ═══════════════════════════════════════════════════════════════
//  Pipeline Config
// ═══════════════════════════════════════════════════════════════

/// Параметры одного прогона: сколько, с какой скоростью, сколькими воркерами.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Total records to generate.
    #[serde(default = "default_total")]
    pub total: u64,
    /// Records per window (soft ceiling, the queue throttles below it).
    #[serde(default = "default_rate")]
    pub rate: u64,
    /// Pacing window length.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Concurrent consumers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Items per backend call, at most 25.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Queue slots. Default: two windows' worth of records.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    /// Metrics reporting period.
    #[serde(default = "default_report_ms")]
    pub report_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_total() -> u64 {
    100_000
}
fn default_rate() -> u64 {
    100
}
fn default_window_ms() -> u64 {
    1000
}
fn default_workers() -> usize {
    10
}
fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}
fn default_report_ms() -> u64 {
    1000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            total: default_total(),
            rate: default_rate(),
            window_ms: default_window_ms(),
            workers: default_workers(),
            batch_size: default_batch_size(),
            queue_capacity: None,
            report_ms: default_report_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn report_period(&self) -> Duration {
        Duration::from_millis(self.report_ms)
    }

    pub fn queue_capacity(&self) -> usize {
        let wanted = self
            .queue_capacity
            .unwrap_or_else(|| usize::try_from(self.rate.saturating_mul(2)).unwrap_or(usize::MAX));
        wanted.clamp(1, MAX_QUEUE_CAPACITY)
    }

    /// Reject anything that would make the run meaningless. Called before any
    /// component starts.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.rate == 0 {
            return Err(PipelineError::config("rate", "must be greater than 0"));
        }
        if self.rate > MAX_RATE_PER_WINDOW {
            return Err(PipelineError::config(
                "rate",
                format!("{} exceeds the ceiling of {MAX_RATE_PER_WINDOW} records per window", self.rate),
            ));
        }
        if self.window_ms == 0 {
            return Err(PipelineError::config("window_ms", "must be greater than 0"));
        }
        if self.report_ms == 0 {
            return Err(PipelineError::config("report_ms", "must be greater than 0"));
        }
        if self.workers == 0 {
            return Err(PipelineError::config("workers", "at least one worker is required"));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(PipelineError::config(
                "batch_size",
                format!("{} is outside 1..={MAX_BATCH_SIZE}", self.batch_size),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(PipelineError::config("queue_capacity", "must be greater than 0"));
        }
        self.retry.validate()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Retry Config
// ═══════════════════════════════════════════════════════════════

/// What to do with items the backend keeps returning as unprocessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnprocessedPolicy {
    /// Unprocessed rounds share the `max_attempts` ceiling; leftovers fail.
    #[default]
    Bounded,
    /// Retry unprocessed items until the backend accepts them. Rounds still
    /// back off; transport errors stay bounded by `max_attempts`.
    UntilClear,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Backend calls per batch before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub unprocessed: UnprocessedPolicy,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            unprocessed: UnprocessedPolicy::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_attempts == 0 {
            return Err(PipelineError::config("retry.max_attempts", "must be at least 1"));
        }
        self.backoff.validate()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Backoff Config
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Every retry waits `base_ms`.
    Fixed,
    /// Retry `n` waits `base_ms * multiplier^(n-1)`.
    #[default]
    Exponential,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    #[serde(default)]
    pub strategy: BackoffStrategy,
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Ceiling for a single delay, jitter included.
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    /// Fraction of the delay randomized in both directions (0.25 = ±25%).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_base_ms() -> u64 {
    100
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_ms() -> u64 {
    5_000
}
fn default_jitter() -> f64 {
    0.25
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::default(),
            base_ms: default_base_ms(),
            multiplier: default_multiplier(),
            max_ms: default_max_ms(),
            jitter: default_jitter(),
        }
    }
}

impl BackoffConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.base_ms > self.max_ms {
            return Err(PipelineError::config(
                "retry.backoff",
                format!("base_ms ({}) must be <= max_ms ({})", self.base_ms, self.max_ms),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(PipelineError::config(
                "retry.backoff.multiplier",
                format!("{} must be a finite value >= 1.0", self.multiplier),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(PipelineError::config(
                "retry.backoff.jitter",
                format!("{} is outside 0.0..=1.0", self.jitter),
            ));
        }
        Ok(())
    }
}
