use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

// ═══════════════════════════════════════════════════════════════
//  Counters
// ═══════════════════════════════════════════════════════════════

/// Lock-free counter bundle shared by the generator, workers, writer and
/// collector. One instance per pipeline run.
///
/// Every counter only grows, except `written_this_window` which the
/// collector swaps to zero once per reporting period.
#[derive(Debug)]
pub struct Metrics {
    started: Instant,
    generated: AtomicU64,
    records_written: AtomicU64,
    written_this_window: AtomicU64,
    retry_count: AtomicU64,
    failure_count: AtomicU64,
    batches: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            generated: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            written_this_window: AtomicU64::new(0),
            retry_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            batches: AtomicU64::new(0),
        }
    }

    pub fn record_generated(&self, n: u64) {
        self.generated.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_written(&self, n: u64) {
        if n == 0 {
            return;
        }
        self.records_written.fetch_add(n, Ordering::Relaxed);
        self.written_this_window.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failures(&self, n: u64) {
        if n > 0 {
            self.failure_count.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generated(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn retry_count(&self) -> u64 {
        self.retry_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Close the current reporting window: swap the window counter to zero and
    /// read the rest without resetting.
    pub fn take_window(&self) -> Snapshot {
        let elapsed = self.elapsed().as_secs_f64();
        let written = self.records_written();
        Snapshot {
            at: Local::now(),
            avg: per_second(written, elapsed),
            window_count: self.written_this_window.swap(0, Ordering::Relaxed),
            retries: self.retry_count(),
            failures: self.failure_count(),
        }
    }

    /// Final accounting. Only meaningful once every worker has been joined.
    pub fn summary(&self, abandoned: u64) -> Summary {
        Summary {
            generated: self.generated(),
            written: self.records_written(),
            failed: self.failure_count(),
            retries: self.retry_count(),
            batches: self.batches(),
            abandoned,
            elapsed: self.elapsed(),
        }
    }
}

fn per_second(count: u64, secs: f64) -> f64 {
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

// ═══════════════════════════════════════════════════════════════
//  Snapshot / Summary
// ═══════════════════════════════════════════════════════════════

/// One reporting window.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub at: DateTime<Local>,
    /// Cumulative average records written per second since start.
    pub avg: f64,
    /// Records written during this window.
    pub window_count: u64,
    pub retries: u64,
    pub failures: u64,
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] avg={:.2} windowCount={} retries={} failures={}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.avg,
            self.window_count,
            self.retries,
            self.failures
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Records handed to the queue.
    pub generated: u64,
    pub written: u64,
    /// Serialization drops plus items that exhausted their retries.
    pub failed: u64,
    pub retries: u64,
    /// Backend write calls that resolved (including their retries).
    pub batches: u64,
    /// Records still queued when the run was cancelled.
    pub abandoned: u64,
    pub elapsed: Duration,
}

impl Summary {
    pub fn avg_per_second(&self) -> f64 {
        per_second(self.written, self.elapsed.as_secs_f64())
    }

    /// Every generated record is accounted for exactly once.
    pub fn is_balanced(&self) -> bool {
        self.written + self.failed + self.abandoned == self.generated
    }

    pub fn is_degraded(&self) -> bool {
        self.failed > 0
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total records attempted: {}", self.generated)?;
        writeln!(f, "Total records written: {}", self.written)?;
        writeln!(f, "Total time: {:.2} seconds", self.elapsed.as_secs_f64())?;
        writeln!(f, "Final average records written per second: {:.2}", self.avg_per_second())?;
        writeln!(f, "Total retry count: {}", self.retries)?;
        write!(f, "Total failure count: {}", self.failed)?;
        if self.abandoned > 0 {
            write!(f, "\nAbandoned in queue: {}", self.abandoned)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Collector task
// ═══════════════════════════════════════════════════════════════

/// Запустить collector: раз в `period` закрывает окно и пишет одну строку в лог.
pub fn spawn_collector(metrics: Arc<Metrics>, period: Duration, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = metrics.take_window();
                    tracing::info!(target: "pipeline::metrics", "{snapshot}");
                }
                _ = token.cancelled() => break,
            }
        }
    })
}
