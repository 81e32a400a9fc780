use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use ingest_api::{RecordFactory, now_ms};

use crate::metrics::Metrics;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    /// Records accepted by the queue.
    pub emitted: u64,
    /// Window boundaries the generator waited for.
    pub windows_waited: u64,
    pub cancelled: bool,
}

/// Rate-controlled generation: push up to `rate` records per `window` into
/// `sink` until `total` have been emitted.
///
/// The final partial window is flushed without waiting for a tick. A full
/// queue blocks `send`, which throttles generation below `rate`; if a window
/// is overrun that way the next one starts immediately instead of bursting
/// to catch up.
pub async fn generate<F: RecordFactory>(
    factory: &mut F,
    total: u64,
    rate: u64,
    window: Duration,
    sink: &async_channel::Sender<F::Record>,
    metrics: &Metrics,
    token: &CancellationToken,
) -> GenerateReport {
    let mut report = GenerateReport::default();
    if rate == 0 {
        return report;
    }

    let mut ticker = tokio::time::interval(window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    while report.emitted < total {
        let chunk = rate.min(total - report.emitted);

        for _ in 0..chunk {
            let record = factory.next_record(now_ms());
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    report.cancelled = true;
                    return report;
                }
                sent = sink.send(record) => {
                    if sent.is_err() {
                        tracing::warn!(factory = factory.name(), emitted = report.emitted, "queue closed, stopping generator");
                        return report;
                    }
                }
            }
            report.emitted += 1;
            metrics.record_generated(1);
        }

        if report.emitted < total {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    report.cancelled = true;
                    return report;
                }
                _ = ticker.tick() => report.windows_waited += 1,
            }
        }
    }

    tracing::debug!(
        factory = factory.name(),
        emitted = report.emitted,
        windows = report.windows_waited,
        "generation complete"
    );
    report
}
