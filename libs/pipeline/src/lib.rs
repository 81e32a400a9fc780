pub mod backoff;
pub mod config;
pub mod error;
pub mod generate;
pub mod metrics;
pub mod worker;
pub mod writer;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ingest_api::{RecordFactory, StorageBackend};

pub use backoff::Backoff;
pub use config::{
    BackoffConfig, BackoffStrategy, MAX_QUEUE_CAPACITY, MAX_RATE_PER_WINDOW, PipelineConfig, RetryConfig,
    UnprocessedPolicy,
};
pub use error::PipelineError;
pub use generate::{GenerateReport, generate};
pub use metrics::{Metrics, Snapshot, Summary, spawn_collector};
pub use worker::{WorkerStats, spawn_workers};
pub use writer::{BatchWriter, WriteOutcome};

// ═══════════════════════════════════════════════════════════════
//  Run: generator → queue → workers → backend
// ═══════════════════════════════════════════════════════════════

/// Execute one ingestion run to completion (or cancellation).
///
/// Order of shutdown: generator returns, queue is closed, workers drain it and
/// flush, collector stops. On cancellation workers flush what they hold and
/// records still queued are counted as abandoned.
pub async fn run<F>(
    config: &PipelineConfig,
    mut factory: F,
    backend: Arc<dyn StorageBackend>,
    token: CancellationToken,
) -> Result<Summary, PipelineError>
where
    F: RecordFactory,
{
    config.validate()?;

    let metrics = Arc::new(Metrics::new());
    let (tx, rx) = async_channel::bounded::<F::Record>(config.queue_capacity());

    tracing::info!(
        factory = factory.name(),
        backend = backend.name(),
        total = config.total,
        rate = config.rate,
        window_ms = config.window_ms,
        workers = config.workers,
        batch_size = config.batch_size,
        queue = config.queue_capacity(),
        "starting ingestion run"
    );

    let collector_token = token.child_token();
    let collector = spawn_collector(metrics.clone(), config.report_period(), collector_token.clone());

    let writer = Arc::new(BatchWriter::new(backend, &config.retry, metrics.clone()).with_cancel(token.clone()));
    let workers = spawn_workers(
        config.workers,
        rx.clone(),
        writer,
        metrics.clone(),
        config.batch_size,
        token.clone(),
    );

    let report = generate(&mut factory, config.total, config.rate, config.window(), &tx, &metrics, &token).await;
    tx.close();

    for handle in workers {
        match handle.await {
            Ok(stats) => tracing::trace!(?stats, "worker joined"),
            Err(e) => tracing::error!(error = %e, "worker task failed"),
        }
    }

    collector_token.cancel();
    if let Err(e) = collector.await {
        tracing::error!(error = %e, "metrics collector failed");
    }

    let mut abandoned = 0u64;
    while rx.try_recv().is_ok() {
        abandoned += 1;
    }
    if report.cancelled || abandoned > 0 {
        tracing::warn!(emitted = report.emitted, abandoned, "run cancelled before completion");
    }

    let summary = metrics.summary(abandoned);
    tracing::info!(
        written = summary.written,
        failed = summary.failed,
        retries = summary.retries,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "ingestion run finished"
    );
    Ok(summary)
}
