use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ingest_api::{Item, Record};

use crate::metrics::Metrics;
use crate::writer::{BatchWriter, WriteOutcome};

/// Per-worker totals, returned when the worker task ends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub id: usize,
    pub received: u64,
    pub batches: u64,
    pub written: u64,
    pub failed: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Worker pool: queue → batch → BatchWriter
// ═══════════════════════════════════════════════════════════════

/// Запустить `n` воркеров, читающих одну общую очередь.
///
/// Each worker accumulates up to `batch_size` encoded items and hands full
/// batches to the writer. When the queue is closed and drained, or `token`
/// is cancelled, the partial batch is flushed and the worker exits.
pub fn spawn_workers<R: Record>(
    n: usize,
    rx: async_channel::Receiver<R>,
    writer: Arc<BatchWriter>,
    metrics: Arc<Metrics>,
    batch_size: usize,
    token: CancellationToken,
) -> Vec<JoinHandle<WorkerStats>> {
    (0..n)
        .map(|id| {
            let rx = rx.clone();
            let writer = writer.clone();
            let metrics = metrics.clone();
            let token = token.clone();
            tokio::spawn(async move { run_worker(id, rx, &writer, &metrics, batch_size, &token).await })
        })
        .collect()
}

async fn run_worker<R: Record>(
    id: usize,
    rx: async_channel::Receiver<R>,
    writer: &BatchWriter,
    metrics: &Metrics,
    batch_size: usize,
    token: &CancellationToken,
) -> WorkerStats {
    let mut stats = WorkerStats { id, ..Default::default() };
    let mut batch: Vec<Item> = Vec::with_capacity(batch_size);

    loop {
        let record = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            received = rx.recv() => match received {
                Ok(record) => record,
                // closed and empty
                Err(_) => break,
            },
        };
        stats.received += 1;

        match record.to_item() {
            Ok(item) => batch.push(item),
            Err(e) => {
                tracing::warn!(worker = id, key = %record.partition_key(), error = ?e, "dropping record");
                metrics.record_failures(1);
                stats.failed += 1;
                continue;
            }
        }

        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            flush(id, writer, full, &mut stats).await;
        }
    }

    if !batch.is_empty() {
        flush(id, writer, batch, &mut stats).await;
    }

    tracing::debug!(
        worker = id,
        received = stats.received,
        batches = stats.batches,
        written = stats.written,
        failed = stats.failed,
        "worker stopped"
    );
    stats
}

async fn flush(id: usize, writer: &BatchWriter, batch: Vec<Item>, stats: &mut WorkerStats) {
    let outcome = writer.write_batch(batch).await;
    stats.batches += 1;
    stats.written += outcome.written() as u64;
    stats.failed += outcome.failed() as u64;

    match &outcome {
        WriteOutcome::Success { .. } => {}
        WriteOutcome::PartialFailure { written, unprocessed } => {
            tracing::error!(
                worker = id,
                backend = writer.backend_name(),
                written,
                unprocessed = unprocessed.len(),
                "batch partially written, retries exhausted"
            );
        }
        WriteOutcome::Failure { written, failed, cause } => {
            tracing::error!(
                worker = id,
                backend = writer.backend_name(),
                written,
                failed,
                error = ?cause,
                "batch write failed"
            );
        }
    }
}
