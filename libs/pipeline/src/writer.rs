use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ingest_api::{IngestError, Item, MAX_BATCH_SIZE, StorageBackend};

use crate::backoff::Backoff;
use crate::config::{RetryConfig, UnprocessedPolicy};
use crate::metrics::Metrics;

// ═══════════════════════════════════════════════════════════════
//  Outcome
// ═══════════════════════════════════════════════════════════════

/// Result of one `write_batch` call. `written() + failed()` always equals
/// the submitted batch size.
#[derive(Debug)]
pub enum WriteOutcome {
    Success { written: usize },
    /// Retry ceiling reached with items still unprocessed.
    PartialFailure { written: usize, unprocessed: Vec<Item> },
    /// The backend call itself kept failing (or failed permanently).
    Failure { written: usize, failed: usize, cause: IngestError },
}

impl WriteOutcome {
    pub fn written(&self) -> usize {
        match self {
            WriteOutcome::Success { written }
            | WriteOutcome::PartialFailure { written, .. }
            | WriteOutcome::Failure { written, .. } => *written,
        }
    }

    pub fn failed(&self) -> usize {
        match self {
            WriteOutcome::Success { .. } => 0,
            WriteOutcome::PartialFailure { unprocessed, .. } => unprocessed.len(),
            WriteOutcome::Failure { failed, .. } => *failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Success { .. })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Batch writer
// ═══════════════════════════════════════════════════════════════

/// Writes one batch with retry/backoff and books the result into [`Metrics`].
///
/// Fails closed: the outcome reports every item that was not confirmed by the
/// backend. Counters are updated exactly once per batch, after the last call.
///
/// Cancelling `token` interrupts the backoff between calls; whatever is still
/// pending at that point is reported as failed.
pub struct BatchWriter {
    backend: Arc<dyn StorageBackend>,
    max_attempts: u32,
    unprocessed: UnprocessedPolicy,
    backoff: Backoff,
    metrics: Arc<Metrics>,
    token: CancellationToken,
}

impl BatchWriter {
    pub fn new(backend: Arc<dyn StorageBackend>, retry: &RetryConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            backend,
            max_attempts: retry.max_attempts.max(1),
            unprocessed: retry.unprocessed,
            backoff: Backoff::new(&retry.backoff),
            metrics,
            token: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn write_batch(&self, batch: Vec<Item>) -> WriteOutcome {
        if batch.is_empty() {
            return WriteOutcome::Success { written: 0 };
        }
        let outcome = self.submit(batch).await;
        self.metrics.record_batch();
        self.metrics.record_written(outcome.written() as u64);
        self.metrics.record_failures(outcome.failed() as u64);
        outcome
    }

    async fn submit(&self, batch: Vec<Item>) -> WriteOutcome {
        let size = batch.len();
        debug_assert!(size <= MAX_BATCH_SIZE, "batch of {size} exceeds backend limit");

        let mut pending = batch;
        // calls charged against max_attempts
        let mut attempts = 0u32;
        let mut retry = 0u32;

        loop {
            let cause = match self.backend.batch_write(&pending).await {
                Ok(unprocessed) if unprocessed.is_empty() => {
                    return WriteOutcome::Success { written: size };
                }
                Ok(mut unprocessed) => {
                    if unprocessed.len() > pending.len() {
                        tracing::warn!(
                            backend = self.backend.name(),
                            submitted = pending.len(),
                            returned = unprocessed.len(),
                            "backend returned more unprocessed items than submitted"
                        );
                        unprocessed.truncate(pending.len());
                    }
                    self.metrics.record_retry();
                    if self.unprocessed == UnprocessedPolicy::Bounded {
                        attempts += 1;
                        if attempts >= self.max_attempts {
                            return WriteOutcome::PartialFailure { written: size - unprocessed.len(), unprocessed };
                        }
                    }
                    tracing::debug!(
                        backend = self.backend.name(),
                        unprocessed = unprocessed.len(),
                        retry = retry + 1,
                        "unprocessed items, retrying subset"
                    );
                    pending = unprocessed;
                    None
                }
                Err(cause) => {
                    if !cause.kind().is_transient() {
                        return WriteOutcome::Failure { written: size - pending.len(), failed: pending.len(), cause };
                    }
                    self.metrics.record_retry();
                    attempts += 1;
                    if attempts >= self.max_attempts {
                        return WriteOutcome::Failure { written: size - pending.len(), failed: pending.len(), cause };
                    }
                    tracing::debug!(
                        backend = self.backend.name(),
                        pending = pending.len(),
                        attempt = attempts,
                        error = ?cause,
                        "batch write failed, retrying"
                    );
                    Some(cause)
                }
            };

            retry += 1;
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    tracing::warn!(backend = self.backend.name(), pending = pending.len(), "cancelled during backoff");
                    let written = size - pending.len();
                    return match cause {
                        Some(cause) => WriteOutcome::Failure { written, failed: pending.len(), cause },
                        None => WriteOutcome::PartialFailure { written, unprocessed: pending },
                    };
                }
                _ = tokio::time::sleep(self.backoff.delay(retry)) => {}
            }
        }
    }
}
