use std::future::Future;
use std::pin::Pin;

mod error;
mod item;
mod util;

pub use error::{ErrorKind, IngestError};
pub use item::{AttributeValue, Item, to_item};
pub use util::{now_ms, round_to};

/// Hard limit of items accepted by one batch-write call.
pub const MAX_BATCH_SIZE: usize = 25;

// ════════════════════════════════════════════════════════════════
//  Records
// ════════════════════════════════════════════════════════════════

/// Domain record produced by a [`RecordFactory`] and written by the pipeline.
///
/// A record is immutable once created and owned by the generator until it is
/// handed to the queue.
pub trait Record: Send + 'static {
    /// Partition (hash) key value, used for logging and hot-key analysis.
    fn partition_key(&self) -> String;

    /// Unix ms timestamp the record was stamped with.
    fn ts_ms(&self) -> i64;

    /// Encode for the wire. A `Format` error drops this single record.
    fn to_item(&self) -> Result<Item, IngestError>;
}

/// Pluggable record shape + field-generation strategy.
///
/// Factories own their PRNG; given the same seed and the same timestamps the
/// produced sequence is identical.
pub trait RecordFactory: Send {
    type Record: Record;

    /// Human-readable name (`trade`, `user-behavior`, ...).
    fn name(&self) -> &str;

    /// Produce the next record stamped with `ts_ms`.
    fn next_record(&mut self, ts_ms: i64) -> Self::Record;
}

// ════════════════════════════════════════════════════════════════
//  Storage backend
// ════════════════════════════════════════════════════════════════

/// Key-value backend with a non-atomic batch write.
///
/// `batch_write` accepts at most [`MAX_BATCH_SIZE`] items. `Ok` carries the
/// unprocessed subset (empty = everything applied, possibly the whole input).
/// `Err` is a call-level failure: nothing from this call can be assumed
/// applied.
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &str;

    fn batch_write<'a>(
        &'a self,
        items: &'a [Item],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, IngestError>> + Send + 'a>>;
}
