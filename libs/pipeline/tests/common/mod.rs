#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use serde::Serialize;

use ingest_api::{AttributeValue, IngestError, Item, Record, RecordFactory, StorageBackend, to_item};
use pipeline::{BackoffConfig, BackoffStrategy, RetryConfig, UnprocessedPolicy};

// =============================================================================
// Scripted backend
// =============================================================================

#[derive(Clone)]
pub enum Reply {
    Accept,
    /// Return the first `n` submitted items as unprocessed.
    Unprocess(usize),
    /// Return `n` unrelated items, regardless of what was submitted.
    Bogus(usize),
    Fail(IngestError),
}

/// Replays `script` call by call, then answers every further call with
/// `fallback`. Records the size of every call.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: Mutex<Vec<usize>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Reply>, fallback: Reply) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(Vec::new(), Reply::Accept)
    }

    pub fn call_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

impl StorageBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn batch_write<'a>(
        &'a self,
        items: &'a [Item],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, IngestError>> + Send + 'a>> {
        self.calls.lock().unwrap().push(items.len());
        let reply = self.script.lock().unwrap().pop_front().unwrap_or_else(|| self.fallback.clone());
        Box::pin(async move {
            match reply {
                Reply::Accept => Ok(Vec::new()),
                Reply::Unprocess(n) => Ok(items.iter().take(n).cloned().collect()),
                Reply::Bogus(n) => Ok(self::items(n)),
                Reply::Fail(e) => Err(e),
            }
        })
    }
}

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SeqRecord {
    pub id: u64,
    pub ts: i64,
    pub value: f64,
}

impl Record for SeqRecord {
    fn partition_key(&self) -> String {
        self.id.to_string()
    }

    fn ts_ms(&self) -> i64 {
        self.ts
    }

    fn to_item(&self) -> Result<Item, IngestError> {
        to_item(self)
    }
}

/// Sequential ids from 0. Built with `poisoned(k)`, every k-th record
/// carries a NaN and cannot be serialized.
#[derive(Default)]
pub struct SeqFactory {
    next: u64,
    poison_every: Option<u64>,
}

impl SeqFactory {
    pub fn poisoned(every: u64) -> Self {
        Self { poison_every: Some(every), ..Default::default() }
    }
}

impl RecordFactory for SeqFactory {
    type Record = SeqRecord;

    fn name(&self) -> &str {
        "seq"
    }

    fn next_record(&mut self, ts_ms: i64) -> SeqRecord {
        let id = self.next;
        self.next += 1;
        let poisoned = self.poison_every.is_some_and(|k| (id + 1) % k == 0);
        SeqRecord { id, ts: ts_ms, value: if poisoned { f64::NAN } else { id as f64 } }
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub fn items(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| {
            let mut item = Item::new();
            item.insert("id".into(), AttributeValue::N(i.to_string()));
            item
        })
        .collect()
}

/// Fixed backoff without jitter, so virtual-time assertions are exact.
pub fn retry(max_attempts: u32, unprocessed: UnprocessedPolicy, base_ms: u64) -> RetryConfig {
    RetryConfig {
        max_attempts,
        unprocessed,
        backoff: BackoffConfig {
            strategy: BackoffStrategy::Fixed,
            base_ms,
            multiplier: 1.0,
            max_ms: base_ms,
            jitter: 0.0,
        },
    }
}
