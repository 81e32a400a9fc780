use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use ingest_api::{IngestError, Item, MAX_BATCH_SIZE, StorageBackend};

// ═══════════════════════════════════════════════════════════════
//  MemoryBackendConfig
// ═══════════════════════════════════════════════════════════════

fn default_key_attributes() -> Vec<String> {
    vec!["id".to_string()]
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MemoryBackendConfig {
    /// Attributes forming the primary key, partition key first.
    #[serde(default = "default_key_attributes")]
    pub key_attributes: Vec<String>,
    /// Attribute the per-call capacity is counted on. Defaults to the
    /// partition key.
    #[serde(default)]
    pub throttle_attribute: Option<String>,
    /// Items per partition value accepted in one call; the rest come back
    /// unprocessed. `None` accepts everything.
    #[serde(default)]
    pub partition_capacity: Option<usize>,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            key_attributes: default_key_attributes(),
            throttle_attribute: None,
            partition_capacity: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBackend
// ═══════════════════════════════════════════════════════════════

/// In-memory table. Для тестов и локальных прогонов без AWS.
///
/// A put with an existing key overwrites the previous item, like the real
/// service. With `partition_capacity` set, a single call accepts at most that
/// many items per partition value and returns the rest as unprocessed, which
/// reproduces hot-partition throttling.
pub struct MemoryBackend {
    table: RwLock<HashMap<String, Item>>,
    key_attributes: Vec<String>,
    throttle_attribute: Option<String>,
    partition_capacity: Option<usize>,
    calls: AtomicU64,
}

impl MemoryBackend {
    pub fn new(config: MemoryBackendConfig) -> Result<Self, IngestError> {
        if config.key_attributes.is_empty() {
            return Err(IngestError::config("memory backend needs at least one key attribute"));
        }
        if config.partition_capacity == Some(0) {
            return Err(IngestError::config("partition_capacity must be greater than 0"));
        }
        let throttle_attribute = config
            .partition_capacity
            .map(|_| config.throttle_attribute.unwrap_or_else(|| config.key_attributes[0].clone()));
        Ok(Self {
            table: RwLock::new(HashMap::new()),
            key_attributes: config.key_attributes,
            throttle_attribute,
            partition_capacity: config.partition_capacity,
            calls: AtomicU64::new(0),
        })
    }

    /// Unthrottled table with the given key.
    pub fn with_keys(keys: &[&str]) -> Result<Self, IngestError> {
        Self::new(MemoryBackendConfig {
            key_attributes: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        })
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }

    /// Look up an item by its key values, in key-attribute order.
    pub async fn get(&self, key_values: &[&str]) -> Option<Item> {
        let key = key_values.join(KEY_SEPARATOR);
        self.table.read().await.get(&key).cloned()
    }

    /// `batch_write` calls served so far, rejected ones included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn key_of(&self, item: &Item) -> Result<String, IngestError> {
        let mut parts = Vec::with_capacity(self.key_attributes.len());
        for attr in &self.key_attributes {
            match item.get(attr) {
                Some(value) => parts.push(value.to_string()),
                None => return Err(IngestError::format_err(format!("item is missing key attribute '{attr}'"))),
            }
        }
        Ok(parts.join(KEY_SEPARATOR))
    }
}

const KEY_SEPARATOR: &str = "\u{1f}";

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn batch_write<'a>(
        &'a self,
        items: &'a [Item],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, IngestError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if items.len() > MAX_BATCH_SIZE {
                return Err(IngestError::config(format!(
                    "batch of {} items exceeds the limit of {MAX_BATCH_SIZE}",
                    items.len()
                )));
            }

            // whole call is rejected if any key is malformed
            let keys = items.iter().map(|item| self.key_of(item)).collect::<Result<Vec<_>, _>>()?;

            let mut accepted_per_partition: HashMap<String, usize> = HashMap::new();
            let mut unprocessed = Vec::new();
            let mut table = self.table.write().await;

            for (key, item) in keys.into_iter().zip(items) {
                if let (Some(cap), Some(attr)) = (self.partition_capacity, &self.throttle_attribute) {
                    if let Some(value) = item.get(attr) {
                        let accepted = accepted_per_partition.entry(value.to_string()).or_insert(0);
                        if *accepted >= cap {
                            unprocessed.push(item.clone());
                            continue;
                        }
                        *accepted += 1;
                    }
                }
                table.insert(key, item.clone());
            }

            Ok(unprocessed)
        })
    }
}

#[cfg(test)]
mod tests {
    use ingest_api::{AttributeValue, ErrorKind};

    use super::*;

    fn item(pk: &str, sk: i64) -> Item {
        let mut item = Item::new();
        item.insert("pk".into(), AttributeValue::S(pk.into()));
        item.insert("sk".into(), AttributeValue::N(sk.to_string()));
        item
    }

    #[tokio::test]
    async fn writes_and_overwrites_by_key() {
        let backend = MemoryBackend::with_keys(&["pk", "sk"]).unwrap();
        let mut second = item("a", 1);
        second.insert("extra".into(), AttributeValue::Bool(true));

        let unprocessed = backend.batch_write(&[item("a", 1), item("a", 2), item("b", 1)]).await.unwrap();
        assert!(unprocessed.is_empty());
        backend.batch_write(&[second.clone()]).await.unwrap();

        assert_eq!(backend.len().await, 3);
        assert_eq!(backend.get(&["a", "1"]).await, Some(second));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn partition_capacity_returns_overflow() {
        let backend = MemoryBackend::new(MemoryBackendConfig {
            key_attributes: vec!["pk".into(), "sk".into()],
            throttle_attribute: None,
            partition_capacity: Some(2),
        })
        .unwrap();

        let batch: Vec<Item> = (0..5).map(|i| item("hot", i)).chain([item("cold", 0)]).collect();
        let unprocessed = backend.batch_write(&batch).await.unwrap();
        assert_eq!(unprocessed.len(), 3);
        assert!(unprocessed.iter().all(|i| i.get("pk") == Some(&AttributeValue::S("hot".into()))));
        assert_eq!(backend.len().await, 3);

        // capacity is per call
        let unprocessed = backend.batch_write(&unprocessed).await.unwrap();
        assert_eq!(unprocessed.len(), 1);
        assert_eq!(backend.len().await, 5);
    }

    #[tokio::test]
    async fn missing_key_rejects_whole_call() {
        let backend = MemoryBackend::with_keys(&["pk", "sk"]).unwrap();
        let mut bad = Item::new();
        bad.insert("pk".into(), AttributeValue::S("x".into()));

        let err = backend.batch_write(&[item("a", 1), bad]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn oversized_batch_is_config_error() {
        let backend = MemoryBackend::with_keys(&["pk", "sk"]).unwrap();
        let batch: Vec<Item> = (0..26).map(|i| item("a", i)).collect();
        let err = backend.batch_write(&batch).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn config_validation() {
        assert!(MemoryBackend::with_keys(&[]).is_err());
        let cfg = MemoryBackendConfig { partition_capacity: Some(0), ..Default::default() };
        assert!(MemoryBackend::new(cfg).is_err());
    }
}
