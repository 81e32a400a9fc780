use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ingest_api::{RecordFactory, StorageBackend};
use pipeline::Summary;
use records::{DashboardFactory, DashboardRecord, TradeFactory, TradeRecord, UserBehaviorFactory, UserBehaviorRecord};
use storage_dynamodb::DynamoBackend;
use storage_memory::{MemoryBackend, MemoryBackendConfig};

use super::config::{BackendKind, Effective, RecordKind};
use super::error::WriterError;

// ═══════════════════════════════════════════════════════════════
//  Main dispatch
// ═══════════════════════════════════════════════════════════════

/// Build backend + factory, run the pipeline and print the final summary.
pub async fn run(eff: &Effective) -> Result<Summary, WriterError> {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping generation");
            signal_token.cancel();
        }
    });

    tracing::info!(record = ?eff.record, backend = ?eff.backend, seed = eff.seed, "ddb-writer starting");

    let summary = match eff.record {
        RecordKind::Trade => {
            let factory = TradeFactory::new(eff.seed, eff.hot_weight)?;
            drive(eff, factory, TradeRecord::KEY_ATTRIBUTES, TradeRecord::PARTITION_ATTRIBUTE, token).await?
        }
        RecordKind::UserBehavior => {
            let factory = UserBehaviorFactory::new(eff.seed);
            drive(eff, factory, UserBehaviorRecord::KEY_ATTRIBUTES, UserBehaviorRecord::PARTITION_ATTRIBUTE, token).await?
        }
        RecordKind::Dashboard => {
            let factory = DashboardFactory::new(eff.seed);
            drive(eff, factory, DashboardRecord::KEY_ATTRIBUTES, DashboardRecord::PARTITION_ATTRIBUTE, token).await?
        }
    };

    println!("{summary}");
    Ok(summary)
}

async fn drive<F: RecordFactory>(
    eff: &Effective,
    factory: F,
    key_attributes: &[&str],
    partition_attribute: &str,
    token: CancellationToken,
) -> Result<Summary, WriterError> {
    let backend = build_backend(eff, key_attributes, partition_attribute).await?;
    Ok(pipeline::run(&eff.pipeline, factory, backend, token).await?)
}

async fn build_backend(
    eff: &Effective,
    key_attributes: &[&str],
    partition_attribute: &str,
) -> Result<Arc<dyn StorageBackend>, WriterError> {
    match eff.backend {
        BackendKind::Dynamodb => {
            let table = eff
                .table
                .clone()
                .ok_or_else(|| WriterError::Config("table name is required for the dynamodb backend".into()))?;
            let backend = DynamoBackend::connect(table, eff.endpoint_url.clone()).await?;
            tracing::info!(table = backend.table(), "connected");
            Ok(Arc::new(backend))
        }
        BackendKind::Memory => {
            let backend = MemoryBackend::new(MemoryBackendConfig {
                key_attributes: key_attributes.iter().map(|k| k.to_string()).collect(),
                throttle_attribute: Some(
                    eff.memory.throttle_attribute.clone().unwrap_or_else(|| partition_attribute.to_string()),
                ),
                partition_capacity: eff.memory.partition_capacity,
            })?;
            if let Some(cap) = eff.memory.partition_capacity {
                tracing::info!(partition_capacity = cap, "memory backend throttles hot partitions");
            }
            Ok(Arc::new(backend))
        }
    }
}
