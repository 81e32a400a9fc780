use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::types::{AttributeValue as SdkValue, PutRequest, WriteRequest};

use ingest_api::{AttributeValue, IngestError, Item, MAX_BATCH_SIZE, StorageBackend};

// ═══════════════════════════════════════════════════════════════
//  DynamoBackend
// ═══════════════════════════════════════════════════════════════

/// `BatchWriteItem` against one table. Credentials and region come from the
/// standard AWS provider chain.
pub struct DynamoBackend {
    client: Client,
    table: String,
}

impl DynamoBackend {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self { client, table: table.into() }
    }

    /// Load the default AWS config, optionally pointed at a local endpoint
    /// (DynamoDB Local, LocalStack).
    pub async fn connect(table: impl Into<String>, endpoint_url: Option<String>) -> Result<Self, IngestError> {
        let table = table.into();
        if table.is_empty() {
            return Err(IngestError::config("table name must not be empty"));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(url) = endpoint_url {
            tracing::info!(endpoint = %url, "using custom DynamoDB endpoint");
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;
        Ok(Self::new(Client::new(&config), table))
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl StorageBackend for DynamoBackend {
    fn name(&self) -> &str {
        "dynamodb"
    }

    fn batch_write<'a>(
        &'a self,
        items: &'a [Item],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Item>, IngestError>> + Send + 'a>> {
        Box::pin(async move {
            if items.len() > MAX_BATCH_SIZE {
                return Err(IngestError::config(format!(
                    "batch of {} items exceeds the BatchWriteItem limit of {MAX_BATCH_SIZE}",
                    items.len()
                )));
            }

            let requests = items.iter().map(put_request).collect::<Result<Vec<_>, _>>()?;

            let output = self
                .client
                .batch_write_item()
                .request_items(self.table.clone(), requests)
                .send()
                .await
                .map_err(|e| classify_error(&e))?;

            let Some(pending) = output.unprocessed_items().and_then(|m| m.get(&self.table)) else {
                return Ok(Vec::new());
            };

            let mut unprocessed = Vec::with_capacity(pending.len());
            for request in pending {
                if let Some(put) = request.put_request() {
                    unprocessed.push(from_sdk_item(put.item())?);
                }
            }
            if !unprocessed.is_empty() {
                tracing::debug!(table = %self.table, unprocessed = unprocessed.len(), "BatchWriteItem returned unprocessed items");
            }
            Ok(unprocessed)
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Conversion
// ═══════════════════════════════════════════════════════════════

fn put_request(item: &Item) -> Result<WriteRequest, IngestError> {
    let put = PutRequest::builder()
        .set_item(Some(to_sdk_item(item)))
        .build()
        .map_err(|e| IngestError::format_err(format!("put request: {e}")))?;
    Ok(WriteRequest::builder().put_request(put).build())
}

fn to_sdk_item(item: &Item) -> HashMap<String, SdkValue> {
    item.iter()
        .map(|(name, value)| {
            let value = match value {
                AttributeValue::S(s) => SdkValue::S(s.clone()),
                AttributeValue::N(n) => SdkValue::N(n.clone()),
                AttributeValue::Bool(b) => SdkValue::Bool(*b),
            };
            (name.clone(), value)
        })
        .collect()
}

fn from_sdk_item(item: &HashMap<String, SdkValue>) -> Result<Item, IngestError> {
    item.iter()
        .map(|(name, value)| {
            let value = match value {
                SdkValue::S(s) => AttributeValue::S(s.clone()),
                SdkValue::N(n) => AttributeValue::N(n.clone()),
                SdkValue::Bool(b) => AttributeValue::Bool(*b),
                other => {
                    return Err(IngestError::format_err(format!(
                        "unsupported attribute type for '{name}': {other:?}"
                    )));
                }
            };
            Ok((name.clone(), value))
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════

/// Throughput errors are retried as `Throttled`, missing tables and
/// validation failures fail fast as `Config`, everything else is `Io`.
fn classify_error<R: std::fmt::Debug>(err: &SdkError<BatchWriteItemError, R>) -> IngestError {
    let message = format!("{}", DisplayErrorContext(err));
    match err {
        SdkError::ServiceError(service) => classify_code(service.err().code(), message),
        SdkError::ConstructionFailure(_) => IngestError::config(message),
        _ => IngestError::io(message),
    }
}

fn classify_code(code: Option<&str>, message: String) -> IngestError {
    match code {
        Some(
            "ProvisionedThroughputExceededException"
            | "RequestLimitExceeded"
            | "ThrottlingException"
            | "LimitExceededException",
        ) => IngestError::throttled(message),
        Some(
            "ResourceNotFoundException"
            | "ValidationException"
            | "AccessDeniedException"
            | "UnrecognizedClientException",
        ) => IngestError::config(message),
        _ => IngestError::io(message),
    }
}
