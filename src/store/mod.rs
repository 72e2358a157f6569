//! Remote tabular-store abstraction
//!
//! This module defines the record shape and the five primitive operations
//! the gateway needs from the remote store. The trait keeps the store
//! swappable: production uses the datasheet HTTP client, tests plug in an
//! in-memory double.

pub mod datasheet;
pub mod retry;

pub use datasheet::{DatasheetClient, DatasheetConfig};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A record as stored in the remote datasheet: a store-assigned id plus a
/// free-form field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned record identifier, immutable after creation.
    #[serde(rename = "recordId")]
    pub record_id: String,
    /// Field name to value mapping.
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create a record with the given id and fields.
    pub fn new(record_id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            record_id: record_id.into(),
            fields,
        }
    }
}

/// Error type for remote store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected the call for exceeding its request-rate limit.
    /// This is the only error the retry policy will retry.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The requested record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The store answered but reported failure.
    #[error("store API error: {0}")]
    Api(String),

    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store reported success but the payload was empty or undecodable.
    #[error("malformed store response: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Whether this error is the store's throttling signal.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, StoreError::RateLimited(_))
    }
}

/// Result type for remote store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// The primitive operations the gateway needs from the remote store.
///
/// Implementations may fail with [`StoreError::RateLimited`] at any time;
/// callers are expected to wrap calls in a [`RetryPolicy`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch all records in store order.
    async fn query(&self) -> StoreResult<Vec<Record>>;

    /// Fetch a single record by id. Absence is `StoreError::NotFound`.
    async fn get(&self, record_id: &str) -> StoreResult<Record>;

    /// Create one record from a field map, returning it with its assigned id.
    async fn create(&self, fields: Map<String, Value>) -> StoreResult<Record>;

    /// Overwrite the given fields of an existing record.
    async fn update(&self, record_id: &str, fields: Map<String, Value>) -> StoreResult<Record>;

    /// Delete the records with the given ids.
    async fn delete(&self, record_ids: &[String]) -> StoreResult<()>;
}

// Stores are shared via `Arc` at the server layer; delegate so an
// `Arc<S>` is usable wherever a store is expected.
#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    async fn query(&self) -> StoreResult<Vec<Record>> {
        (**self).query().await
    }

    async fn get(&self, record_id: &str) -> StoreResult<Record> {
        (**self).get(record_id).await
    }

    async fn create(&self, fields: Map<String, Value>) -> StoreResult<Record> {
        (**self).create(fields).await
    }

    async fn update(&self, record_id: &str, fields: Map<String, Value>) -> StoreResult<Record> {
        (**self).update(record_id, fields).await
    }

    async fn delete(&self, record_ids: &[String]) -> StoreResult<()> {
        (**self).delete(record_ids).await
    }
}
