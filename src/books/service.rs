//! Resource operations for the book collection.
//!
//! One async operation per CRUD verb. Every remote call is routed through
//! the retry policy; update, patch and delete additionally confirm the
//! target record exists immediately before mutating it. Absence (or an
//! existence check that errors out) is reported as not-found rather than
//! attempted as a blind write.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error};

use super::{Book, BookFields, BookStatus, FIELD_STATUS};
use crate::store::{RecordStore, RetryPolicy, StoreError};

/// Error type for resource operations, the gateway's client-facing taxonomy.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid input, rejected before any remote call.
    #[error("{0}")]
    Validation(String),

    /// The target book does not exist (or its existence could not be
    /// confirmed).
    #[error("book not found")]
    NotFound,

    /// The store kept throttling past the retry budget.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other upstream failure.
    #[error("{0}")]
    Upstream(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RateLimited(msg) => ServiceError::RateLimited(msg),
            StoreError::NotFound(_) => ServiceError::NotFound,
            StoreError::Api(msg) | StoreError::Malformed(msg) => ServiceError::Upstream(msg),
            StoreError::Http(e) => ServiceError::Upstream(e.to_string()),
        }
    }
}

/// Result type for resource operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// CRUD operations over the book datasheet.
///
/// Holds the store client by value (shared via `Arc` at the server layer)
/// and a retry policy applied to every remote call. No state is shared
/// between concurrent operations.
pub struct BookService<S: RecordStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: RecordStore> BookService<S> {
    /// Create a service with the default retry policy (3 attempts, 500ms
    /// initial backoff).
    pub fn new(store: S) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy. Tests use this to shrink backoff delays.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// List all books in store order, including any store-specific fields.
    pub async fn list(&self) -> ServiceResult<Vec<Book>> {
        let records = self.retry.run(|| self.store.query()).await?;
        debug!(count = records.len(), "listing books");

        records
            .into_iter()
            .map(|record| Book::from_record(record).map_err(ServiceError::Upstream))
            .collect()
    }

    /// Fetch a single book by id.
    pub async fn get(&self, id: &str) -> ServiceResult<Book> {
        let record = self.retry.run(|| self.store.get(id)).await?;
        Book::from_record(record).map_err(ServiceError::Upstream)
    }

    /// Create a book from validated fields, returning it with its assigned
    /// id.
    pub async fn create(&self, fields: BookFields) -> ServiceResult<Book> {
        let field_map = fields.into_fields();
        let record = self
            .retry
            .run(|| self.store.create(field_map.clone()))
            .await?;
        debug!(id = %record.record_id, "created book");
        Book::from_record(record).map_err(ServiceError::Upstream)
    }

    /// Replace all fields of an existing book.
    ///
    /// The existence check runs first; any failure there, including
    /// ambiguous upstream errors, is reported as not-found so a blind write
    /// is never attempted against a missing record.
    ///
    /// Full updates surface every mutation-step failure as a generic
    /// upstream error: rate limiting is still retried, but exhaustion here
    /// is a 500 rather than a 429. This matches the endpoint's contract
    /// (PUT fails with 400/404/500 only) where the status patch keeps the
    /// 429 path.
    pub async fn update(&self, id: &str, fields: BookFields) -> ServiceResult<Book> {
        self.check_exists(id).await?;

        let field_map = fields.into_fields();
        let record = self
            .retry
            .run(|| self.store.update(id, field_map.clone()))
            .await
            .map_err(|err| match err {
                StoreError::RateLimited(msg) => ServiceError::Upstream(msg),
                other => ServiceError::from(other),
            })?;
        debug!(id = %record.record_id, "updated book");
        Book::from_record(record).map_err(ServiceError::Upstream)
    }

    /// Update only the lending status of an existing book.
    pub async fn update_status(&self, id: &str, status: BookStatus) -> ServiceResult<Book> {
        self.check_exists(id).await?;

        let mut field_map = Map::new();
        field_map.insert(
            FIELD_STATUS.to_string(),
            Value::String(status.as_str().to_string()),
        );
        let record = self
            .retry
            .run(|| self.store.update(id, field_map.clone()))
            .await?;
        debug!(id = %record.record_id, status = %status, "updated book status");
        Book::from_record(record).map_err(ServiceError::Upstream)
    }

    /// Delete a book by id.
    ///
    /// The delete call itself is a single attempt; a failure there is an
    /// upstream error, not a not-found.
    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.check_exists(id).await?;

        let ids = [id.to_string()];
        match self.store.delete(&ids).await {
            Ok(()) => {
                debug!(id, "deleted book");
                Ok(())
            }
            Err(err) => {
                error!(id, error = %err, "delete failed");
                Err(ServiceError::Upstream(err.to_string()))
            }
        }
    }

    /// Confirm the record exists before a mutation. Every failure mode maps
    /// to not-found: when in doubt, refuse the write.
    async fn check_exists(&self, id: &str) -> ServiceResult<()> {
        match self.retry.run(|| self.store.get(id)).await {
            Ok(_) => Ok(()),
            Err(err) => {
                debug!(id, error = %err, "existence check failed");
                Err(ServiceError::NotFound)
            }
        }
    }
}
