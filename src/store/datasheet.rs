//! Datasheet HTTP client
//!
//! Implements [`RecordStore`] against a Vika-style datasheet fusion API.
//! Every response arrives in an envelope `{success, code, message, data}`;
//! an envelope code of 429 (or an HTTP 429) is the store's throttling
//! signal and maps to [`StoreError::RateLimited`] so the retry policy can
//! act on it.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{Record, RecordStore, StoreError, StoreResult};
use async_trait::async_trait;

/// Default datasheet API base URL.
const DEFAULT_API_BASE: &str = "https://api.vika.cn/fusion/v1";
/// Envelope code the store uses for request-rate throttling.
const RATE_LIMIT_CODE: i64 = 429;
/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Connection timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the datasheet client.
#[derive(Debug, Clone)]
pub struct DatasheetConfig {
    /// API access token.
    pub token: String,
    /// Identifier of the datasheet holding the book records.
    pub datasheet_id: String,
    /// API base URL; override to point tests at a local mock.
    pub api_base: String,
}

impl DatasheetConfig {
    /// Create a config with the default API base.
    pub fn new(token: impl Into<String>, datasheet_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            datasheet_id: datasheet_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Override the API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Expects:
    /// - `VIKA_TOKEN`: datasheet API access token
    /// - `DATASHEET_ID`: identifier of the book datasheet
    /// - `VIKA_API_BASE` (optional): base URL override
    pub fn from_env() -> StoreResult<Self> {
        let token = std::env::var("VIKA_TOKEN")
            .map_err(|_| StoreError::Api("VIKA_TOKEN environment variable not set".to_string()))?;
        let datasheet_id = std::env::var("DATASHEET_ID").map_err(|_| {
            StoreError::Api("DATASHEET_ID environment variable not set".to_string())
        })?;

        let mut config = Self::new(token, datasheet_id);
        if let Ok(base) = std::env::var("VIKA_API_BASE") {
            config = config.with_api_base(base);
        }
        Ok(config)
    }
}

/// Response envelope wrapping every datasheet API reply.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

/// `data` payload for record reads and writes.
#[derive(Debug, Deserialize)]
struct RecordsData {
    records: Vec<Record>,
}

/// Body for record creation.
#[derive(Debug, Serialize)]
struct CreateBody {
    records: Vec<CreateRecord>,
    #[serde(rename = "fieldKey")]
    field_key: &'static str,
}

#[derive(Debug, Serialize)]
struct CreateRecord {
    fields: Map<String, Value>,
}

/// Body for record updates.
#[derive(Debug, Serialize)]
struct UpdateBody {
    records: Vec<UpdateRecord>,
    #[serde(rename = "fieldKey")]
    field_key: &'static str,
}

#[derive(Debug, Serialize)]
struct UpdateRecord {
    #[serde(rename = "recordId")]
    record_id: String,
    fields: Map<String, Value>,
}

/// HTTP client for a single datasheet.
///
/// Construct once at process start and share via `Arc`; the inner reqwest
/// client pools connections internally.
pub struct DatasheetClient {
    client: Client,
    config: DatasheetConfig,
}

impl DatasheetClient {
    /// Create a new client for the configured datasheet.
    pub fn new(config: DatasheetConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::Api(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(DatasheetConfig::from_env()?)
    }

    fn records_url(&self) -> String {
        format!(
            "{}/datasheets/{}/records",
            self.config.api_base, self.config.datasheet_id
        )
    }

    /// Decode a response envelope, translating HTTP and envelope failures
    /// into the store error taxonomy. This is the single place the
    /// throttling and failure-envelope rules live.
    async fn decode_envelope<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> StoreResult<Envelope<T>> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StoreError::RateLimited(
                "datasheet API rate limit exceeded".to_string(),
            ));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound("record not found".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api(format!("HTTP {status}: {body}")));
        }

        let envelope: Envelope<T> = response.json().await?;
        if envelope.code == RATE_LIMIT_CODE {
            return Err(StoreError::RateLimited(
                envelope
                    .message
                    .unwrap_or_else(|| "datasheet API rate limit exceeded".to_string()),
            ));
        }
        if !envelope.success {
            return Err(StoreError::Api(
                envelope
                    .message
                    .unwrap_or_else(|| "datasheet API reported failure".to_string()),
            ));
        }
        Ok(envelope)
    }

    /// Decode a response whose envelope must carry a data payload.
    async fn decode<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> StoreResult<T> {
        self.decode_envelope(response)
            .await?
            .data
            .ok_or_else(|| StoreError::Malformed("successful envelope without data".to_string()))
    }
}

#[async_trait]
impl RecordStore for DatasheetClient {
    async fn query(&self) -> StoreResult<Vec<Record>> {
        let response = self
            .client
            .get(self.records_url())
            .bearer_auth(&self.config.token)
            .query(&[("fieldKey", "name")])
            .send()
            .await?;

        let data: RecordsData = self.decode(response).await?;
        debug!(count = data.records.len(), "queried datasheet records");
        Ok(data.records)
    }

    async fn get(&self, record_id: &str) -> StoreResult<Record> {
        let response = self
            .client
            .get(self.records_url())
            .bearer_auth(&self.config.token)
            .query(&[("recordIds", record_id), ("fieldKey", "name")])
            .send()
            .await?;

        let data: RecordsData = self.decode(response).await?;
        data.records
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(record_id.to_string()))
    }

    async fn create(&self, fields: Map<String, Value>) -> StoreResult<Record> {
        let body = CreateBody {
            records: vec![CreateRecord { fields }],
            field_key: "name",
        };

        let response = self
            .client
            .post(self.records_url())
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await?;

        let data: RecordsData = self.decode(response).await?;
        data.records
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Malformed("create returned no record".to_string()))
    }

    async fn update(&self, record_id: &str, fields: Map<String, Value>) -> StoreResult<Record> {
        let body = UpdateBody {
            records: vec![UpdateRecord {
                record_id: record_id.to_string(),
                fields,
            }],
            field_key: "name",
        };

        let response = self
            .client
            .patch(self.records_url())
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await?;

        let data: RecordsData = self.decode(response).await?;
        data.records
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Malformed("update returned no record".to_string()))
    }

    async fn delete(&self, record_ids: &[String]) -> StoreResult<()> {
        let response = self
            .client
            .delete(self.records_url())
            .bearer_auth(&self.config.token)
            .query(&[("recordIds", record_ids.join(","))])
            .send()
            .await?;

        // Delete replies carry no data payload worth keeping.
        self.decode_envelope::<Value>(response).await?;
        Ok(())
    }
}
