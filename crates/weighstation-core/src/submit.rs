//! Delivery of weight records and shift events to the sheet relay.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::models::{ShiftEvent, WeightRecord};
use crate::util::{compact_text, is_http_url, normalize_text_option};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Invalid relay configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Relay HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Relay API error: {0}")]
    Api(String),
}

pub type SubmitResult<T> = Result<T, SubmitError>;

/// Accepts a batch of weight records as a unit: either every record is
/// stored or the call fails.
#[async_trait]
pub trait RecordSubmitter: Send + Sync {
    async fn submit_records(&self, records: &[WeightRecord]) -> SubmitResult<()>;
}

#[async_trait]
pub trait ShiftEventSubmitter: Send + Sync {
    async fn submit_shift_event(&self, event: &ShiftEvent) -> SubmitResult<()>;
}

#[derive(Debug, Serialize)]
struct RecordsRequest {
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct RowRequest {
    row: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// HTTP client for the sheet relay.
#[derive(Debug, Clone)]
pub struct RelayClient {
    base_url: String,
    client: reqwest::Client,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SubmitResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Reachability probe used to decide whether the station is online.
    pub async fn check_health(&self) -> SubmitResult<()> {
        let response = self
            .client
            .get(format!("{}/healthz", self.base_url))
            .send()
            .await?;
        ensure_success(response).await
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> SubmitResult<()> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        ensure_success(response).await
    }
}

#[async_trait]
impl RecordSubmitter for RelayClient {
    async fn submit_records(&self, records: &[WeightRecord]) -> SubmitResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let request = RecordsRequest {
            rows: records.iter().map(WeightRecord::to_row).collect(),
        };
        self.post("/api/records", &request).await
    }
}

#[async_trait]
impl ShiftEventSubmitter for RelayClient {
    async fn submit_shift_event(&self, event: &ShiftEvent) -> SubmitResult<()> {
        let request = RowRequest {
            row: event.to_row(),
        };
        self.post("/api/sheet", &request).await
    }
}

/// Send a shift event in the background.
///
/// Delivery is attempted once; failures are logged and never retried.
pub fn dispatch_shift_event(
    submitter: Arc<dyn ShiftEventSubmitter>,
    event: ShiftEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match submitter.submit_shift_event(&event).await {
            Ok(()) => tracing::info!(
                action = %event.action,
                operator = %event.operator_name,
                "Shift event recorded"
            ),
            Err(error) => tracing::warn!(
                action = %event.action,
                operator = %event.operator_name,
                "Failed to record shift event: {error}"
            ),
        }
    })
}

async fn ensure_success(response: reqwest::Response) -> SubmitResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(SubmitError::Api(parse_api_error(status, &body)))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<RelayErrorBody>(body) {
        if let Some(message) = payload.error.or(payload.message) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> SubmitResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        SubmitError::InvalidConfiguration("relay URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(SubmitError::InvalidConfiguration(
            "relay URL must include http:// or https://".to_string(),
        ))
    }
}
