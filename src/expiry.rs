//! # Expiry Dates Module
//!
//! Helpers for the ISO-8601 expiry strings stored on list items, and the
//! optional AI-assisted expiry suggestion service. Suggestions are never
//! required: any failure simply means no date is pre-filled.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::list_errors::{ListError, ListResult};

/// Marker the prediction service returns when it has no estimate
pub const UNKNOWN_EXPIRY: &str = "Unknown";

/// Result of asking for a suggested expiry date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryPrediction {
    /// Normalized ISO-8601 timestamp
    Date(String),
    Unknown,
}

impl ExpiryPrediction {
    pub fn into_date(self) -> Option<String> {
        match self {
            ExpiryPrediction::Date(date) => Some(date),
            ExpiryPrediction::Unknown => None,
        }
    }
}

/// Expiry suggestion collaborator
#[async_trait]
pub trait ExpiryPredictor: Send + Sync {
    async fn predict_expiry(&self, item_name: &str) -> ListResult<ExpiryPrediction>;
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date
pub fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Normalize an expiry string to `2025-08-01T00:00:00.000Z` form
pub fn normalize_expiry(value: &str) -> Option<String> {
    parse_expiry(value).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Earliest parseable date among the given expiries
pub fn earliest_expiry(expiries: &[String]) -> Option<DateTime<Utc>> {
    expiries.iter().filter_map(|e| parse_expiry(e)).min()
}

/// Interpret the body returned by the prediction service
pub fn parse_prediction(body: &str) -> ListResult<ExpiryPrediction> {
    let response: PredictionResponse = serde_json::from_str(body)
        .map_err(|e| ListError::Prediction(format!("malformed prediction response: {e}")))?;

    let raw = response.expiry.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(UNKNOWN_EXPIRY) {
        return Ok(ExpiryPrediction::Unknown);
    }

    match normalize_expiry(raw) {
        Some(date) => Ok(ExpiryPrediction::Date(date)),
        None => {
            warn!("Prediction service returned an unparseable date: {}", raw);
            Ok(ExpiryPrediction::Unknown)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictionRequest<'a> {
    item_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    expiry: String,
}

/// Expiry predictor backed by an HTTP JSON endpoint
#[derive(Debug, Clone)]
pub struct HttpExpiryPredictor {
    client: Client,
    endpoint: String,
}

impl HttpExpiryPredictor {
    pub fn new(endpoint: &str, timeout_secs: u64) -> ListResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ListError::Prediction(e.to_string()))?;
        Ok(Self { client, endpoint: endpoint.to_string() })
    }
}

#[async_trait]
impl ExpiryPredictor for HttpExpiryPredictor {
    async fn predict_expiry(&self, item_name: &str) -> ListResult<ExpiryPrediction> {
        debug!("Requesting expiry prediction for '{}'", item_name);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&PredictionRequest { item_name })
            .send()
            .await
            .map_err(|e| ListError::Prediction(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ListError::Prediction(e.to_string()))?;

        if !status.is_success() {
            return Err(ListError::Prediction(format!("status {status}: {body}")));
        }

        parse_prediction(&body)
    }
}
