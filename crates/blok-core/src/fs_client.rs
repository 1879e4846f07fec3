//! eKasa receipt lookup client
//!
//! One POST per lookup, bounded by a fixed timeout, no retries. Upstream
//! failures are split into two kinds: the API answered with an error status
//! (`UpstreamRejected`, carrying its status and body), or it could not be
//! reached at all (`UpstreamUnavailable`, always 503).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::error::{clamp_status, Error, Result};

/// Detail used when an error response has neither a body nor a reason phrase
pub const FALLBACK_ERROR_DETAIL: &str = "FS API error";

/// Source of raw receipt payloads
#[async_trait]
pub trait ReceiptFetcher: Send + Sync {
    /// Fetch a receipt by id and/or QR code; at least one must be non-blank
    async fn fetch_receipt(&self, receipt_id: Option<&str>, qr_code: Option<&str>)
        -> Result<Value>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindReceiptRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    qr_code: Option<&'a str>,
}

/// HTTP client for the Financial Administration "find receipt" endpoint
#[derive(Debug, Clone)]
pub struct FsClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl FsClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        Self::new(&config.url, config.timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ReceiptFetcher for FsClient {
    async fn fetch_receipt(
        &self,
        receipt_id: Option<&str>,
        qr_code: Option<&str>,
    ) -> Result<Value> {
        let request = FindReceiptRequest {
            receipt_id: receipt_id.map(str::trim).filter(|s| !s.is_empty()),
            qr_code: qr_code.map(str::trim).filter(|s| !s.is_empty()),
        };
        if request.receipt_id.is_none() && request.qr_code.is_none() {
            return Err(Error::MissingSource);
        }

        debug!(
            url = %self.url,
            receipt_id = request.receipt_id.unwrap_or(""),
            has_qr_code = request.qr_code.is_some(),
            "Fetching receipt from FS API"
        );

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "FS API unreachable");
                Error::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or(FALLBACK_ERROR_DETAIL)
                    .to_string()
            } else {
                body
            };
            warn!(status = status.as_u16(), detail = %detail, "FS API rejected request");
            return Err(Error::UpstreamRejected {
                status: clamp_status(status.as_u16()),
                detail,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                warn!(error = %e, "FS API returned a body that is not JSON");
                Error::UpstreamRejected {
                    status: 502,
                    detail: "FS API returned invalid JSON".to_string(),
                }
            } else {
                warn!(error = %e, "FS API response body failed");
                Error::from(e)
            }
        })
    }
}
