//! Receipt ingestion workflow
//!
//! Picks the payload source, tags it, hands it to the persistence layer and
//! returns the stored receipt with its classified items. A directly supplied
//! payload wins over upstream lookup keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::fs_client::ReceiptFetcher;
use crate::models::{ReceiptDetail, ReceiptSource};

/// What to ingest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    pub receipt_id: Option<String>,
    pub qr_code: Option<String>,
    /// A complete receipt payload; skips the upstream call
    pub payload: Option<Value>,
}

impl IngestRequest {
    pub fn from_payload(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            ..Default::default()
        }
    }

    pub fn from_receipt_id(receipt_id: impl Into<String>) -> Self {
        Self {
            receipt_id: Some(receipt_id.into()),
            ..Default::default()
        }
    }

    pub fn from_qr_code(qr_code: impl Into<String>) -> Self {
        Self {
            qr_code: Some(qr_code.into()),
            ..Default::default()
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

/// Ingest one receipt and return it with its items
pub async fn ingest(
    db: &Database,
    fetcher: &dyn ReceiptFetcher,
    request: IngestRequest,
) -> Result<ReceiptDetail> {
    let IngestRequest {
        receipt_id,
        qr_code,
        payload,
    } = request;

    let (payload, source) = match payload {
        Some(payload) => (payload, ReceiptSource::Manual),
        None => {
            if is_blank(receipt_id.as_deref()) && is_blank(qr_code.as_deref()) {
                return Err(Error::MissingSource);
            }
            let payload = fetcher
                .fetch_receipt(receipt_id.as_deref(), qr_code.as_deref())
                .await?;
            (payload, ReceiptSource::Fs)
        }
    };

    let receipt = db.persist_receipt(&payload, source)?;
    info!(external_id = %receipt.external_id, source = %source, "Receipt ingested");

    db.get_receipt_detail(&receipt.external_id)?
        .ok_or_else(|| Error::NotFound(format!("Receipt {}", receipt.external_id)))
}
