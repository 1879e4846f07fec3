//! Error types for blok

use thiserror::Error;

/// Message reported when the eKasa API cannot be reached at all
pub const UPSTREAM_UNAVAILABLE_MESSAGE: &str = "FS API is currently unavailable";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// Caller supplied neither a receipt id, a QR code nor a payload
    #[error("A receipt id, QR code or payload is required")]
    MissingSource,

    /// Upstream answered with a non-2xx status
    #[error("Upstream rejected request ({status}): {detail}")]
    UpstreamRejected { status: u16, detail: String },

    /// Upstream could not be reached (connect failure, timeout, broken body)
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Constraint violation at commit that is not a duplicate receipt
    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// HTTP-style status code a transport layer should report for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingSource => 400,
            Self::NotFound(_) => 404,
            Self::StorageConflict(_) => 409,
            Self::Validation(_) => 422,
            Self::UpstreamRejected { status, .. } => *status,
            Self::UpstreamUnavailable(_) => 503,
            _ => 500,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::UpstreamRejected {
                status: clamp_status(status.as_u16()),
                detail: e.to_string(),
            };
        }
        Self::UpstreamUnavailable(UPSTREAM_UNAVAILABLE_MESSAGE.to_string())
    }
}

/// Keep upstream status codes inside the valid HTTP range, falling back to 502
pub fn clamp_status(status: u16) -> u16 {
    if (100..=599).contains(&status) {
        status
    } else {
        502
    }
}

pub type Result<T> = std::result::Result<T, Error>;
