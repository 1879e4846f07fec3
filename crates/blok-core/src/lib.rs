//! Blok Core Library
//!
//! Shared functionality for the blok receipt tool:
//! - Payload normalization for eKasa and hand-supplied receipts
//! - Rule-based item classification
//! - eKasa "find receipt" client
//! - Database access, deduplicated persistence and monthly statistics
//! - Configuration loading

pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod fs_client;
pub mod ingest;
pub mod models;
pub mod normalize;

/// Test utilities including mock eKasa server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use classify::{classify, Classification};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use fs_client::{FsClient, ReceiptFetcher};
pub use ingest::{ingest, IngestRequest};
pub use normalize::{normalize, NormalizedItem, NormalizedReceipt};
