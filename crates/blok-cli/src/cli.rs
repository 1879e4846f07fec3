//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// blok - Receipt ingestion and monthly spending by category
#[derive(Parser)]
#[command(name = "blok")]
#[command(about = "Collect eKasa receipts, categorize items, report monthly spending", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "blok.db", global = true)]
    pub db: PathBuf,

    /// Config file (defaults to ~/.local/share/blok/config/blok.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set BLOK_DB_KEY environment variable with your passphrase.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed default categories
    Init,

    /// Ingest a receipt from the eKasa API or from a JSON file
    Fetch {
        /// Receipt id printed on the receipt (e.g. O-7A2B...)
        #[arg(long)]
        receipt_id: Option<String>,

        /// Raw content of the receipt QR code
        #[arg(long)]
        qr_code: Option<String>,

        /// JSON payload file; skips the eKasa lookup
        #[arg(long)]
        payload: Option<PathBuf>,
    },

    /// Show stored receipts
    Receipts {
        #[command(subcommand)]
        action: Option<ReceiptsAction>,
    },

    /// Spending per category for one month
    Stats {
        /// Year (defaults to the current year, UTC)
        #[arg(long)]
        year: Option<i32>,

        /// Month 1-12 (defaults to the current month, UTC)
        #[arg(long)]
        month: Option<u32>,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Manage classification rules
    Rules {
        #[command(subcommand)]
        action: Option<RulesAction>,
    },

    /// Check that the database answers queries
    Health,
}

/// Rows shown by `blok receipts` without an explicit --limit
pub const DEFAULT_RECEIPTS_LIMIT: u32 = 20;

#[derive(Subcommand)]
pub enum ReceiptsAction {
    /// List receipts, newest first
    List {
        /// Maximum number of receipts to show
        #[arg(short, long, default_value_t = DEFAULT_RECEIPTS_LIMIT)]
        limit: u32,
    },

    /// Show a receipt with its items
    Show {
        /// Receipt id as assigned by eKasa
        receipt_id: String,
    },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List categories
    List,

    /// Add a category
    Add {
        /// Category name
        name: String,

        /// Optional description
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a category and its rules (items keep their category snapshot)
    Delete {
        /// Category name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// List rules in the order they are checked
    List,

    /// Add a new rule
    Add {
        /// Category to assign when the rule matches
        category: String,
        /// Substring matched against "item name + merchant name" (case-insensitive)
        pattern: String,
        /// Rule priority (higher = checked first)
        #[arg(long, default_value = "0")]
        priority: i32,
    },

    /// Delete a rule
    Delete {
        /// Rule ID to delete
        id: i64,
    },

    /// Test which rules match an item
    Test {
        /// Item name
        item: String,
        /// Merchant name
        #[arg(long)]
        merchant: Option<String>,
    },
}
