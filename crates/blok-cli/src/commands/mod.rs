//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, health) and shared utilities (open_db, load_config)
//! - `receipts` - Receipt ingestion and listing
//! - `stats` - Monthly spending statistics
//! - `categories` - Category and rule management

pub mod categories;
pub mod core;
pub mod receipts;
pub mod stats;

// Re-export command functions for main.rs
pub use categories::*;
pub use core::*;
pub use receipts::*;
pub use stats::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a value as pretty JSON (for --json)
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
