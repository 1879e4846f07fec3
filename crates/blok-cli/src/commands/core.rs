//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Shared utility to resolve configuration
//! - `cmd_init` - Initialize the database
//! - `cmd_health` - Database liveness check

use std::path::Path;

use anyhow::{Context, Result};
use blok_core::{config::Config, db::Database};

use super::print_json;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Embedded defaults, then the override file, then environment
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("Failed to load configuration")
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;

    db.seed_default_categories()
        .context("Failed to seed default categories")?;
    println!("   Seeded default categories and rules");

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Fetch a receipt: blok fetch --receipt-id <id>");
    println!("  2. See spending:    blok stats");

    Ok(())
}

pub fn cmd_health(db: &Database, json: bool) -> Result<()> {
    db.health_check().context("Database health check failed")?;

    if json {
        print_json(&serde_json::json!({ "status": "ok" }))?;
    } else {
        println!("✅ Database OK ({})", db.path());
    }

    Ok(())
}
