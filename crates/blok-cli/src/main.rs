//! blok CLI - Receipt ingestion and spending statistics
//!
//! Usage:
//!   blok init                         Initialize database, seed categories
//!   blok fetch --receipt-id ID        Ingest a receipt from eKasa
//!   blok fetch --payload FILE         Ingest a receipt from a JSON file
//!   blok stats --year 2024 --month 3  Spending per category

mod cli;
mod commands;


use anyhow::Result;
use blok_core::ingest::IngestRequest;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Fetch {
            receipt_id,
            qr_code,
            payload,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let payload = payload
                .as_deref()
                .map(commands::read_payload)
                .transpose()?;
            let request = IngestRequest {
                receipt_id,
                qr_code,
                payload,
            };
            commands::cmd_fetch(&db, &config, request, cli.json).await
        }
        Commands::Receipts { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action.unwrap_or(ReceiptsAction::List {
                limit: DEFAULT_RECEIPTS_LIMIT,
            }) {
                ReceiptsAction::List { limit } => {
                    let config = commands::load_config(cli.config.as_deref())?;
                    let limit = commands::effective_list_limit(limit, &config);
                    commands::cmd_receipts_list(&db, limit, cli.json)
                }
                ReceiptsAction::Show { receipt_id } => {
                    commands::cmd_receipts_show(&db, &receipt_id, cli.json)
                }
            }
        }
        Commands::Stats { year, month } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_stats(&db, year, month, cli.json)
        }
        Commands::Categories { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(CategoriesAction::List) => commands::cmd_categories_list(&db, cli.json),
                Some(CategoriesAction::Add { name, description }) => {
                    commands::cmd_categories_add(&db, &name, description.as_deref())
                }
                Some(CategoriesAction::Delete { name }) => {
                    commands::cmd_categories_delete(&db, &name)
                }
            }
        }
        Commands::Rules { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(RulesAction::List) => commands::cmd_rules_list(&db, cli.json),
                Some(RulesAction::Add {
                    category,
                    pattern,
                    priority,
                }) => commands::cmd_rules_add(&db, &category, &pattern, priority),
                Some(RulesAction::Delete { id }) => commands::cmd_rules_delete(&db, id),
                Some(RulesAction::Test { item, merchant }) => {
                    commands::cmd_rules_test(&db, &item, merchant.as_deref(), cli.json)
                }
            }
        }
        Commands::Health => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_health(&db, cli.json)
        }
    }
}
