//! Receipt command implementations

use std::path::Path;

use anyhow::{bail, Context, Result};
use blok_core::{
    config::Config,
    db::Database,
    fs_client::{FsClient, ReceiptFetcher},
    ingest::{ingest, IngestRequest},
    models::{Receipt, ReceiptDetail, UNCATEGORIZED_LABEL},
};

use super::{print_json, truncate};

/// Read a JSON receipt payload from a file
pub fn read_payload(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Payload file {} is not valid JSON", path.display()))
}

pub async fn cmd_fetch(
    db: &Database,
    config: &Config,
    request: IngestRequest,
    json: bool,
) -> Result<()> {
    let client = FsClient::from_config(&config.upstream)?;
    cmd_fetch_with(db, &client, request, json).await
}

/// Ingest with an explicit fetcher
pub async fn cmd_fetch_with(
    db: &Database,
    fetcher: &dyn ReceiptFetcher,
    request: IngestRequest,
    json: bool,
) -> Result<()> {
    let detail = ingest(db, fetcher, request).await.map_err(|e| {
        let status = e.status_code();
        anyhow::Error::new(e).context(format!("Receipt ingest failed (status {})", status))
    })?;

    if json {
        return print_json(&detail);
    }

    println!("✅ Stored receipt {}", detail.receipt.external_id);
    print_receipt_detail(&detail);
    Ok(())
}

/// Requested list size, capped by `receipts.list_limit_max`
pub fn effective_list_limit(requested: u32, config: &Config) -> u32 {
    requested.min(config.receipts.list_limit_max)
}

pub fn cmd_receipts_list(db: &Database, limit: u32, json: bool) -> Result<()> {
    let receipts = db.list_receipts(limit)?;

    if json {
        return print_json(&receipts);
    }

    if receipts.is_empty() {
        println!("No receipts stored. Add one with:");
        println!("  blok fetch --receipt-id <id>");
        return Ok(());
    }

    println!();
    println!("🧾 Receipts ({})", receipts.len());
    println!("{}", "─".repeat(78));

    for receipt in &receipts {
        print_receipt_line(receipt);
    }

    Ok(())
}

pub fn cmd_receipts_show(db: &Database, receipt_id: &str, json: bool) -> Result<()> {
    let Some(detail) = db.get_receipt_detail(receipt_id.trim())? else {
        bail!("Receipt '{}' not found", receipt_id);
    };

    if json {
        return print_json(&detail);
    }

    print_receipt_detail(&detail);
    Ok(())
}

fn print_receipt_line(receipt: &Receipt) {
    let date = receipt
        .issue_date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "no date".to_string());
    let total = receipt
        .total_amount
        .map(|t| format!("{:.2}", t))
        .unwrap_or_else(|| "-".to_string());

    println!(
        "  {:<24} {:<16} {:>10}  {} [{}]",
        truncate(&receipt.external_id, 24),
        date,
        total,
        truncate(receipt.merchant_name.as_deref().unwrap_or("Unknown"), 20),
        receipt.source
    );
}

fn print_receipt_detail(detail: &ReceiptDetail) {
    let receipt = &detail.receipt;

    println!();
    println!(
        "🧾 {} - {}",
        receipt.external_id,
        receipt.merchant_name.as_deref().unwrap_or("Unknown merchant")
    );
    if let Some(date) = receipt.issue_date {
        println!("   Issued: {} UTC", date.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(total) = receipt.total_amount {
        println!("   Total:  {:.2}", total);
    }
    println!("   Source: {}", receipt.source);
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {:30} │ {:>8} │ {:>10} │ {}",
        "Item", "Qty", "Price", "Category"
    );
    println!("   ───────────────────────────────┼──────────┼────────────┼─────────────");

    for item in &detail.items {
        let price = item
            .item
            .total_price
            .map(|p| format!("{:.2}", p))
            .unwrap_or_else(|| "-".to_string());
        let category = item
            .category
            .as_deref()
            .or(item.item.suggested_category.as_deref())
            .unwrap_or(UNCATEGORIZED_LABEL);

        println!(
            "   {:30} │ {:>8} │ {:>10} │ {}",
            truncate(&item.item.name, 30),
            item.item.quantity.normalize().to_string(),
            price,
            category
        );
    }
}
