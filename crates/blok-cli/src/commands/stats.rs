//! Statistics command implementations

use anyhow::{Context, Result};
use blok_core::db::Database;
use chrono::{Datelike, Utc};

use super::{print_json, truncate};

/// Resolve the reporting period, defaulting to the current UTC month
pub fn resolve_period(year: Option<i32>, month: Option<u32>) -> (i32, u32) {
    let today = Utc::now().date_naive();
    (
        year.unwrap_or_else(|| today.year()),
        month.unwrap_or_else(|| today.month()),
    )
}

pub fn cmd_stats(db: &Database, year: Option<i32>, month: Option<u32>, json: bool) -> Result<()> {
    let (year, month) = resolve_period(year, month);
    let report = db
        .stats_report(year, month)
        .with_context(|| format!("Failed to compute statistics for {}-{:02}", year, month))?;

    if json {
        return print_json(&report);
    }

    if report.totals.is_empty() {
        println!("No dated receipts for {}-{:02}", year, month);
        return Ok(());
    }

    println!();
    println!("📊 Spending by category, {}-{:02}", year, month);
    println!("   ─────────────────────────────────────");

    for total in &report.totals {
        println!(
            "   {:24} {:>12}",
            truncate(&total.category, 24),
            format!("{:.2}", total.total)
        );
    }

    println!("   ─────────────────────────────────────");
    let grand_total = report
        .grand_total()
        .context("Grand total is too large to represent")?;
    println!("   {:24} {:>12}", "Total", format!("{:.2}", grand_total));

    Ok(())
}
