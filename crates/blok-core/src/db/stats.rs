//! Monthly spending statistics

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::params;
use rust_decimal::Decimal;

use super::{format_bound, optional_decimal_column, Database};
use crate::error::{Error, Result};
use crate::models::{CategoryTotal, StatsReport, UNCATEGORIZED_LABEL};

/// Half-open UTC window `[first day of month, first day of next month)`
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDateTime, NaiveDateTime)> {
    if !(1..=12).contains(&month) {
        return Err(Error::Validation(format!(
            "Month must be between 1 and 12, got {}",
            month
        )));
    }

    let out_of_range = || Error::Validation(format!("Year {} is out of range", year));

    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1).ok_or_else(out_of_range)?, 1)
    } else {
        (year, month + 1)
    };

    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(out_of_range)?;
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(out_of_range)?;

    Ok((start.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN)))
}

impl Database {
    /// Total spent per category label for one month
    ///
    /// The label is the current category name, else the suggested category
    /// snapshot, else "uncategorized". Items without a total count as zero and
    /// receipts without an issue date never contribute. Sorted by label.
    pub fn monthly_totals(&self, year: i32, month: u32) -> Result<Vec<CategoryTotal>> {
        let (start, end) = month_bounds(year, month)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT COALESCE(c.name, i.suggested_category, ?1) AS label, i.total_price
            FROM items i
            INNER JOIN receipts r ON i.receipt_id = r.id
            LEFT JOIN categories c ON i.category_id = c.id
            WHERE r.issue_date IS NOT NULL
              AND r.issue_date >= ?2
              AND r.issue_date < ?3
            "#,
        )?;

        let rows = stmt
            .query_map(
                params![UNCATEGORIZED_LABEL, format_bound(&start), format_bound(&end)],
                |row| Ok((row.get::<_, String>(0)?, optional_decimal_column(row, 1)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for (label, total) in rows {
            let sum = totals.entry(label).or_default();
            *sum = sum
                .checked_add(total.unwrap_or_default())
                .ok_or_else(|| Error::Validation("monthly total overflows".to_string()))?;
        }

        Ok(totals
            .into_iter()
            .map(|(category, total)| CategoryTotal { category, total })
            .collect())
    }

    /// Monthly totals wrapped with their period
    pub fn stats_report(&self, year: i32, month: u32) -> Result<StatsReport> {
        Ok(StatsReport {
            year,
            month,
            totals: self.monthly_totals(year, month)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_month_bounds() {
        let (start, end) = month_bounds(2024, 2).unwrap();
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(end.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        let (start, end) = month_bounds(2023, 12).unwrap();
        assert_eq!(start.year(), 2023);
        assert_eq!((end.year(), end.month(), end.day()), (2024, 1, 1));
    }

    #[test]
    fn test_month_bounds_invalid_month() {
        assert!(matches!(month_bounds(2024, 0), Err(Error::Validation(_))));
        assert!(matches!(month_bounds(2024, 13), Err(Error::Validation(_))));
        assert!(matches!(month_bounds(i32::MAX, 12), Err(Error::Validation(_))));
        assert!(matches!(month_bounds(i32::MIN, 1), Err(Error::Validation(_))));
    }
}
