//! Receipt persistence and lookups
//!
//! Receipts are append-only and deduplicated by their upstream id. Items are
//! classified exactly once, inside the transaction that stores them.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::categories::load_rules;
use super::{
    decimal_column, format_datetime, is_constraint_violation, is_unique_violation,
    optional_decimal_column, optional_json_column, parse_datetime, parse_stored_datetime, Database,
};
use crate::classify::classify;
use crate::config::DEFAULT_LIST_LIMIT_MAX;
use crate::error::{Error, Result};
use crate::models::*;
use crate::normalize::{normalize, NormalizedItem, NormalizedReceipt};

const RECEIPT_COLUMNS: &str = "id, external_id, issue_date, merchant_name, merchant_address,
     total_amount, source_payload, source, created_at";

impl Database {
    /// Normalize, classify and store a receipt payload
    ///
    /// A receipt whose upstream id is already stored is returned unchanged and no
    /// items are added. If a concurrent ingest of the same id commits first, the
    /// insert is rolled back and the winner is returned.
    pub fn persist_receipt(&self, payload: &Value, source: ReceiptSource) -> Result<Receipt> {
        let (receipt, items) = normalize(payload)?;
        if receipt.external_id.is_empty() {
            return Err(Error::Validation(
                "Receipt id missing in payload (receiptId, id or receiptNumber)".to_string(),
            ));
        }

        if let Some(existing) = self.get_receipt_by_external_id(&receipt.external_id)? {
            debug!(external_id = %receipt.external_id, "Receipt already stored");
            return Ok(existing);
        }

        self.store_receipt(payload, source, &receipt, &items)
    }

    /// Insert a normalized receipt, resolving a lost race to the stored winner
    fn store_receipt(
        &self,
        payload: &Value,
        source: ReceiptSource,
        receipt: &NormalizedReceipt,
        items: &[NormalizedItem],
    ) -> Result<Receipt> {
        let mut conn = self.conn()?;
        match Self::insert_receipt(&mut conn, payload, source, receipt, items) {
            Ok(id) => {
                info!(
                    external_id = %receipt.external_id,
                    source = %source,
                    items = items.len(),
                    "Receipt stored"
                );
                self.get_receipt(id)?
                    .ok_or_else(|| Error::NotFound(format!("Receipt {}", id)))
            }
            Err(Error::Database(e)) if is_unique_violation(&e, "receipts.external_id") => {
                debug!(external_id = %receipt.external_id, "Receipt stored concurrently, using existing");
                self.get_receipt_by_external_id(&receipt.external_id)?
                    .ok_or_else(|| Error::StorageConflict(e.to_string()))
            }
            Err(Error::Database(e)) if is_constraint_violation(&e) => {
                warn!(external_id = %receipt.external_id, error = %e, "Receipt insert rolled back");
                Err(Error::StorageConflict(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Insert receipt and classified items in one transaction
    ///
    /// Any error drops the transaction, which rolls it back.
    fn insert_receipt(
        conn: &mut Connection,
        payload: &Value,
        source: ReceiptSource,
        receipt: &NormalizedReceipt,
        items: &[NormalizedItem],
    ) -> Result<i64> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let merchant_address = receipt
            .merchant_address
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        tx.execute(
            r#"
            INSERT INTO receipts (external_id, issue_date, merchant_name, merchant_address,
                                  total_amount, source_payload, source)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                receipt.external_id,
                receipt.issue_date.as_ref().map(format_datetime),
                receipt.merchant_name,
                merchant_address,
                receipt.total_amount.map(|d| d.to_string()),
                serde_json::to_string(payload)?,
                source.as_str(),
            ],
        )?;
        let receipt_id = tx.last_insert_rowid();

        // Rules are read once so every item sees the same rule set
        let rules = load_rules(&tx)?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO items (receipt_id, name, quantity, unit_price, total_price,
                                   category_id, suggested_category)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;

            for item in items {
                let classification = classify(&item.name, receipt.merchant_name.as_deref(), &rules);
                stmt.execute(params![
                    receipt_id,
                    item.name,
                    item.quantity.to_string(),
                    item.unit_price.map(|d| d.to_string()),
                    item.total_price.map(|d| d.to_string()),
                    classification.category_id,
                    classification.category_name,
                ])?;
            }
        }

        tx.commit()?;
        Ok(receipt_id)
    }

    /// Get receipt by surrogate ID
    pub fn get_receipt(&self, id: i64) -> Result<Option<Receipt>> {
        let conn = self.conn()?;
        let receipt = conn
            .query_row(
                &format!("SELECT {} FROM receipts WHERE id = ?", RECEIPT_COLUMNS),
                params![id],
                Self::row_to_receipt,
            )
            .optional()?;
        Ok(receipt)
    }

    /// Get receipt by upstream receipt id
    pub fn get_receipt_by_external_id(&self, external_id: &str) -> Result<Option<Receipt>> {
        let conn = self.conn()?;
        let receipt = conn
            .query_row(
                &format!("SELECT {} FROM receipts WHERE external_id = ?", RECEIPT_COLUMNS),
                params![external_id],
                Self::row_to_receipt,
            )
            .optional()?;
        Ok(receipt)
    }

    /// Receipt with its items and their current category names
    pub fn get_receipt_detail(&self, external_id: &str) -> Result<Option<ReceiptDetail>> {
        let Some(receipt) = self.get_receipt_by_external_id(external_id)? else {
            return Ok(None);
        };
        let items = self.get_item_details(receipt.id)?;
        Ok(Some(ReceiptDetail { receipt, items }))
    }

    /// List receipts, newest issue date first (receipts without a date last)
    ///
    /// `limit` is clamped to 1..=200.
    pub fn list_receipts(&self, limit: u32) -> Result<Vec<Receipt>> {
        let limit = limit.clamp(1, DEFAULT_LIST_LIMIT_MAX);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM receipts
             ORDER BY issue_date IS NULL, issue_date DESC, id DESC
             LIMIT ?",
            RECEIPT_COLUMNS
        ))?;

        let receipts = stmt
            .query_map(params![limit], Self::row_to_receipt)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(receipts)
    }

    /// Items of a receipt in insertion order
    pub fn get_items(&self, receipt_id: i64) -> Result<Vec<Item>> {
        Ok(self
            .get_item_details(receipt_id)?
            .into_iter()
            .map(|detail| detail.item)
            .collect())
    }

    /// Items of a receipt with the current name of their category
    pub fn get_item_details(&self, receipt_id: i64) -> Result<Vec<ItemDetail>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT i.id, i.receipt_id, i.name, i.quantity, i.unit_price, i.total_price,
                   i.category_id, i.suggested_category, c.name
            FROM items i
            LEFT JOIN categories c ON i.category_id = c.id
            WHERE i.receipt_id = ?
            ORDER BY i.id
            "#,
        )?;

        let items = stmt
            .query_map(params![receipt_id], |row| {
                Ok(ItemDetail {
                    item: Item {
                        id: row.get(0)?,
                        receipt_id: row.get(1)?,
                        name: row.get(2)?,
                        quantity: decimal_column(row, 3)?,
                        unit_price: optional_decimal_column(row, 4)?,
                        total_price: optional_decimal_column(row, 5)?,
                        category_id: row.get(6)?,
                        suggested_category: row.get(7)?,
                    },
                    category: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Number of stored receipts
    pub fn count_receipts(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM receipts", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_receipt(row: &rusqlite::Row) -> rusqlite::Result<Receipt> {
        let issue_date_str: Option<String> = row.get(2)?;
        let source_str: String = row.get(7)?;
        let created_at_str: String = row.get(8)?;

        Ok(Receipt {
            id: row.get(0)?,
            external_id: row.get(1)?,
            issue_date: issue_date_str.and_then(|s| parse_stored_datetime(&s)),
            merchant_name: row.get(3)?,
            merchant_address: optional_json_column(row, 4)?,
            total_amount: optional_decimal_column(row, 5)?,
            source_payload: optional_json_column(row, 6)?.unwrap_or(Value::Null),
            source: source_str.parse().map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, e.into())
            })?,
            created_at: parse_datetime(&created_at_str),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_duplicate_id_hits_unique_violation() {
        let db = Database::in_memory().unwrap();
        let payload = json!({"id": "RACE-1", "items": [{"name": "a", "price": 1}]});
        db.persist_receipt(&payload, ReceiptSource::Manual).unwrap();

        let (receipt, items) = normalize(&payload).unwrap();
        let mut conn = db.conn().unwrap();
        match Database::insert_receipt(&mut conn, &payload, ReceiptSource::Fs, &receipt, &items) {
            Err(Error::Database(e)) => assert!(is_unique_violation(&e, "receipts.external_id")),
            other => panic!("expected unique violation, got {:?}", other),
        }
    }

    #[test]
    fn test_store_receipt_returns_existing_winner() {
        let db = Database::in_memory().unwrap();
        let first = json!({"id": "RACE-2", "items": [{"name": "first", "price": 1}]});
        let winner = db.persist_receipt(&first, ReceiptSource::Manual).unwrap();

        // A second writer that missed the pre-check
        let second = json!({"id": "RACE-2", "items": [{"name": "second", "price": 9}]});
        let (receipt, items) = normalize(&second).unwrap();
        let stored = db
            .store_receipt(&second, ReceiptSource::Fs, &receipt, &items)
            .unwrap();

        assert_eq!(stored, winner);
        assert_eq!(stored.source, ReceiptSource::Manual);
        assert_eq!(db.count_receipts().unwrap(), 1);

        let items = db.get_items(winner.id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "first");
    }

    #[test]
    fn test_unknown_stored_source_is_an_error() {
        let db = Database::in_memory().unwrap();
        let stored = db
            .persist_receipt(&json!({"id": "SRC-1"}), ReceiptSource::Manual)
            .unwrap();

        let conn = db.conn().unwrap();
        conn.execute_batch(
            "PRAGMA ignore_check_constraints = ON;
             UPDATE receipts SET source = 'scanner' WHERE external_id = 'SRC-1';",
        )
        .unwrap();
        drop(conn);

        assert!(matches!(
            db.get_receipt(stored.id),
            Err(Error::Database(rusqlite::Error::FromSqlConversionFailure(7, _, _)))
        ));
    }
}
