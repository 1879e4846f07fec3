//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn setup_test_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.seed_default_categories().unwrap();
        db
    }

    /// Food / Snacks rules for aggregation tests
    fn setup_food_db() -> Database {
        let db = Database::in_memory().unwrap();
        let food = db.create_category("Food", None).unwrap();
        let snacks = db.create_category("Snacks", None).unwrap();
        db.create_rule(food, "apple", 0).unwrap();
        db.create_rule(snacks, "chips", 0).unwrap();
        db
    }

    fn lidl_payload(id: &str) -> serde_json::Value {
        json!({
            "receipt": {
                "receiptId": id,
                "issueDate": "2024-03-12T17:45:00+01:00",
                "merchant": {"name": "LIDL Slovenska republika", "city": "Bratislava"},
                "totalPrice": 4.37,
                "items": [
                    {"name": "Chlieb tmavy", "quantity": 1, "price": 1.29},
                    {"name": "Batérie AA", "quantity": 2, "unitPrice": 1.54}
                ]
            }
        })
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        db.health_check().unwrap();
        assert!(db.list_receipts(50).unwrap().is_empty());
        assert!(db.list_categories().unwrap().is_empty());
    }

    #[test]
    fn test_schema_exists() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        let result: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('items') WHERE name IN ('receipt_id', 'quantity', 'total_price', 'category_id', 'suggested_category')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(result, 5);

        let result: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('category_rules') WHERE name IN ('pattern', 'priority')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(result, 2);
    }

    #[test]
    fn test_persist_receipt_classifies_items() {
        let db = setup_test_db();

        let receipt = db
            .persist_receipt(&lidl_payload("O-LIDL-1"), ReceiptSource::Fs)
            .unwrap();
        assert_eq!(receipt.external_id, "O-LIDL-1");
        assert_eq!(receipt.source, ReceiptSource::Fs);
        assert_eq!(receipt.merchant_name.as_deref(), Some("LIDL Slovenska republika"));
        assert_eq!(receipt.total_amount, Some(dec("4.37")));
        assert_eq!(receipt.merchant_address.as_ref().unwrap()["city"], "Bratislava");

        let items = db.get_items(receipt.id).unwrap();
        assert_eq!(items.len(), 2);

        // Merchant name "lidl" matches every item on the receipt
        let groceries = db.get_category_by_name("Groceries").unwrap().unwrap();
        assert!(items.iter().all(|i| i.category_id == Some(groceries.id)));
        assert!(items
            .iter()
            .all(|i| i.suggested_category.as_deref() == Some("Groceries")));
        assert_eq!(items[1].total_price, Some(dec("3.08")));
    }

    #[test]
    fn test_issue_date_stored_in_utc() {
        let db = setup_test_db();
        let receipt = db
            .persist_receipt(&lidl_payload("O-UTC"), ReceiptSource::Fs)
            .unwrap();

        let expected = chrono::DateTime::parse_from_rfc3339("2024-03-12T16:45:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(receipt.issue_date, Some(expected));
    }

    #[test]
    fn test_source_payload_kept_verbatim() {
        let db = setup_test_db();
        let payload = lidl_payload("O-RAW");
        let receipt = db.persist_receipt(&payload, ReceiptSource::Manual).unwrap();

        assert_eq!(receipt.source_payload, payload);
        assert_eq!(receipt.source, ReceiptSource::Manual);
    }

    #[test]
    fn test_double_ingest_is_idempotent() {
        let db = setup_test_db();
        let payload = lidl_payload("O-TWICE");

        let first = db.persist_receipt(&payload, ReceiptSource::Fs).unwrap();
        let second = db.persist_receipt(&payload, ReceiptSource::Manual).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.source, ReceiptSource::Fs);
        assert_eq!(db.count_receipts().unwrap(), 1);
        assert_eq!(db.get_items(first.id).unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_with_different_body_returns_original() {
        let db = setup_test_db();
        let first = db
            .persist_receipt(&json!({"id": "SAME", "items": [{"name": "a"}]}), ReceiptSource::Fs)
            .unwrap();
        let second = db
            .persist_receipt(
                &json!({"id": "SAME", "items": [{"name": "b"}, {"name": "c"}]}),
                ReceiptSource::Fs,
            )
            .unwrap();

        assert_eq!(first.id, second.id);
        let items = db.get_items(first.id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "a");
    }

    #[test]
    fn test_concurrent_ingest_stores_once() {
        let db = setup_test_db();
        let payload = lidl_payload("O-RACE");

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let db = db.clone();
                let payload = payload.clone();
                std::thread::spawn(move || db.persist_receipt(&payload, ReceiptSource::Fs))
            })
            .collect();

        let ids: Vec<i64> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap().id)
            .collect();

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(db.count_receipts().unwrap(), 1);
        assert_eq!(db.get_items(ids[0]).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_id_rejected_for_every_shape() {
        let db = setup_test_db();

        let payloads = [
            json!({}),
            json!({"receipt": {}}),
            json!({"receipt": {"receiptId": null, "id": null, "receiptNumber": null}}),
            json!({"receiptId": "", "items": [{"name": "Mlieko"}]}),
            json!({"receipt": {"merchant": {"name": "Tesco"}, "totalPrice": 3}}),
        ];

        for payload in &payloads {
            let err = db.persist_receipt(payload, ReceiptSource::Manual).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "payload {payload}");
        }
        assert_eq!(db.count_receipts().unwrap(), 0);
    }

    #[test]
    fn test_malformed_item_stores_nothing() {
        let db = setup_test_db();
        let payload = json!({"id": "BAD", "items": [{"name": "ok"}, {"name": "bad", "qty": "lots"}]});

        let err = db.persist_receipt(&payload, ReceiptSource::Manual).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(db.get_receipt_by_external_id("BAD").unwrap().is_none());
    }

    #[test]
    fn test_constraint_failure_rolls_back_receipt() {
        let db = setup_test_db();
        db.conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_item BEFORE INSERT ON items
                 WHEN NEW.name = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'item rejected'); END;",
            )
            .unwrap();

        let payload = json!({
            "id": "ROLLBACK",
            "items": [{"name": "fine", "price": 1}, {"name": "boom", "price": 2}]
        });

        let err = db.persist_receipt(&payload, ReceiptSource::Manual).unwrap_err();
        assert!(matches!(err, Error::StorageConflict(_)));
        assert_eq!(err.status_code(), 409);

        // Neither the receipt nor the first item survived
        assert!(db.get_receipt_by_external_id("ROLLBACK").unwrap().is_none());
        let items: i64 = db
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
            .unwrap();
        assert_eq!(items, 0);
    }

    #[test]
    fn test_derived_total_price_persisted() {
        let db = Database::in_memory().unwrap();
        let receipt = db
            .persist_receipt(
                &json!({"id": "DERIVE", "items": [{"name": "Jablka", "unitPrice": 2.5, "quantity": 3}]}),
                ReceiptSource::Manual,
            )
            .unwrap();

        let items = db.get_items(receipt.id).unwrap();
        assert_eq!(items[0].total_price, Some(dec("7.5")));
        assert_eq!(items[0].quantity, dec("3"));
        assert_eq!(items[0].unit_price, Some(dec("2.5")));
    }

    #[test]
    fn test_item_without_match_is_uncategorized() {
        let db = setup_test_db();
        let receipt = db
            .persist_receipt(
                &json!({"id": "NOMATCH", "businessName": "Papiernictvo", "items": [{"name": "Zosit"}]}),
                ReceiptSource::Manual,
            )
            .unwrap();

        let items = db.get_items(receipt.id).unwrap();
        assert_eq!(items[0].category_id, None);
        assert_eq!(items[0].suggested_category, None);
        assert_eq!(items[0].quantity, Decimal::ONE);
    }

    #[test]
    fn test_rule_priority_decides_classification() {
        let db = Database::in_memory().unwrap();
        let food = db.create_category("Food", None).unwrap();
        let vegan = db.create_category("Vegan", None).unwrap();

        db.create_rule(food, "milk", 0).unwrap();
        db.create_rule(vegan, "almond milk", 10).unwrap();

        let receipt = db
            .persist_receipt(
                &json!({"id": "PRIO", "items": [{"name": "Almond Milk"}, {"name": "Milk 1.5%"}]}),
                ReceiptSource::Manual,
            )
            .unwrap();

        let items = db.get_item_details(receipt.id).unwrap();
        assert_eq!(items[0].category.as_deref(), Some("Vegan"));
        assert_eq!(items[1].category.as_deref(), Some("Food"));
    }

    #[test]
    fn test_equal_priority_uses_insertion_order() {
        let db = Database::in_memory().unwrap();
        let food = db.create_category("Food", None).unwrap();
        let vegan = db.create_category("Vegan", None).unwrap();

        db.create_rule(food, "milk", 0).unwrap();
        db.create_rule(vegan, "almond milk", 0).unwrap();

        let receipt = db
            .persist_receipt(
                &json!({"id": "ORDER", "items": [{"name": "Almond Milk"}]}),
                ReceiptSource::Manual,
            )
            .unwrap();

        let items = db.get_item_details(receipt.id).unwrap();
        assert_eq!(items[0].category.as_deref(), Some("Food"));

        let rules = db.list_rules().unwrap();
        let patterns: Vec<&str> = rules.iter().map(|r| r.rule.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["milk", "almond milk"]);
    }

    #[test]
    fn test_rule_changes_do_not_reclassify() {
        let db = Database::in_memory().unwrap();
        let receipt = db
            .persist_receipt(
                &json!({"id": "LATER", "items": [{"name": "Kava"}]}),
                ReceiptSource::Manual,
            )
            .unwrap();

        let dining = db.create_category("Dining", None).unwrap();
        db.create_rule(dining, "kava", 0).unwrap();

        let items = db.get_items(receipt.id).unwrap();
        assert_eq!(items[0].category_id, None);
    }

    #[test]
    fn test_create_rule_validation() {
        let db = Database::in_memory().unwrap();
        let food = db.create_category("Food", None).unwrap();

        let id = db.create_rule(food, "  MILK ", 5).unwrap();
        let rules = db.list_rules().unwrap();
        assert_eq!(rules[0].rule.id, id);
        assert_eq!(rules[0].rule.pattern, "milk");
        assert_eq!(rules[0].rule.priority, 5);
        assert_eq!(rules[0].category_name, "Food");

        assert!(matches!(
            db.create_rule(food, "   ", 0),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            db.create_rule(food, "Milk", 0),
            Err(Error::StorageConflict(_))
        ));
        assert!(matches!(
            db.create_rule(9999, "bread", 0),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_category_crud() {
        let db = Database::in_memory().unwrap();

        let id = db.create_category(" Pets ", Some("Animals")).unwrap();
        let category = db.get_category(id).unwrap().unwrap();
        assert_eq!(category.name, "Pets");
        assert_eq!(category.description.as_deref(), Some("Animals"));

        assert!(matches!(
            db.create_category("Pets", None),
            Err(Error::StorageConflict(_))
        ));
        assert!(matches!(
            db.create_category("", None),
            Err(Error::Validation(_))
        ));

        db.create_rule(id, "granule", 0).unwrap();
        assert!(db.delete_category(id).unwrap());
        assert!(!db.delete_category(id).unwrap());
        assert!(db.list_rules().unwrap().is_empty());
    }

    #[test]
    fn test_delete_rule() {
        let db = Database::in_memory().unwrap();
        let food = db.create_category("Food", None).unwrap();
        let id = db.create_rule(food, "apple", 0).unwrap();

        assert!(db.delete_rule(id).unwrap());
        assert!(!db.delete_rule(id).unwrap());
        assert!(db.list_rules().unwrap().is_empty());
    }

    #[test]
    fn test_seed_default_categories_idempotent() {
        let db = setup_test_db();
        let categories = db.list_categories().unwrap().len();
        let rules = db.list_rules().unwrap().len();

        db.seed_default_categories().unwrap();

        assert_eq!(categories, DEFAULT_CATEGORIES.len());
        assert_eq!(db.list_categories().unwrap().len(), categories);
        assert_eq!(db.list_rules().unwrap().len(), rules);
        assert_eq!(
            rules,
            DEFAULT_CATEGORIES
                .iter()
                .map(|c| c.patterns.len())
                .sum::<usize>()
        );
    }

    #[test]
    fn test_test_rules_lists_all_matches() {
        let db = Database::in_memory().unwrap();
        let food = db.create_category("Food", None).unwrap();
        let shop = db.create_category("Groceries", None).unwrap();
        db.create_rule(food, "milk", 0).unwrap();
        db.create_rule(shop, "tesco", 10).unwrap();

        let matches = db.test_rules("Milk", Some("TESCO Stores SR")).unwrap();
        let names: Vec<&str> = matches.iter().map(|m| m.category_name.as_str()).collect();
        assert_eq!(names, vec!["Groceries", "Food"]);

        assert!(db.test_rules("Bread", None).unwrap().is_empty());
    }

    #[test]
    fn test_list_receipts_order_and_limit() {
        let db = Database::in_memory().unwrap();
        db.persist_receipt(&json!({"id": "OLD", "issueDate": "2024-01-01"}), ReceiptSource::Manual)
            .unwrap();
        db.persist_receipt(&json!({"id": "UNDATED"}), ReceiptSource::Manual)
            .unwrap();
        db.persist_receipt(&json!({"id": "NEW", "issueDate": "2024-05-01"}), ReceiptSource::Manual)
            .unwrap();

        let ids: Vec<String> = db
            .list_receipts(50)
            .unwrap()
            .into_iter()
            .map(|r| r.external_id)
            .collect();
        assert_eq!(ids, vec!["NEW", "OLD", "UNDATED"]);

        assert_eq!(db.list_receipts(1).unwrap().len(), 1);
        // Zero is clamped up to one
        assert_eq!(db.list_receipts(0).unwrap().len(), 1);
        assert_eq!(db.list_receipts(10_000).unwrap().len(), 3);
    }

    #[test]
    fn test_receipt_detail() {
        let db = setup_test_db();
        db.persist_receipt(&lidl_payload("O-DETAIL"), ReceiptSource::Fs)
            .unwrap();

        let detail = db.get_receipt_detail("O-DETAIL").unwrap().unwrap();
        assert_eq!(detail.receipt.external_id, "O-DETAIL");
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].item.name, "Chlieb tmavy");
        assert_eq!(detail.items[0].category.as_deref(), Some("Groceries"));

        assert!(db.get_receipt_detail("nope").unwrap().is_none());
    }

    #[test]
    fn test_monthly_totals() {
        let db = setup_food_db();

        db.persist_receipt(
            &json!({
                "id": "MARCH-1",
                "issueDate": "2024-03-10T12:00:00Z",
                "items": [
                    {"name": "Apple Golden", "price": 6},
                    {"name": "Chips Paprika", "price": 5},
                    {"name": "Water", "price": 3}
                ]
            }),
            ReceiptSource::Manual,
        )
        .unwrap();
        db.persist_receipt(
            &json!({
                "id": "MARCH-2",
                "issueDate": "2024-03-31T23:59:59Z",
                "items": [{"name": "apple juice", "unitPrice": 2, "quantity": 2}]
            }),
            ReceiptSource::Manual,
        )
        .unwrap();

        let totals = db.monthly_totals(2024, 3).unwrap();
        assert_eq!(
            totals,
            vec![
                CategoryTotal {
                    category: "Food".to_string(),
                    total: dec("10")
                },
                CategoryTotal {
                    category: "Snacks".to_string(),
                    total: dec("5")
                },
                CategoryTotal {
                    category: UNCATEGORIZED_LABEL.to_string(),
                    total: dec("3")
                },
            ]
        );
    }

    #[test]
    fn test_monthly_totals_excludes_other_months_and_undated() {
        let db = setup_food_db();

        db.persist_receipt(
            &json!({"id": "UNDATED", "issueDate": "someday", "items": [{"name": "apple", "price": 100}]}),
            ReceiptSource::Manual,
        )
        .unwrap();
        db.persist_receipt(
            &json!({"id": "FEB", "issueDate": "2024-02-29T23:59:59Z", "items": [{"name": "apple", "price": 7}]}),
            ReceiptSource::Manual,
        )
        .unwrap();
        // 23:30 at UTC-1 is already April in UTC
        db.persist_receipt(
            &json!({"id": "APR", "issueDate": "2024-03-31T23:30:00-01:00", "items": [{"name": "apple", "price": 9}]}),
            ReceiptSource::Manual,
        )
        .unwrap();

        assert!(db.monthly_totals(2024, 3).unwrap().is_empty());

        let april = db.monthly_totals(2024, 4).unwrap();
        assert_eq!(april.len(), 1);
        assert_eq!(april[0].total, dec("9"));
    }

    #[test]
    fn test_monthly_totals_exact_decimals() {
        let db = setup_food_db();
        let items: Vec<_> = (0..10)
            .map(|_| json!({"name": "apple", "price": "0.10"}))
            .collect();
        db.persist_receipt(
            &json!({"id": "CENTS", "issueDate": "2024-06-01", "items": items}),
            ReceiptSource::Manual,
        )
        .unwrap();

        let totals = db.monthly_totals(2024, 6).unwrap();
        assert_eq!(totals[0].total, dec("1.00"));
    }

    #[test]
    fn test_monthly_totals_null_price_counts_as_zero() {
        let db = setup_food_db();
        db.persist_receipt(
            &json!({"id": "FREE", "issueDate": "2024-07-04", "items": [{"name": "apple sample"}]}),
            ReceiptSource::Manual,
        )
        .unwrap();

        let totals = db.monthly_totals(2024, 7).unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].category, "Food");
        assert_eq!(totals[0].total, Decimal::ZERO);
    }

    #[test]
    fn test_deleted_category_falls_back_to_snapshot() {
        let db = setup_food_db();
        db.persist_receipt(
            &json!({"id": "SNAP", "issueDate": "2024-08-02", "items": [{"name": "apple", "price": 4}]}),
            ReceiptSource::Manual,
        )
        .unwrap();

        let food = db.get_category_by_name("Food").unwrap().unwrap();
        db.delete_category(food.id).unwrap();

        let detail = db.get_receipt_detail("SNAP").unwrap().unwrap();
        assert_eq!(detail.items[0].item.category_id, None);
        assert_eq!(detail.items[0].item.suggested_category.as_deref(), Some("Food"));

        let totals = db.monthly_totals(2024, 8).unwrap();
        assert_eq!(totals[0].category, "Food");
        assert_eq!(totals[0].total, dec("4"));
    }

    #[test]
    fn test_monthly_totals_invalid_month() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(
            db.monthly_totals(2024, 13),
            Err(Error::Validation(_))
        ));
        assert!(matches!(db.stats_report(2024, 0), Err(Error::Validation(_))));
    }

    #[test]
    fn test_stats_report_grand_total() {
        let db = setup_food_db();
        db.persist_receipt(
            &json!({
                "id": "REPORT",
                "issueDate": "2024-09-15",
                "items": [{"name": "apple", "price": 1.25}, {"name": "chips", "price": 2.5}]
            }),
            ReceiptSource::Manual,
        )
        .unwrap();

        let report = db.stats_report(2024, 9).unwrap();
        assert_eq!((report.year, report.month), (2024, 9));
        assert_eq!(report.totals.len(), 2);
        assert_eq!(report.grand_total(), Some(dec("3.75")));
    }

    #[test]
    fn test_monthly_totals_overflow_is_validation_error() {
        let db = Database::in_memory().unwrap();
        db.persist_receipt(
            &json!({
                "id": "HUGE",
                "issueDate": "2024-03-10T10:00:00Z",
                "items": [
                    {"name": "a", "price": "50000000000000000000000000000"},
                    {"name": "b", "price": "50000000000000000000000000000"}
                ]
            }),
            ReceiptSource::Manual,
        )
        .unwrap();

        assert!(matches!(
            db.monthly_totals(2024, 3),
            Err(Error::Validation(_))
        ));
        // Other months are unaffected
        assert!(db.monthly_totals(2024, 4).unwrap().is_empty());
    }

    #[test]
    fn test_grand_total_overflow_is_none() {
        let report = StatsReport {
            year: 2024,
            month: 3,
            totals: vec![
                CategoryTotal {
                    category: "a".to_string(),
                    total: Decimal::MAX,
                },
                CategoryTotal {
                    category: "b".to_string(),
                    total: Decimal::ONE,
                },
            ],
        };
        assert_eq!(report.grand_total(), None);
    }
}
