//! Category and classification rule operations

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{is_constraint_violation, is_unique_violation, parse_datetime, Database};
use crate::classify::{classification_text, matching_rules};
use crate::error::{Error, Result};
use crate::models::*;

/// A category seeded by `blok init`, with its keyword rules
#[derive(Debug, Clone, Copy)]
pub struct DefaultCategory {
    pub name: &'static str,
    pub description: &'static str,
    pub patterns: &'static [&'static str],
}

/// Default categories and keywords (Slovak retail chains and common words)
pub const DEFAULT_CATEGORIES: &[DefaultCategory] = &[
    DefaultCategory {
        name: "Groceries",
        description: "Supermarkets and everyday food",
        patterns: &["lidl", "tesco", "milk", "chlieb", "potraviny", "coop"],
    },
    DefaultCategory {
        name: "Transport",
        description: "Fuel and public transport",
        patterns: &["benz", "shell", "omv", "bus", "vlak", "mhd"],
    },
    DefaultCategory {
        name: "Household",
        description: "Home, DIY and electronics",
        patterns: &["ikea", "hornbach", "bau", "obi", "elektro"],
    },
    DefaultCategory {
        name: "Dining",
        description: "Restaurants, cafes and pubs",
        patterns: &["kavia", "restaurant", "bistro", "pub", "cafe"],
    },
];

/// Read the rule set in scan order (priority DESC, then insertion order)
///
/// Takes a plain connection so it can run inside an open transaction.
pub(crate) fn load_rules(conn: &Connection) -> Result<Vec<CategoryRuleWithCategory>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT r.id, r.category_id, r.pattern, r.priority, r.created_at, c.name
        FROM category_rules r
        INNER JOIN categories c ON r.category_id = c.id
        ORDER BY r.priority DESC, r.id ASC
        "#,
    )?;

    let rules = stmt
        .query_map([], |row| {
            let created_at_str: String = row.get(4)?;
            Ok(CategoryRuleWithCategory {
                rule: CategoryRule {
                    id: row.get(0)?,
                    category_id: row.get(1)?,
                    pattern: row.get(2)?,
                    priority: row.get(3)?,
                    created_at: parse_datetime(&created_at_str),
                },
                category_name: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rules)
}

impl Database {
    /// Seed the default categories and their rules (idempotent)
    pub fn seed_default_categories(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for default in DEFAULT_CATEGORIES {
            tx.execute(
                "INSERT OR IGNORE INTO categories (name, description) VALUES (?, ?)",
                params![default.name, default.description],
            )?;
            let category_id: i64 = tx.query_row(
                "SELECT id FROM categories WHERE name = ?",
                params![default.name],
                |row| row.get(0),
            )?;

            for pattern in default.patterns {
                tx.execute(
                    "INSERT OR IGNORE INTO category_rules (category_id, pattern, priority) VALUES (?, ?, 0)",
                    params![category_id, pattern],
                )?;
            }
        }

        tx.commit()?;
        info!(count = DEFAULT_CATEGORIES.len(), "Default categories seeded");
        Ok(())
    }

    // ========== Categories ==========

    /// Create a category
    pub fn create_category(&self, name: &str, description: Option<&str>) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Category name must not be empty".to_string()));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (name, description) VALUES (?, ?)",
            params![name, description],
        )
        .map_err(|e| {
            if is_unique_violation(&e, "categories.name") {
                Error::StorageConflict(format!("Category '{}' already exists", name))
            } else {
                Error::Database(e)
            }
        })?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a category by ID
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, description, created_at FROM categories WHERE id = ?",
                params![id],
                Self::row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Get a category by its exact name
    pub fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, description, created_at FROM categories WHERE name = ?",
                params![name.trim()],
                Self::row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// List all categories by name
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, description, created_at FROM categories ORDER BY name")?;

        let categories = stmt
            .query_map([], Self::row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(categories)
    }

    /// Delete a category and its rules
    ///
    /// Items keep their `suggested_category` snapshot; their `category_id` is cleared.
    pub fn delete_category(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM categories WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        let created_at_str: String = row.get(3)?;
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created_at: parse_datetime(&created_at_str),
        })
    }

    // ========== Rules ==========

    /// Create a classification rule
    ///
    /// The pattern is trimmed and lowercased before storing. Higher priority rules
    /// are checked first; rules with equal priority keep insertion order.
    pub fn create_rule(&self, category_id: i64, pattern: &str, priority: i32) -> Result<i64> {
        let pattern = pattern.trim().to_lowercase();
        if pattern.is_empty() {
            return Err(Error::Validation("Rule pattern must not be empty".to_string()));
        }

        if self.get_category(category_id)?.is_none() {
            return Err(Error::NotFound(format!("Category {}", category_id)));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO category_rules (category_id, pattern, priority) VALUES (?, ?, ?)",
            params![category_id, pattern, priority],
        )
        .map_err(|e| {
            if is_unique_violation(&e, "category_rules.pattern") {
                Error::StorageConflict(format!("A rule for '{}' already exists", pattern))
            } else if is_constraint_violation(&e) {
                Error::StorageConflict(e.to_string())
            } else {
                Error::Database(e)
            }
        })?;

        let id = conn.last_insert_rowid();
        debug!(id, pattern = %pattern, priority, "Rule created");
        Ok(id)
    }

    /// Delete a rule
    pub fn delete_rule(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM category_rules WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    /// List rules in the order the classifier scans them
    pub fn list_rules(&self) -> Result<Vec<CategoryRuleWithCategory>> {
        let conn = self.conn()?;
        load_rules(&conn)
    }

    /// All rules matching an item/merchant pair, in scan order
    ///
    /// The first entry is the rule ingestion would apply.
    pub fn test_rules(
        &self,
        item_name: &str,
        merchant_name: Option<&str>,
    ) -> Result<Vec<CategoryRuleWithCategory>> {
        let rules = self.list_rules()?;
        let text = classification_text(item_name, merchant_name);
        Ok(matching_rules(&text, &rules).into_iter().cloned().collect())
    }
}
