//! Domain models for blok

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Label used by statistics for items with neither a category nor a suggestion
pub const UNCATEGORIZED_LABEL: &str = "uncategorized";

/// Where a receipt payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptSource {
    /// Payload supplied directly by the caller
    Manual,
    /// Fetched from the Financial Administration eKasa API
    #[default]
    Fs,
}

impl ReceiptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Fs => "fs",
        }
    }
}

impl std::str::FromStr for ReceiptSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "fs" => Ok(Self::Fs),
            _ => Err(format!("Unknown receipt source: {}", s)),
        }
    }
}

impl std::fmt::Display for ReceiptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ========== Receipt Models ==========

/// A stored receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    /// Identifier assigned by the upstream system (globally unique)
    pub external_id: String,
    pub issue_date: Option<DateTime<Utc>>,
    pub merchant_name: Option<String>,
    /// Merchant profile object as delivered upstream (opaque)
    pub merchant_address: Option<serde_json::Value>,
    pub total_amount: Option<Decimal>,
    /// Raw upstream payload, kept verbatim for audit and replay
    pub source_payload: serde_json::Value,
    pub source: ReceiptSource,
    pub created_at: DateTime<Utc>,
}

/// A purchased line item belonging to a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    /// Owning receipt (surrogate id, not the external id)
    pub receipt_id: i64,
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
    /// Category assigned at ingestion (None = uncategorized)
    pub category_id: Option<i64>,
    /// Category name snapshotted at classification time
    pub suggested_category: Option<String>,
}

/// An item with its current category name resolved (for display)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,
    pub category: Option<String>,
}

/// A receipt together with its items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptDetail {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub items: Vec<ItemDetail>,
}

// ========== Category Models ==========

/// A spending category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A substring rule that assigns a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: i64,
    pub category_id: i64,
    /// Lowercase substring matched against "item name + merchant name"
    pub pattern: String,
    /// Higher priority rules are checked first; ties keep insertion order
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

/// A rule with the name of the category it assigns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRuleWithCategory {
    #[serde(flatten)]
    pub rule: CategoryRule,
    pub category_name: String,
}

// ========== Statistics Models ==========

/// Total spent in one category label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
}

/// Monthly statistics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReport {
    pub year: i32,
    pub month: u32,
    pub totals: Vec<CategoryTotal>,
}

impl StatsReport {
    /// Sum of all category totals, `None` if it overflows
    pub fn grand_total(&self) -> Option<Decimal> {
        self.totals
            .iter()
            .try_fold(Decimal::ZERO, |acc, t| acc.checked_add(t.total))
    }
}
