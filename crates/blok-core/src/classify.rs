//! Item classification against ordered substring rules
//!
//! Each item is matched against the text `"{item name} {merchant name}"`,
//! lowercased. Rules are scanned in the order given (the database hands them
//! out by priority, then insertion order) and the first rule whose pattern is
//! a substring of the text wins.
//!
//! Matching is a linear scan, O(rules) per item. Rule sets are expected to
//! stay in the tens to low hundreds.

use serde::Serialize;
use tracing::debug;

use crate::models::CategoryRuleWithCategory;

/// Outcome of classifying one item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
}

impl Classification {
    pub fn is_match(&self) -> bool {
        self.category_id.is_some()
    }
}

/// Build the lowercase text rules are matched against
pub fn classification_text(item_name: &str, merchant_name: Option<&str>) -> String {
    format!("{} {}", item_name, merchant_name.unwrap_or("")).to_lowercase()
}

/// Classify an item with the first matching rule
pub fn classify(
    item_name: &str,
    merchant_name: Option<&str>,
    rules: &[CategoryRuleWithCategory],
) -> Classification {
    let text = classification_text(item_name, merchant_name);

    match rules.iter().find(|r| text.contains(r.rule.pattern.as_str())) {
        Some(matched) => {
            debug!(
                item = item_name,
                pattern = %matched.rule.pattern,
                category = %matched.category_name,
                "Rule matched"
            );
            Classification {
                category_id: Some(matched.rule.category_id),
                category_name: Some(matched.category_name.clone()),
            }
        }
        None => Classification::default(),
    }
}

/// Every rule matching `text`, in scan order (first entry is the one `classify` picks)
pub fn matching_rules<'a>(
    text: &str,
    rules: &'a [CategoryRuleWithCategory],
) -> Vec<&'a CategoryRuleWithCategory> {
    let text = text.to_lowercase();
    rules
        .iter()
        .filter(|r| text.contains(r.rule.pattern.as_str()))
        .collect()
}
