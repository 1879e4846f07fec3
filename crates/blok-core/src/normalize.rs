//! Receipt payload normalization
//!
//! The eKasa API and hand-pasted payloads disagree on field names, nesting and
//! which fields are present at all. Every canonical field is read through an
//! ordered fallback chain of keys; the first key that is present, non-null and
//! not a blank string wins.
//!
//! Normalization is pure: no I/O, no clock, same input gives the same output.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Name given to line items that carry neither a name nor a description
pub const UNKNOWN_ITEM_NAME: &str = "unknown item";

const RECEIPT_ID_KEYS: &[&str] = &["receiptId", "id", "receiptNumber"];
const ISSUE_DATE_KEYS: &[&str] = &["issueDate", "created", "transactionDate"];
const MERCHANT_FLAT_KEYS: &[&str] = &["businessName", "merchantName", "organization"];
const MERCHANT_PROFILE_KEYS: &[&str] = &["merchant", "merchantProfile"];
const MERCHANT_NAME_KEYS: &[&str] = &["businessName", "name", "companyName"];
const TOTAL_KEYS: &[&str] = &["totalPrice", "totalAmount"];
const ITEMS_KEYS: &[&str] = &["items", "receiptItems"];

const ITEM_NAME_KEYS: &[&str] = &["name", "description"];
const ITEM_QUANTITY_KEYS: &[&str] = &["quantity", "qty"];
const ITEM_UNIT_PRICE_KEYS: &[&str] = &["unitPrice", "pricePerUnit"];
const ITEM_TOTAL_KEYS: &[&str] = &["price", "totalPrice"];

/// Canonical receipt fields extracted from an upstream payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedReceipt {
    /// Empty when the payload carries no usable identifier
    pub external_id: String,
    pub issue_date: Option<DateTime<Utc>>,
    pub merchant_name: Option<String>,
    pub merchant_address: Option<Value>,
    pub total_amount: Option<Decimal>,
}

/// Canonical line item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedItem {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
}

/// Shape of a resolved merchant value
#[derive(Clone, Copy)]
enum MerchantField<'a> {
    Text(&'a str),
    Structured(&'a Map<String, Value>),
    Other(&'a Value),
}

impl<'a> From<&'a Value> for MerchantField<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            Value::Object(obj) => Self::Structured(obj),
            other => Self::Other(other),
        }
    }
}

/// Normalize an upstream payload into a canonical receipt and its items
pub fn normalize(raw: &Value) -> Result<(NormalizedReceipt, Vec<NormalizedItem>)> {
    let receipt = unwrap_receipt(raw)?;

    let external_id = match first_present(receipt, RECEIPT_ID_KEYS) {
        None => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(Error::Validation(format!(
                "receipt id must be a string or number, got {}",
                other
            )))
        }
    };

    let issue_date = first_present(receipt, ISSUE_DATE_KEYS)
        .and_then(Value::as_str)
        .and_then(parse_issue_date);

    let (merchant_name, merchant_address) = resolve_merchant(receipt);

    let total_amount = first_present(receipt, TOTAL_KEYS).and_then(parse_decimal_value);

    let items = match first_present(receipt, ITEMS_KEYS) {
        None => Vec::new(),
        Some(Value::Array(entries)) => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| normalize_item(index, entry))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(Error::Validation(
                "receipt items must be an array".to_string(),
            ))
        }
    };

    Ok((
        NormalizedReceipt {
            external_id,
            issue_date,
            merchant_name,
            merchant_address,
            total_amount,
        },
        items,
    ))
}

/// Use the object under `receipt` when the payload wraps it, else the payload itself
fn unwrap_receipt(raw: &Value) -> Result<&Map<String, Value>> {
    let outer = raw
        .as_object()
        .ok_or_else(|| Error::Validation("receipt payload must be a JSON object".to_string()))?;

    match outer.get("receipt") {
        Some(Value::Object(inner)) => Ok(inner),
        _ => Ok(outer),
    }
}

/// First key whose value is present, non-null and not a blank string
fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|key| obj.get(*key)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

/// Resolve the merchant display name and address blob
fn resolve_merchant(receipt: &Map<String, Value>) -> (Option<String>, Option<Value>) {
    let profile = first_present(receipt, MERCHANT_PROFILE_KEYS).map(MerchantField::from);

    let mut address = match profile {
        Some(MerchantField::Structured(obj)) => Some(Value::Object(obj.clone())),
        _ => None,
    };

    let resolved = first_present(receipt, MERCHANT_FLAT_KEYS)
        .map(MerchantField::from)
        .or(match profile {
            Some(MerchantField::Structured(obj)) => {
                first_present(obj, MERCHANT_NAME_KEYS).map(MerchantField::from)
            }
            Some(MerchantField::Text(name)) => Some(MerchantField::Text(name)),
            _ => None,
        });

    let name = match resolved {
        None => None,
        Some(MerchantField::Text(name)) => Some(name.to_string()),
        Some(MerchantField::Structured(obj)) => {
            address = Some(Value::Object(obj.clone()));
            first_present(obj, MERCHANT_NAME_KEYS).map(stringify)
        }
        Some(MerchantField::Other(value)) => Some(stringify(value)),
    };

    (name, address)
}

fn normalize_item(index: usize, entry: &Value) -> Result<NormalizedItem> {
    let entry = entry.as_object().ok_or_else(|| {
        Error::Validation(format!("receipt item #{} must be a JSON object", index))
    })?;

    let name = first_present(entry, ITEM_NAME_KEYS)
        .map(stringify)
        .unwrap_or_else(|| UNKNOWN_ITEM_NAME.to_string());

    let quantity = first_present(entry, ITEM_QUANTITY_KEYS)
        .map(|v| coerce_decimal(v, index, "quantity"))
        .transpose()?
        .unwrap_or(Decimal::ONE);

    let unit_price = first_present(entry, ITEM_UNIT_PRICE_KEYS)
        .map(|v| coerce_decimal(v, index, "unit price"))
        .transpose()?;

    let total_price = match first_present(entry, ITEM_TOTAL_KEYS) {
        Some(v) => Some(coerce_decimal(v, index, "total price")?),
        None => unit_price
            .map(|unit| {
                unit.checked_mul(quantity).ok_or_else(|| {
                    Error::Validation(format!("receipt item #{} total price overflows", index))
                })
            })
            .transpose()?,
    };

    Ok(NormalizedItem {
        name,
        quantity,
        unit_price,
        total_price,
    })
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric coercion for item fields; anything non-numeric is a validation error
fn coerce_decimal(value: &Value, index: usize, field: &str) -> Result<Decimal> {
    parse_decimal_value(value).ok_or_else(|| {
        Error::Validation(format!(
            "receipt item #{} has a non-numeric {}: {}",
            index, field, value
        ))
    })
}

fn parse_decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Decimal::from(i)),
            None => parse_decimal(&n.to_string()),
        },
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Parse an ISO-8601 timestamp; offsets are honoured, naive values are taken as UTC
fn parse_issue_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
