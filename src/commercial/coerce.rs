//! Lenient input handling for commercial records.
//!
//! The booking screens post whatever the form fields hold: numbers, numeric
//! strings, empty strings, `null`. Nothing here ever fails. Unparsable
//! numbers become zero, unknown flags become `false`, and the normalizers
//! keep every value inside the range the calculators can handle.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Upper bound for any single monetary amount.
pub const MAX_AMOUNT: Decimal = dec!(1000000000000000);

/// Upper bound for an exchange rate.
pub const MAX_RATE: Decimal = dec!(1000000);

const HUNDRED: Decimal = dec!(100);

/// Parse a JSON value into a decimal, if it holds anything numeric.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal_str(&n.to_string()),
        Value::String(s) => parse_decimal_str(s),
        _ => None,
    }
}

fn parse_decimal_str(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
        .or_else(|| out_of_range(trimmed))
}

/// Numbers too large or too small for a `Decimal`: large magnitudes saturate
/// at the signed `MAX_AMOUNT`, tiny ones become zero.
fn out_of_range(raw: &str) -> Option<Decimal> {
    let numeric = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !numeric {
        return None;
    }
    let value = raw.parse::<f64>().ok().filter(|v| !v.is_nan())?;
    Some(if value.abs() < 1.0 {
        Decimal::ZERO
    } else if value.is_sign_negative() {
        -MAX_AMOUNT
    } else {
        MAX_AMOUNT
    })
}

/// Parse a JSON value into a boolean flag.
pub fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "on" | "yes"
        ),
        _ => false,
    }
}

/// Canonical form of a currency code: trimmed, upper-case.
pub fn currency_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Parse a list of items from either a JSON array or a JSON-encoded text
/// field holding that array. Entries that are not valid items are skipped.
pub fn parse_items<T: DeserializeOwned>(value: Value) -> Vec<T> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::String(text) => items_text_to_values(&text),
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .filter_map(|entry| T::deserialize(entry).ok())
        .collect()
}

/// Parse a persisted JSON-encoded item list.
pub fn items_from_text<T: DeserializeOwned>(text: &str) -> Vec<T> {
    parse_items(Value::String(text.to_string()))
}

fn items_text_to_values(text: &str) -> Vec<Value> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(entries)) => entries,
        _ => Vec::new(),
    }
}

// ==================== Normalizers ====================

/// Clamp a monetary amount into `[0, MAX_AMOUNT]`.
pub fn amount(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(MAX_AMOUNT)
}

/// Clamp a percentage into `[0, 100]`.
pub fn percent(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(HUNDRED)
}

/// A usable exchange rate: non-positive rates fall back to 1.
pub fn rate(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        Decimal::ONE
    } else {
        value.min(MAX_RATE)
    }
}

// ==================== serde adapters ====================

pub fn decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_decimal(&value).unwrap_or(Decimal::ZERO))
}

pub fn optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_decimal(&value))
}

pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_flag(&value))
}

pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

pub fn currency<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    text(deserializer).map(|raw| currency_code(&raw))
}

pub fn items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_items(value))
}

/// Deserialize `T`, falling back to `T::default()` on any mismatch.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}
