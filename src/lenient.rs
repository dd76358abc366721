//! Forgiving field decoders for provider output. Required fields are already
//! checked by the validator; everything nested is best-effort and decodes to
//! a default instead of failing.

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"[+-]?\d+(?:\.\d+)?").unwrap();
}

fn value_to_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        // "70%", "$4,500.25", "about 12"
        Value::String(s) => {
            let cleaned = s.replace(',', "");
            NUMBER
                .find(&cleaned)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or_default()
        }
        _ => 0.0,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn f64_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(value_to_f64(&Value::deserialize(d)?))
}

pub fn string_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_to_string(&Value::deserialize(d)?))
}

// A lone string becomes a one-element list
pub fn string_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::Null => Vec::new(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        other => vec![value_to_string(&other)],
    })
}

// Keeps the items that decode, drops the rest
pub fn items_that_decode<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

// Map form of the above, keyed by whatever the provider used
pub fn entries_that_decode<'de, D, T>(d: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(d)? {
        Value::Object(entries) => entries
            .into_iter()
            .filter_map(|(name, item)| Some((name, serde_json::from_value(item).ok()?)))
            .collect(),
        _ => BTreeMap::new(),
    })
}
