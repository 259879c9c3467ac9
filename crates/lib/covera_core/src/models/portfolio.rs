//! Raw package and application payloads.
//!
//! The backend is inconsistent about field names, so applications are kept
//! as raw JSON objects here and normalized by [`crate::aggregation`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::lenient_string;

/// One entry of `GET /packages/summary-list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSummary {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub base_price: Decimal,
    /// Percentage, 0–100.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub discount: Decimal,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Applications embedded in the summary, when the list endpoint sends
    /// them as an array. Any other value is ignored.
    #[serde(default, deserialize_with = "lenient_array")]
    pub applications: Option<Vec<Value>>,
}

impl PackageSummary {
    /// Embedded applications that are JSON objects; anything else is dropped.
    pub fn embedded_applications(&self) -> Vec<RawApplication> {
        self.applications
            .as_deref()
            .map(RawApplication::collect)
            .unwrap_or_default()
    }
}

/// An application object exactly as the backend sent it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawApplication(pub Map<String, Value>);

impl RawApplication {
    /// Keep the object elements of a JSON array.
    pub fn collect(values: &[Value]) -> Vec<RawApplication> {
        values
            .iter()
            .filter_map(|v| v.as_object().cloned().map(RawApplication))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// First key whose value is a non-empty string (numbers are stringified).
    pub fn first_string(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| match self.0.get(*k)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Whether any of `keys` is present with a non-null, non-empty value.
    pub fn has_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| match self.0.get(*k) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(_) => true,
        })
    }
}

impl<'de> Deserialize<'de> for RawApplication {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::<String, Value>::deserialize(deserializer).map(RawApplication)
    }
}

/// Parse a money-like JSON value: numbers, or strings holding a number.
/// Empty strings and everything else yield `None`.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().replace(',', "."),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_decimal).unwrap_or_default())
}

fn lenient_array<'de, D>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|d| d.with_timezone(&Utc)),
        _ => None,
    })
}
