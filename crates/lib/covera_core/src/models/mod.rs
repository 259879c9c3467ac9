//! Wire and domain models.
//!
//! `auth` holds the credential envelope exchanged with the session
//! endpoints; `portfolio` holds the raw package and application payloads as
//! the backend sends them, before normalization.

pub mod auth;
pub mod portfolio;

use serde::{Deserialize, Deserializer};

/// Accepts a JSON string, number or bool and yields its string form.
/// `null` and missing values become an empty string.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

/// Accepts a non-negative integer either as a number or a numeric string.
/// Values above `u32::MAX` saturate.
pub(crate) fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let wide = match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(wide.map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX)))
}
