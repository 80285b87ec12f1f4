//! Tolerant decoding of third-party API payloads.
//!
//! A field holding an unexpected JSON type decodes as its default instead of failing the
//! whole response, so one odd record cannot sink a page.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode a field, falling back to `T::default()` on a type mismatch.
///
/// Use with `#[serde(default, deserialize_with = "lenient::or_default")]`.
pub fn or_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Decode an array element by element; elements that do not fit become `T::default()`.
/// Anything other than an array decodes as an empty list.
pub fn items_or_default<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect()),
        _ => Ok(Vec::new()),
    }
}
