//! JSON helpers shared by both backends.
//!
//! Three concerns live here:
//!
//! - **Stable JSON:** [`stable_stringify`] renders any JSON value with object keys sorted,
//!   so two equal queries always produce byte-identical identity keys.
//! - **JSON text columns:** the embedded store keeps `customer_info`, `items` and
//!   `attributes` as serialized text; [`encode_json_column`] / [`decode_json_column`]
//!   move values in and out of those columns.
//! - **Wire quirks:** the hosted backend reports unset optional text/date fields as `""`.
//!   [`empty_as_none`] reads those as `None`.
//!
//! # Example
//!
//! ```rust
//! use quote_kit::serialization::stable_stringify;
//! use serde_json::json;
//!
//! let a = stable_stringify(&json!({"b": 1, "a": [true, null]}));
//! assert_eq!(a, r#"{"a":[true,null],"b":1}"#);
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Render a JSON value with object keys sorted at every depth.
pub fn stable_stringify(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(stable_stringify).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let items: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        Value::String(k.clone()),
                        stable_stringify(&map[k.as_str()])
                    )
                })
                .collect();
            format!("{{{}}}", items.join(","))
        }
        primitive => primitive.to_string(),
    }
}

/// Serialize a value into a JSON text column.
///
/// # Errors
/// Returns `Error::SerializationError` if the value cannot be represented as JSON.
pub fn encode_json_column<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::SerializationError(e.to_string()))
}

/// Decode a JSON text column, naming the column in the error.
///
/// # Errors
/// Returns `Error::DeserializationError` if the text is not valid JSON for `T`.
pub fn decode_json_column<T: DeserializeOwned>(column: &str, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        Error::DeserializationError(format!("column `{}` holds invalid JSON: {}", column, e))
    })
}

/// Serde adapter reading `""` (and `null`) as `None` for optional fields.
///
/// Works for any `Option<T>` where `T: FromStr`, e.g. `Option<String>` and
/// `Option<DateTime<Utc>>`. Deserialization only; pair it with the type's own
/// `Serialize` via `deserialize_with`.
pub mod empty_as_none {
    use serde::{Deserialize, Deserializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}
