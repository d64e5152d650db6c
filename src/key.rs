//! Query identity keys.
//!
//! A key names a query by what it asks for, so callers can tell a stale response from
//! the current one: `quotes:list:{"conditions":[...],"page":1,...}`. The JSON part is
//! the normalized query with object keys sorted, so equivalent option sets map to the
//! same key.

use crate::error::Result;
use crate::record::Record;
use crate::serialization::stable_stringify;
use serde::Serialize;

/// Builder for query keys.
pub struct QueryKeyBuilder;

impl QueryKeyBuilder {
    /// `{collection}:{scope}:{stable JSON of query}`.
    ///
    /// # Errors
    /// Returns `Error::SerializationError` if `query` cannot be represented as JSON.
    pub fn build<R: Record>(scope: &str, query: &impl Serialize) -> Result<String> {
        let value = serde_json::to_value(query)?;
        Ok(Self::build_composite(&[
            R::collection(),
            scope,
            &stable_stringify(&value),
        ]))
    }

    /// Build composite key from multiple parts.
    pub fn build_composite(parts: &[&str]) -> String {
        parts.join(":")
    }
}
