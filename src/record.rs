//! Core record trait that every stored entity implements.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Trait for entities stored as records in a named collection.
///
/// The hosted backend builds `/api/collections/{collection}/records` URLs from it,
/// the embedded backend uses the collection name as its table name.
///
/// # Example
///
/// ```
/// use quote_kit::model::{Product, Quote};
/// use quote_kit::Record;
///
/// assert_eq!(Quote::collection(), "quotes");
/// assert_eq!(Product::collection(), "products");
/// ```
pub trait Record: Send + Sync + Serialize + DeserializeOwned + Clone {
    /// Name of the collection (hosted) or table (embedded) holding this record type.
    fn collection() -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::Record;
    use crate::model::{Product, Quote};

    #[test]
    fn test_collection_names_are_distinct() {
        assert_eq!(Quote::collection(), "quotes");
        assert_ne!(Quote::collection(), Product::collection());
    }
}
