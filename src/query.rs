//! Filter and sort vocabulary for listing quotes.
//!
//! # Fields
//!
//! Every [`QuoteField`] is both sortable and filterable, and belongs to exactly one kind:
//!
//! | Field | Kind | Operators that make sense |
//! |-------|------|---------------------------|
//! | `status` | [`FieldKind::Status`] | `=` only (any operator renders as `=`) |
//! | `created`, `updated`, `valid_until` | [`FieldKind::Date`] | `=`, `>=`, `<=` |
//! | `subtotal`, `total`, `total_tax` | [`FieldKind::Number`] | `=`, `>=`, `<=` |
//!
//! # Filters
//!
//! A [`QuoteFilter`] whose value is missing, an empty string, or not a number is
//! dropped before the query is built. That is a silent no-op, not an error.
//!
//! # Sorting
//!
//! `sort_by` is ordered: the first entry is the primary key, later entries break ties.
//! Duplicate fields are passed through untouched.
//!
//! ```
//! use quote_kit::query::{FilterOperator, ListQuotesOptions, QuoteField, QuoteFilter, SortDirection};
//!
//! let options = ListQuotesOptions::default()
//!     .filter(QuoteFilter::new(QuoteField::Total, FilterOperator::Gte, 23.0))
//!     .sort(QuoteField::Created, SortDirection::Desc)
//!     .page(2);
//! assert_eq!(options.page, 2);
//! assert_eq!(options.page_size, 10);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default page size for list queries.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page either backend serves.
pub const MAX_PAGE_SIZE: u32 = 500;

/// How a field's values compare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Equality against a status name.
    Status,
    /// Compared as date/time values.
    Date,
    /// Compared as numbers.
    Number,
}

/// Quote field usable in filters and sorts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteField {
    Status,
    Created,
    Updated,
    ValidUntil,
    Subtotal,
    Total,
    TotalTax,
}

impl QuoteField {
    pub const ALL: [QuoteField; 7] = [
        QuoteField::Status,
        QuoteField::Created,
        QuoteField::Updated,
        QuoteField::ValidUntil,
        QuoteField::Subtotal,
        QuoteField::Total,
        QuoteField::TotalTax,
    ];

    /// Column / record field name.
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteField::Status => "status",
            QuoteField::Created => "created",
            QuoteField::Updated => "updated",
            QuoteField::ValidUntil => "valid_until",
            QuoteField::Subtotal => "subtotal",
            QuoteField::Total => "total",
            QuoteField::TotalTax => "total_tax",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            QuoteField::Status => FieldKind::Status,
            QuoteField::Created | QuoteField::Updated | QuoteField::ValidUntil => FieldKind::Date,
            QuoteField::Subtotal | QuoteField::Total | QuoteField::TotalTax => FieldKind::Number,
        }
    }

    pub fn is_date(self) -> bool {
        self.kind() == FieldKind::Date
    }

    pub fn is_number(self) -> bool {
        self.kind() == FieldKind::Number
    }
}

impl fmt::Display for QuoteField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator of a filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
}

impl FilterOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Gte => ">=",
            FilterOperator::Lte => "<=",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw filter value as supplied by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Number(value as f64)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Number(f64::from(value))
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

/// One `{field, operator, value}` condition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteFilter {
    pub field: QuoteField,
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FilterValue>,
}

impl QuoteFilter {
    pub fn new(field: QuoteField, operator: FilterOperator, value: impl Into<FilterValue>) -> Self {
        QuoteFilter {
            field,
            operator,
            value: Some(value.into()),
        }
    }

    /// Filter without a value yet (e.g. an untouched form input). Always dropped.
    pub fn empty(field: QuoteField, operator: FilterOperator) -> Self {
        QuoteFilter {
            field,
            operator,
            value: None,
        }
    }

    /// Whether the value is missing, an empty string, or NaN.
    pub fn is_blank(&self) -> bool {
        match &self.value {
            None => true,
            Some(FilterValue::Text(text)) => text.is_empty(),
            Some(FilterValue::Number(n)) => n.is_nan(),
        }
    }
}

/// Sort direction. Ascending unless marked otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

/// One sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortBy {
    pub field: QuoteField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortBy {
    pub fn new(field: QuoteField, direction: SortDirection) -> Self {
        SortBy { field, direction }
    }
}

/// Structured request for one page of quotes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuotesOptions {
    #[serde(default)]
    pub filters: Vec<QuoteFilter>,
    #[serde(default)]
    pub sort_by: Vec<SortBy>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_page() -> u32 {
    1
}

impl Default for ListQuotesOptions {
    fn default() -> Self {
        ListQuotesOptions {
            filters: Vec::new(),
            sort_by: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            page: 1,
        }
    }
}

impl ListQuotesOptions {
    pub fn filter(mut self, filter: QuoteFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn sort(mut self, field: QuoteField, direction: SortDirection) -> Self {
        self.sort_by.push(SortBy::new(field, direction));
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}
