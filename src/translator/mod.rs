//! Query translation: list options → backend query.
//!
//! Translation happens in two steps so both backends share every decision:
//!
//! 1. [`prepare_list_options`] normalizes a [`ListQuotesOptions`] into a
//!    [`PreparedQuery`]: blank or malformed filters are dropped, values are coerced to
//!    the field's kind (dates to UTC timestamps, numbers to `f64`), `status` filters are
//!    forced to equality, and paging is clamped.
//! 2. A [`QueryDialect`] renders the prepared query in backend syntax:
//!    [`FilterExpressionDialect`] for the hosted record API, [`SqliteDialect`] for the
//!    embedded store.
//!
//! Both steps are pure; nothing here performs I/O.
//!
//! ```
//! use quote_kit::query::{FilterOperator, ListQuotesOptions, QuoteField, QuoteFilter, SortDirection};
//! use quote_kit::translator::{prepare_list_options, FilterExpressionDialect, QueryDialect, SqliteDialect};
//!
//! let options = ListQuotesOptions::default()
//!     .filter(QuoteFilter::new(QuoteField::Status, FilterOperator::Gte, "ACCEPTED"))
//!     .filter(QuoteFilter::new(QuoteField::Total, FilterOperator::Gte, 23.0))
//!     .sort(QuoteField::Created, SortDirection::Desc);
//! let prepared = prepare_list_options(&options);
//!
//! let hosted = FilterExpressionDialect::default().render(&prepared);
//! assert_eq!(hosted.filter.as_deref(), Some(r#"status = "ACCEPTED" && total >= 23"#));
//! assert_eq!(hosted.sort.as_deref(), Some("-created"));
//!
//! let sql = SqliteDialect::default().render(&prepared);
//! assert_eq!(sql.where_clause.as_deref(), Some("WHERE status = ? AND total >= ?"));
//! assert_eq!(
//!     sql.order_by.as_deref(),
//!     Some("ORDER BY strftime('%Y-%m-%d %H:%M:%f', created) DESC, rowid")
//! );
//! ```

mod filter_expr;
mod sql;

pub use filter_expr::{FilterExpressionDialect, HostedQuery};
pub use sql::{SqlParam, SqlQuery, SqliteDialect};

use crate::query::{
    FieldKind, FilterOperator, FilterValue, ListQuotesOptions, QuoteField, QuoteFilter, SortBy,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

/// A filter value coerced to its field's kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Text(String),
    Number(f64),
    DateTime(DateTime<Utc>),
}

/// A filter that survived normalization.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Condition {
    pub field: QuoteField,
    pub operator: FilterOperator,
    pub value: ConditionValue,
}

/// Backend-neutral query: conditions ANDed in input order, sort keys in precedence order.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedQuery {
    pub conditions: Vec<Condition>,
    pub sort: Vec<SortBy>,
    pub page_size: u32,
    pub page: u32,
}

impl PreparedQuery {
    /// Rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

/// Normalize list options into a [`PreparedQuery`].
///
/// Filters are dropped, silently, when their value is missing or empty, when a numeric
/// field gets NaN, an infinity or text that is not a finite number, or when a date field
/// gets a value that is not a date. `page` below 1 becomes 1; `page_size` 0 becomes the default and is
/// capped at [`MAX_PAGE_SIZE`].
pub fn prepare_list_options(options: &ListQuotesOptions) -> PreparedQuery {
    let conditions = options
        .filters
        .iter()
        .filter_map(|filter| {
            let condition = normalize_filter(filter);
            if condition.is_none() {
                debug!("Dropping filter on `{}`: {:?}", filter.field, filter.value);
            }
            condition
        })
        .collect();

    let page_size = match options.page_size {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    };

    PreparedQuery {
        conditions,
        sort: options.sort_by.clone(),
        page_size,
        page: options.page.max(1),
    }
}

fn normalize_filter(filter: &QuoteFilter) -> Option<Condition> {
    if filter.is_blank() {
        return None;
    }
    let value = filter.value.as_ref()?;

    let (operator, value) = match filter.field.kind() {
        FieldKind::Status => {
            let text = match value {
                FilterValue::Text(text) => text.clone(),
                FilterValue::Number(n) => n.to_string(),
            };
            (FilterOperator::Eq, ConditionValue::Text(text))
        }
        FieldKind::Date => match value {
            FilterValue::Text(text) => (
                filter.operator,
                ConditionValue::DateTime(parse_filter_date(text)?),
            ),
            FilterValue::Number(_) => return None,
        },
        FieldKind::Number => {
            let number = match value {
                FilterValue::Number(n) => *n,
                FilterValue::Text(text) => text.trim().parse::<f64>().ok()?,
            };
            if !number.is_finite() {
                return None;
            }
            (filter.operator, ConditionValue::Number(number))
        }
    };

    Some(Condition {
        field: filter.field,
        operator,
        value,
    })
}

/// Parse a date filter value.
///
/// Accepts RFC 3339 (`T` or space separator), the hosted backend's
/// `YYYY-MM-DD HH:MM:SS.sssZ`, zone-less date-times (read as UTC) and bare
/// `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_filter_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = text.parse::<DateTime<Utc>>() {
        return Some(parsed);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.fZ", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Renders a [`PreparedQuery`] in one backend's syntax.
///
/// Implementors only describe the syntax of a single condition and a single sort key;
/// combining them (AND in input order, sort keys in precedence order) is shared.
pub trait QueryDialect: Sized {
    /// Backend-specific query.
    type Output;

    /// Logical AND between conditions.
    const AND: &'static str;

    /// Separator between sort keys.
    const SORT_SEPARATOR: &'static str;

    /// Render one condition.
    fn condition(&mut self, condition: &Condition) -> String;

    /// Render one sort key.
    fn sort_key(&self, sort: &SortBy) -> String;

    /// Assemble the output from the joined filter and sort (each `None` when empty).
    fn finish(self, filter: Option<String>, sort: Option<String>, query: &PreparedQuery) -> Self::Output;

    fn render(mut self, query: &PreparedQuery) -> Self::Output {
        let conditions: Vec<String> = query
            .conditions
            .iter()
            .map(|condition| self.condition(condition))
            .collect();
        let filter = (!conditions.is_empty()).then(|| conditions.join(Self::AND));

        let keys: Vec<String> = query.sort.iter().map(|sort| self.sort_key(sort)).collect();
        let sort = (!keys.is_empty()).then(|| keys.join(Self::SORT_SEPARATOR));

        self.finish(filter, sort, query)
    }
}
