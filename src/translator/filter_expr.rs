//! Filter-expression rendering for the hosted record API.
//!
//! Conditions render as `field op value` joined by ` && `; sort keys as
//! `+field`/`-field` joined by `,`.

use super::{Condition, ConditionValue, PreparedQuery, QueryDialect};
use crate::query::{SortBy, SortDirection};
use chrono::{DateTime, Utc};

/// Timestamp layout the hosted backend stores and compares.
const HOSTED_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

/// Query parameters for one list request against the hosted backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostedQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl HostedQuery {
    /// URL query pairs, omitting an empty filter or sort.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("perPage", self.per_page.to_string()),
        ];
        if let Some(filter) = &self.filter {
            pairs.push(("filter", filter.clone()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.clone()));
        }
        pairs
    }
}

/// Renders prepared queries as hosted filter/sort expressions.
#[derive(Clone, Debug, Default)]
pub struct FilterExpressionDialect;

impl QueryDialect for FilterExpressionDialect {
    type Output = HostedQuery;

    const AND: &'static str = " && ";
    const SORT_SEPARATOR: &'static str = ",";

    fn condition(&mut self, condition: &Condition) -> String {
        format!(
            "{} {} {}",
            condition.field,
            condition.operator,
            literal(&condition.value)
        )
    }

    fn sort_key(&self, sort: &SortBy) -> String {
        let marker = match sort.direction {
            SortDirection::Asc => '+',
            SortDirection::Desc => '-',
        };
        format!("{}{}", marker, sort.field)
    }

    fn finish(self, filter: Option<String>, sort: Option<String>, query: &PreparedQuery) -> HostedQuery {
        HostedQuery {
            filter,
            sort,
            page: query.page,
            per_page: query.page_size,
        }
    }
}

fn literal(value: &ConditionValue) -> String {
    match value {
        ConditionValue::Text(text) => quoted(text),
        ConditionValue::Number(n) => n.to_string(),
        ConditionValue::DateTime(at) => quoted(&format_hosted_datetime(at)),
    }
}

/// Double-quoted string literal with `\` and `"` escaped.
fn quoted(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

pub(crate) fn format_hosted_datetime(at: &DateTime<Utc>) -> String {
    at.format(HOSTED_DATETIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterOperator, ListQuotesOptions, QuoteField, QuoteFilter};
    use crate::translator::prepare_list_options;

    fn render(options: &ListQuotesOptions) -> HostedQuery {
        FilterExpressionDialect.render(&prepare_list_options(options))
    }

    #[test]
    fn test_empty_options_render_nothing() {
        let query = render(&ListQuotesOptions::default());
        assert_eq!(query.filter, None);
        assert_eq!(query.sort, None);
        assert_eq!(
            query.query_pairs(),
            vec![("page", "1".to_string()), ("perPage", "10".to_string())]
        );
    }

    #[test]
    fn test_date_values_use_hosted_layout() {
        let query = render(&ListQuotesOptions::default().filter(QuoteFilter::new(
            QuoteField::ValidUntil,
            FilterOperator::Lte,
            "2024-12-01T08:00:00Z",
        )));
        assert_eq!(
            query.filter.as_deref(),
            Some(r#"valid_until <= "2024-12-01 08:00:00.000Z""#)
        );
    }

    #[test]
    fn test_numbers_render_unquoted() {
        let query = render(
            &ListQuotesOptions::default()
                .filter(QuoteFilter::new(QuoteField::Subtotal, FilterOperator::Gte, 10.5))
                .filter(QuoteFilter::new(QuoteField::TotalTax, FilterOperator::Eq, "2")),
        );
        assert_eq!(query.filter.as_deref(), Some("subtotal >= 10.5 && total_tax = 2"));
    }

    #[test]
    fn test_text_is_escaped() {
        let query = render(&ListQuotesOptions::default().filter(QuoteFilter::new(
            QuoteField::Status,
            FilterOperator::Eq,
            r#"SE"NT\"#,
        )));
        assert_eq!(query.filter.as_deref(), Some(r#"status = "SE\"NT\\""#));
    }

    #[test]
    fn test_sort_markers_in_order() {
        let query = render(
            &ListQuotesOptions::default()
                .sort(QuoteField::Status, SortDirection::Asc)
                .sort(QuoteField::Created, SortDirection::Desc),
        );
        assert_eq!(query.sort.as_deref(), Some("+status,-created"));
    }
}
