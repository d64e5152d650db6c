//! SQLite rendering for the embedded store.
//!
//! Values never appear in the SQL text: every condition binds its value as a `?`
//! parameter. Field names come from [`QuoteField`](crate::query::QuoteField) and are
//! the only identifiers interpolated. Date columns and date parameters both go through
//! `strftime('%Y-%m-%d %H:%M:%f', ..)`, which normalizes any stored layout to one
//! fixed-width form with milliseconds, so they compare as timestamps rather than text.
//! A non-empty ORDER BY ends with `rowid`, so rows tied on every sort key keep insertion
//! order on every page.

use super::{Condition, ConditionValue, PreparedQuery, QueryDialect};
use crate::query::{SortBy, SortDirection};
use chrono::SecondsFormat;

/// Last sort key of every non-empty ORDER BY.
const TIE_BREAKER: &str = "rowid";

/// Value bound to a `?` placeholder.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Text(String),
    Real(f64),
    Integer(i64),
}

/// WHERE / ORDER BY fragments plus their bound values and paging.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlQuery {
    pub where_clause: Option<String>,
    pub order_by: Option<String>,
    /// Parameters for `where_clause`, in placeholder order.
    pub params: Vec<SqlParam>,
    pub limit: u32,
    pub offset: u64,
}

impl SqlQuery {
    /// `SELECT {columns} FROM {table} [WHERE] [ORDER BY] LIMIT ? OFFSET ?`.
    ///
    /// Bind [`SqlQuery::page_params`] after it.
    pub fn select_sql(&self, columns: &str, table: &str) -> String {
        let mut sql = format!("SELECT {} FROM {}", columns, table);
        if let Some(where_clause) = &self.where_clause {
            sql.push(' ');
            sql.push_str(where_clause);
        }
        if let Some(order_by) = &self.order_by {
            sql.push(' ');
            sql.push_str(order_by);
        }
        sql.push_str(" LIMIT ? OFFSET ?");
        sql
    }

    /// `SELECT COUNT(*) FROM {table} [WHERE]`.
    pub fn count_sql(&self, table: &str) -> String {
        match &self.where_clause {
            Some(where_clause) => format!("SELECT COUNT(*) FROM {} {}", table, where_clause),
            None => format!("SELECT COUNT(*) FROM {}", table),
        }
    }

    /// Filter parameters followed by LIMIT and OFFSET, matching [`SqlQuery::select_sql`].
    pub fn page_params(&self) -> Vec<SqlParam> {
        let mut params = self.params.clone();
        params.push(SqlParam::Integer(i64::from(self.limit)));
        params.push(SqlParam::Integer(
            i64::try_from(self.offset).unwrap_or(i64::MAX),
        ));
        params
    }
}

/// Renders prepared queries as parameterized SQLite.
#[derive(Clone, Debug, Default)]
pub struct SqliteDialect {
    params: Vec<SqlParam>,
}

impl QueryDialect for SqliteDialect {
    type Output = SqlQuery;

    const AND: &'static str = " AND ";
    const SORT_SEPARATOR: &'static str = ", ";

    fn condition(&mut self, condition: &Condition) -> String {
        let (placeholder, param) = match &condition.value {
            ConditionValue::Text(text) => ("?".to_string(), SqlParam::Text(text.clone())),
            ConditionValue::Number(n) => ("?".to_string(), SqlParam::Real(*n)),
            ConditionValue::DateTime(at) => (
                timestamp("?"),
                SqlParam::Text(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ),
        };
        self.params.push(param);
        format!(
            "{} {} {}",
            column(condition.field.as_str(), condition.field.is_date()),
            condition.operator,
            placeholder
        )
    }

    fn sort_key(&self, sort: &SortBy) -> String {
        let direction = match sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        format!("{} {}", column(sort.field.as_str(), sort.field.is_date()), direction)
    }

    fn finish(self, filter: Option<String>, sort: Option<String>, query: &PreparedQuery) -> SqlQuery {
        SqlQuery {
            where_clause: filter.map(|f| format!("WHERE {}", f)),
            order_by: sort.map(|s| format!("ORDER BY {}{}{}", s, Self::SORT_SEPARATOR, TIE_BREAKER)),
            params: self.params,
            limit: query.page_size,
            offset: query.offset(),
        }
    }
}

fn column(name: &str, is_date: bool) -> String {
    if is_date {
        timestamp(name)
    } else {
        name.to_string()
    }
}

/// `YYYY-MM-DD HH:MM:SS.SSS` for any SQLite time value; NULL when unparseable.
fn timestamp(expr: &str) -> String {
    format!("strftime('%Y-%m-%d %H:%M:%f', {})", expr)
}
