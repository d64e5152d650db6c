//! Embedded SQLite backend implementation.
//!
//! Quotes and products live in two tables mirroring the record shapes. `customer_info`,
//! `items` and `attributes` are stored as JSON text and decoded on read; timestamps are
//! stored as RFC 3339 text with millisecond precision. Every value reaches SQLite as a
//! bound parameter.

use super::QuoteBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::model::{Attributes, ListResult, NewQuote, Product, Quote, QuotePatch};
use crate::query::ListQuotesOptions;
use crate::record::Record;
use crate::serialization::{decode_json_column, encode_json_column};
use crate::translator::{prepare_list_options, QueryDialect, SqlParam, SqliteDialect};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;

/// Environment variable overriding [`EmbeddedConfig::url`].
pub const SQLITE_URL_ENV: &str = "QUOTEKIT_SQLITE_URL";

const DEFAULT_URL: &str = "sqlite::memory:";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const ID_LENGTH: usize = 15;
const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const QUOTE_COLUMNS: &str =
    "id, created, updated, customer_info, status, items, subtotal, total_tax, total, valid_until, description";
const PRODUCT_COLUMNS: &str = "id, created, updated, title, description, price, in_stock, attributes";

const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        created TEXT NOT NULL,
        updated TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        price REAL NOT NULL,
        in_stock INTEGER DEFAULT 1,
        attributes TEXT
    )",
    "CREATE TABLE IF NOT EXISTS quotes (
        id TEXT PRIMARY KEY,
        created TEXT NOT NULL,
        updated TEXT NOT NULL,
        customer_info TEXT NOT NULL,
        status TEXT NOT NULL,
        items TEXT NOT NULL,
        subtotal REAL NOT NULL,
        total_tax REAL NOT NULL,
        total REAL NOT NULL,
        valid_until TEXT,
        description TEXT,
        CONSTRAINT status_check CHECK (
            status IN ('DRAFT', 'SENT', 'ACCEPTED', 'REJECTED', 'EXPIRED')
        )
    )",
];

/// Binds a list of [`SqlParam`]s onto a `sqlx` query in placeholder order.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                SqlParam::Text(text) => query.bind(text.clone()),
                SqlParam::Real(value) => query.bind(*value),
                SqlParam::Integer(value) => query.bind(*value),
            };
        }
        query
    }};
}

/// Configuration for the embedded backend.
#[derive(Clone, Debug)]
pub struct EmbeddedConfig {
    /// `sqlx` SQLite URL, e.g. `sqlite::memory:` or `sqlite://quotes.db`.
    pub url: String,
    /// Pool size for file databases. In-memory databases always use one connection.
    pub max_connections: u32,
    /// Insert [`demo_products`] when the products table is empty.
    pub seed_demo_products: bool,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        EmbeddedConfig {
            url: DEFAULT_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            seed_demo_products: true,
        }
    }
}

impl EmbeddedConfig {
    /// Defaults, with the URL taken from `QUOTEKIT_SQLITE_URL` when set.
    pub fn from_env() -> Self {
        let mut config = EmbeddedConfig::default();
        if let Ok(url) = std::env::var(SQLITE_URL_ENV) {
            if !url.trim().is_empty() {
                config.url = url.trim().to_string();
            }
        }
        config
    }

    /// Empty in-memory database, no demo products.
    pub fn in_memory() -> Self {
        EmbeddedConfig {
            seed_demo_products: false,
            ..EmbeddedConfig::default()
        }
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// SQLite backend with a `sqlx` connection pool.
///
/// # Example
///
/// ```no_run
/// # use quote_kit::backend::{EmbeddedBackend, QuoteBackend};
/// # use quote_kit::query::ListQuotesOptions;
/// # use quote_kit::error::Result;
/// # async fn example() -> Result<()> {
/// let backend = EmbeddedBackend::in_memory().await?;
/// let page = backend.list_quotes(&ListQuotesOptions::default()).await?;
/// assert_eq!(page.total_pages, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EmbeddedBackend {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl EmbeddedBackend {
    /// Open the database, create the schema and optionally seed demo products.
    ///
    /// # Errors
    /// Returns `Err` if the URL is invalid or the database cannot be opened.
    pub async fn connect(config: EmbeddedConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        // An in-memory database lives exactly as long as its connection.
        let pool_options = if config.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        let backend = EmbeddedBackend {
            pool,
            clock: Arc::new(SystemClock),
        };
        backend.create_schema().await?;

        if config.seed_demo_products && backend.count_products().await? == 0 {
            backend.insert_products(&demo_products(backend.clock.now())).await?;
        }

        info!("✓ Embedded backend initialized: {}", config.url);
        Ok(backend)
    }

    /// Empty in-memory backend.
    ///
    /// # Errors
    /// Returns `Err` if SQLite cannot be initialized.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(EmbeddedConfig::in_memory()).await
    }

    /// Use `clock` for assigned `created`/`updated` timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Insert products as-is, keeping their ids and timestamps.
    ///
    /// # Errors
    /// Returns `Err` if an id already exists or the write fails.
    pub async fn insert_products(&self, products: &[Product]) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            Product::collection(),
            PRODUCT_COLUMNS
        );
        for product in products {
            let attributes = product
                .attributes
                .as_ref()
                .map(encode_json_column)
                .transpose()?;
            sqlx::query(&sql)
                .bind(&product.id)
                .bind(format_timestamp(&product.created))
                .bind(format_timestamp(&product.updated))
                .bind(&product.title)
                .bind(product.description.as_deref())
                .bind(product.price)
                .bind(product.in_stock)
                .bind(attributes)
                .execute(&self.pool)
                .await?;
        }
        debug!("✓ Embedded inserted {} products", products.len());
        Ok(())
    }

    async fn create_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn count_products(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", Product::collection());
        Ok(sqlx::query_scalar::<_, i64>(&sql).fetch_one(&self.pool).await?)
    }

    async fn fetch_quote(&self, id: &str) -> Result<Option<Quote>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            QUOTE_COLUMNS,
            Quote::collection()
        );
        let row = sqlx::query_as::<_, QuoteRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Quote::try_from).transpose()
    }
}

impl QuoteBackend for EmbeddedBackend {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn list_quotes(&self, options: &ListQuotesOptions) -> Result<ListResult<Quote>> {
        let prepared = prepare_list_options(options);
        let query = SqliteDialect::default().render(&prepared);
        debug!(
            "→ Embedded list_quotes: {:?} {:?}",
            query.where_clause, query.order_by
        );

        let count_sql = query.count_sql(Quote::collection());
        let total_items: i64 = bind_params!(sqlx::query_scalar::<_, i64>(&count_sql), &query.params)
            .fetch_one(&self.pool)
            .await?;

        let select_sql = query.select_sql(QUOTE_COLUMNS, Quote::collection());
        let page_params = query.page_params();
        let rows: Vec<QuoteRow> = bind_params!(sqlx::query_as::<_, QuoteRow>(&select_sql), &page_params)
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(Quote::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(ListResult::new(
            items,
            prepared.page,
            prepared.page_size,
            u64::try_from(total_items).unwrap_or(0),
        ))
    }

    async fn create_quote(&self, quote: NewQuote) -> Result<()> {
        quote.validate()?;
        let quote = Quote::from_new(generate_id(), self.clock.now(), quote);
        debug!("→ Embedded create_quote: {}", quote.id);

        let sql = format!(
            "INSERT INTO {} ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            Quote::collection(),
            QUOTE_COLUMNS
        );
        sqlx::query(&sql)
            .bind(&quote.id)
            .bind(format_timestamp(&quote.created))
            .bind(format_timestamp(&quote.updated))
            .bind(encode_json_column(&quote.customer_info)?)
            .bind(quote.status.as_str())
            .bind(encode_json_column(&quote.items)?)
            .bind(quote.subtotal)
            .bind(quote.total_tax)
            .bind(quote.total)
            .bind(quote.valid_until.as_ref().map(format_timestamp))
            .bind(quote.description.as_deref())
            .execute(&self.pool)
            .await?;

        debug!("✓ Embedded created quote {}", quote.id);
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let sql = format!("SELECT {} FROM {}", PRODUCT_COLUMNS, Product::collection());
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn patch_quote(&self, id: &str, patch: QuotePatch) -> Result<()> {
        debug!("→ Embedded patch_quote: {}", id);
        let mut quote = self
            .fetch_quote(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Quote with id {} not found", id)))?;

        quote.apply_patch(patch, self.clock.now());

        let sql = format!(
            "UPDATE {} SET updated = ?, customer_info = ?, status = ?, items = ?, subtotal = ?, \
             total_tax = ?, total = ?, valid_until = ?, description = ? WHERE id = ?",
            Quote::collection()
        );
        let result = sqlx::query(&sql)
            .bind(format_timestamp(&quote.updated))
            .bind(encode_json_column(&quote.customer_info)?)
            .bind(quote.status.as_str())
            .bind(encode_json_column(&quote.items)?)
            .bind(quote.subtotal)
            .bind(quote.total_tax)
            .bind(quote.total)
            .bind(quote.valid_until.as_ref().map(format_timestamp))
            .bind(quote.description.as_deref())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Quote with id {} not found", id)));
        }
        debug!("✓ Embedded patched quote {}", id);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(one == 1)
    }
}

#[derive(sqlx::FromRow)]
struct QuoteRow {
    id: String,
    created: String,
    updated: String,
    customer_info: String,
    status: String,
    items: String,
    subtotal: f64,
    total_tax: f64,
    total: f64,
    valid_until: Option<String>,
    description: Option<String>,
}

impl TryFrom<QuoteRow> for Quote {
    type Error = Error;

    fn try_from(row: QuoteRow) -> Result<Self> {
        Ok(Quote {
            created: parse_timestamp(&row.created)?,
            updated: parse_timestamp(&row.updated)?,
            customer_info: decode_json_column("customer_info", &row.customer_info)?,
            status: row.status.parse()?,
            items: decode_json_column("items", &row.items)?,
            subtotal: row.subtotal,
            total_tax: row.total_tax,
            total: row.total,
            valid_until: non_empty(row.valid_until)
                .map(|text| parse_timestamp(&text))
                .transpose()?,
            description: non_empty(row.description),
            id: row.id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    created: String,
    updated: String,
    title: String,
    description: Option<String>,
    price: f64,
    in_stock: Option<bool>,
    attributes: Option<String>,
}

impl TryFrom<ProductRow> for Product {
    type Error = Error;

    fn try_from(row: ProductRow) -> Result<Self> {
        let attributes = non_empty(row.attributes)
            .map(|text| decode_json_column::<Attributes>("attributes", &text))
            .transpose()?;
        Ok(Product {
            created: parse_timestamp(&row.created)?,
            updated: parse_timestamp(&row.updated)?,
            title: row.title,
            description: non_empty(row.description),
            price: row.price,
            in_stock: row.in_stock,
            attributes,
            id: row.id,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}

/// Random 15-character lowercase alphanumeric id.
fn generate_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LENGTH)
        .map(|_| char::from(ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())]))
        .collect()
}

/// Products seeded into a fresh embedded store.
pub fn demo_products(now: DateTime<Utc>) -> Vec<Product> {
    let attributes = |value: serde_json::Value| value.as_object().cloned();
    vec![
        Product {
            id: "cheese".to_string(),
            created: now,
            updated: now,
            title: "Premium Cheese".to_string(),
            description: Some("Delicious cheese for special occasions".to_string()),
            price: 299.99,
            in_stock: Some(true),
            attributes: attributes(json!({
                "color": "yellow",
                "weight": "2.5kg",
                "dimensions": "30x20x10cm"
            })),
        },
        Product {
            id: "wine".to_string(),
            created: now,
            updated: now,
            title: "Red Wine".to_string(),
            description: Some("Affordable wine for everyday use".to_string()),
            price: 49.99,
            in_stock: Some(true),
            attributes: attributes(json!({ "color": "red" })),
        },
    ]
}
