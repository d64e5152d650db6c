//! Hosted record-API backend implementation.
//!
//! Talks to a PocketBase-style REST API: records live under
//! `/api/collections/{collection}/records`, lists take `page`, `perPage`, `filter` and
//! `sort` query parameters and answer with a `{page, perPage, totalItems, totalPages,
//! items}` envelope.

use super::QuoteBackend;
use crate::error::{Error, Result};
use crate::model::{ListResult, NewQuote, Product, Quote, QuotePatch};
use crate::query::{ListQuotesOptions, MAX_PAGE_SIZE};
use crate::record::Record;
use crate::translator::{prepare_list_options, FilterExpressionDialect, QueryDialect};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Environment variable overriding [`HostedConfig::base_url`].
pub const POCKETBASE_URL_ENV: &str = "QUOTEKIT_POCKETBASE_URL";

/// Environment variable overriding [`HostedConfig::timeout`], in whole seconds.
pub const HTTP_TIMEOUT_ENV: &str = "QUOTEKIT_HTTP_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8090";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the hosted backend.
#[derive(Clone, Debug)]
pub struct HostedConfig {
    /// Server root, e.g. `http://127.0.0.1:8090`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Page size used while walking a whole collection.
    pub full_list_batch: u32,
}

impl Default for HostedConfig {
    fn default() -> Self {
        HostedConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            full_list_batch: MAX_PAGE_SIZE,
        }
    }
}

impl HostedConfig {
    /// Defaults overridden by `QUOTEKIT_POCKETBASE_URL` and `QUOTEKIT_HTTP_TIMEOUT_SECS`.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the timeout is not a whole number of seconds.
    pub fn from_env() -> Result<Self> {
        let mut config = HostedConfig::default();
        if let Ok(url) = std::env::var(POCKETBASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }
        if let Ok(secs) = std::env::var(HTTP_TIMEOUT_ENV) {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                Error::ConfigError(format!("{} must be whole seconds: {}", HTTP_TIMEOUT_ENV, e))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Defaults pointed at `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        HostedConfig {
            base_url: base_url.into(),
            ..HostedConfig::default()
        }
    }
}

/// Hosted backend over a shared `reqwest` client.
///
/// # Example
///
/// ```no_run
/// # use quote_kit::backend::{HostedBackend, HostedConfig, QuoteBackend};
/// # use quote_kit::error::Result;
/// # async fn example() -> Result<()> {
/// let backend = HostedBackend::new(HostedConfig::with_base_url("http://127.0.0.1:8090"))?;
/// let products = backend.list_products().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HostedBackend {
    client: Client,
    base_url: Url,
    full_list_batch: u32,
}

/// List envelope returned by the record API.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordPage<T> {
    #[serde(default)]
    total_items: i64,
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// Error body returned by the record API.
#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Map<String, serde_json::Value>,
}

impl ApiError {
    fn describe(&self) -> String {
        if self.data.is_empty() {
            self.message.clone()
        } else {
            format!("{} {}", self.message, serde_json::Value::Object(self.data.clone()))
        }
    }
}

impl HostedBackend {
    /// Build the HTTP client. No request is made until the first operation.
    ///
    /// # Errors
    /// - `Error::ConfigError` if `base_url` is not an absolute http(s) URL
    /// - `Error::BackendError` if the HTTP client cannot be built
    pub fn new(config: HostedConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::ConfigError(format!("Invalid base URL {}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::ConfigError(format!(
                "Base URL must be http(s): {}",
                config.base_url
            )));
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        info!("✓ Hosted backend initialized: {}", base_url);

        Ok(HostedBackend {
            client,
            base_url,
            full_list_batch: config.full_list_batch.clamp(1, MAX_PAGE_SIZE),
        })
    }

    /// `{base}/api/{segments...}`, with each segment percent-encoded.
    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::ConfigError(format!("Base URL cannot have a path: {}", self.base_url)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn records_url<R: Record>(&self) -> Result<Url> {
        self.api_url(&["collections", R::collection(), "records"])
    }

    fn record_url<R: Record>(&self, id: &str) -> Result<Url> {
        self.api_url(&["collections", R::collection(), "records", id])
    }

    async fn fetch_page<R: Record>(&self, pairs: &[(&'static str, String)]) -> Result<RecordPage<R>> {
        let url = self.records_url::<R>()?;
        let response = self.client.get(url).query(pairs).send().await?;
        read_json(response).await
    }
}

/// Map a non-2xx response to the crate's error classes.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.describe())
        .unwrap_or(body);
    warn!("✗ Hosted request failed with {}: {}", status, message);

    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::BAD_REQUEST => Error::ValidationError(message),
        _ => Error::BackendError(format!("HTTP {}: {}", status, message)),
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    Ok(check_status(response).await?.json::<T>().await?)
}

impl QuoteBackend for HostedBackend {
    fn name(&self) -> &'static str {
        "hosted"
    }

    async fn list_quotes(&self, options: &ListQuotesOptions) -> Result<ListResult<Quote>> {
        let prepared = prepare_list_options(options);
        let query = FilterExpressionDialect.render(&prepared);
        debug!("→ Hosted list_quotes: {:?} {:?}", query.filter, query.sort);

        let page = self.fetch_page::<Quote>(&query.query_pairs()).await?;

        // totalPages is recomputed so empty results report 0 like every backend.
        Ok(ListResult::new(
            page.items,
            prepared.page,
            prepared.page_size,
            u64::try_from(page.total_items).unwrap_or(0),
        ))
    }

    async fn create_quote(&self, quote: NewQuote) -> Result<()> {
        quote.validate()?;
        debug!("→ Hosted create_quote");

        let url = self.records_url::<Quote>()?;
        let response = self.client.post(url).json(&quote).send().await?;
        check_status(response).await?;

        debug!("✓ Hosted created quote");
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let mut products = Vec::new();
        let mut page = 1u32;
        loop {
            let pairs = [
                ("page", page.to_string()),
                ("perPage", self.full_list_batch.to_string()),
            ];
            let batch = self.fetch_page::<Product>(&pairs).await?;
            let fetched = batch.items.len();
            products.extend(batch.items);

            let total = u64::try_from(batch.total_items).unwrap_or(0);
            if fetched < self.full_list_batch as usize || products.len() as u64 >= total {
                break;
            }
            page += 1;
        }
        debug!("✓ Hosted listed {} products", products.len());
        Ok(products)
    }

    async fn patch_quote(&self, id: &str, patch: QuotePatch) -> Result<()> {
        debug!("→ Hosted patch_quote: {}", id);

        let url = self.record_url::<Quote>(id)?;
        let response = self.client.patch(url).json(&patch).send().await?;
        match check_status(response).await {
            Ok(_) => {
                debug!("✓ Hosted patched quote {}", id);
                Ok(())
            }
            Err(Error::NotFound(message)) => Err(Error::NotFound(format!(
                "Quote with id {} not found: {}",
                id, message
            ))),
            Err(e) => Err(e),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let url = self.api_url(&["health"])?;
        let response = self.client.get(url).send().await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_urls() {
        let backend =
            HostedBackend::new(HostedConfig::with_base_url("http://localhost:8090/")).expect("backend");
        assert_eq!(
            backend.records_url::<Quote>().expect("url").as_str(),
            "http://localhost:8090/api/collections/quotes/records"
        );
        assert_eq!(
            backend.record_url::<Quote>("a b/c").expect("url").as_str(),
            "http://localhost:8090/api/collections/quotes/records/a%20b%2Fc"
        );
    }

    #[test]
    fn test_base_url_with_prefix_path() {
        let backend =
            HostedBackend::new(HostedConfig::with_base_url("https://example.com/pb")).expect("backend");
        assert_eq!(
            backend.records_url::<Product>().expect("url").as_str(),
            "https://example.com/pb/api/collections/products/records"
        );
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        for url in ["not a url", "mailto:someone@example.com"] {
            let err = HostedBackend::new(HostedConfig::with_base_url(url)).err().expect("error");
            assert!(matches!(err, Error::ConfigError(_)), "{}", url);
        }
    }

    #[test]
    fn test_full_list_batch_is_clamped() {
        let backend = HostedBackend::new(HostedConfig {
            full_list_batch: 0,
            ..HostedConfig::default()
        })
        .expect("backend");
        assert_eq!(backend.full_list_batch, 1);
    }

    #[test]
    fn test_api_error_description() {
        let error: ApiError = serde_json::from_str(
            r#"{"code":400,"message":"Failed to create record.","data":{"status":{"code":"validation_invalid_value"}}}"#,
        )
        .expect("error body");
        assert!(error.describe().starts_with("Failed to create record. {"));

        let error: ApiError =
            serde_json::from_str(r#"{"code":404,"message":"Missing.","data":{}}"#).expect("error body");
        assert_eq!(error.describe(), "Missing.");
    }
}
