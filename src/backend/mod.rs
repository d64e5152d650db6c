//! Record-store backends for quotes and products.

use crate::error::Result;
use crate::model::{ListResult, NewQuote, Product, Quote, QuotePatch};
use crate::query::ListQuotesOptions;

#[cfg(feature = "embedded")]
pub mod embedded;
#[cfg(feature = "hosted")]
pub mod hosted;

#[cfg(feature = "embedded")]
pub use embedded::{demo_products, EmbeddedBackend, EmbeddedConfig};
#[cfg(feature = "hosted")]
pub use hosted::{HostedBackend, HostedConfig};

/// Trait for quote backend implementations.
///
/// Every implementation must be observably identical from the caller's side: same
/// filtering, ordering, paging, validation and error classes for the same data.
/// Implementations: Embedded (SQLite, default), Hosted (record REST API).
///
/// **IMPORTANT:** All methods use `&self`; implementations hold shareable handles
/// (connection pool, HTTP client) and are cheap to clone.
///
/// **ASYNC:** All methods are async and must be awaited. None retries internally.
#[allow(async_fn_in_trait)]
pub trait QuoteBackend: Send + Sync + Clone {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// List one page of quotes.
    ///
    /// Filters, sort and paging are normalized by
    /// [`prepare_list_options`](crate::translator::prepare_list_options) first.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable or returns undecodable records.
    async fn list_quotes(&self, options: &ListQuotesOptions) -> Result<ListResult<Quote>>;

    /// Store a new quote, assigning its id and `created`/`updated` timestamps.
    ///
    /// Resolves only after the backend confirmed the write.
    ///
    /// # Errors
    /// - `Error::ValidationError` if required fields are missing or totals are inconsistent
    /// - `Error::BackendError` on transport/storage failure
    async fn create_quote(&self, quote: NewQuote) -> Result<()>;

    /// Every product, unpaginated.
    ///
    /// # Errors
    /// Returns `Err` if the backend is unreachable or returns undecodable records.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Shallow-merge `patch` over the stored quote and set `updated` to now.
    ///
    /// Resolves only after the backend confirmed the write.
    ///
    /// # Errors
    /// - `Error::NotFound` if no quote has this id
    /// - `Error::BackendError` on transport/storage failure
    async fn patch_quote(&self, id: &str, patch: QuotePatch) -> Result<()>;

    /// Health check - verify backend is accessible.
    ///
    /// # Errors
    /// Returns `Err` if backend is not accessible
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(any(feature = "embedded", feature = "hosted"))]
pub use selection::{AnyBackend, BackendConfig};

#[cfg(any(feature = "embedded", feature = "hosted"))]
mod selection {
    use super::*;
    use crate::error::Error;

    /// Environment variable choosing the backend: `embedded` (default) or `hosted`.
    pub const BACKEND_ENV: &str = "QUOTEKIT_BACKEND";

    /// Which backend to build, and how.
    #[derive(Clone, Debug)]
    pub enum BackendConfig {
        #[cfg(feature = "embedded")]
        Embedded(EmbeddedConfig),
        #[cfg(feature = "hosted")]
        Hosted(HostedConfig),
    }

    impl BackendConfig {
        /// Read the backend choice and its settings from the environment.
        ///
        /// # Errors
        /// - `Error::ConfigError` for an unknown backend kind or malformed settings
        /// - `Error::NotImplemented` if the chosen backend's feature is disabled
        pub fn from_env() -> Result<Self> {
            let kind = std::env::var(BACKEND_ENV).unwrap_or_else(|_| "embedded".to_string());
            Self::from_kind(kind.trim())
        }

        fn from_kind(kind: &str) -> Result<Self> {
            match kind {
                "embedded" => embedded_from_env(),
                "hosted" => hosted_from_env(),
                other => Err(Error::ConfigError(format!(
                    "{} must be `embedded` or `hosted`, got `{}`",
                    BACKEND_ENV, other
                ))),
            }
        }
    }

    #[cfg(feature = "embedded")]
    fn embedded_from_env() -> Result<BackendConfig> {
        Ok(BackendConfig::Embedded(EmbeddedConfig::from_env()))
    }

    #[cfg(not(feature = "embedded"))]
    fn embedded_from_env() -> Result<BackendConfig> {
        Err(Error::NotImplemented(
            "embedded backend requires the `embedded` feature".to_string(),
        ))
    }

    #[cfg(feature = "hosted")]
    fn hosted_from_env() -> Result<BackendConfig> {
        Ok(BackendConfig::Hosted(HostedConfig::from_env()?))
    }

    #[cfg(not(feature = "hosted"))]
    fn hosted_from_env() -> Result<BackendConfig> {
        Err(Error::NotImplemented(
            "hosted backend requires the `hosted` feature".to_string(),
        ))
    }

    /// Backend chosen at runtime from a [`BackendConfig`].
    ///
    /// Lets the application pick its backend from configuration and hand one concrete
    /// type to [`QuoteService`](crate::QuoteService).
    #[derive(Clone)]
    pub enum AnyBackend {
        #[cfg(feature = "embedded")]
        Embedded(EmbeddedBackend),
        #[cfg(feature = "hosted")]
        Hosted(HostedBackend),
    }

    impl AnyBackend {
        /// Build the configured backend.
        ///
        /// # Errors
        /// Returns `Err` if the backend cannot be initialized.
        pub async fn connect(config: BackendConfig) -> Result<Self> {
            match config {
                #[cfg(feature = "embedded")]
                BackendConfig::Embedded(config) => {
                    Ok(AnyBackend::Embedded(EmbeddedBackend::connect(config).await?))
                }
                #[cfg(feature = "hosted")]
                BackendConfig::Hosted(config) => Ok(AnyBackend::Hosted(HostedBackend::new(config)?)),
            }
        }
    }

    impl QuoteBackend for AnyBackend {
        fn name(&self) -> &'static str {
            match self {
                #[cfg(feature = "embedded")]
                AnyBackend::Embedded(backend) => backend.name(),
                #[cfg(feature = "hosted")]
                AnyBackend::Hosted(backend) => backend.name(),
            }
        }

        async fn list_quotes(&self, options: &ListQuotesOptions) -> Result<ListResult<Quote>> {
            match self {
                #[cfg(feature = "embedded")]
                AnyBackend::Embedded(backend) => backend.list_quotes(options).await,
                #[cfg(feature = "hosted")]
                AnyBackend::Hosted(backend) => backend.list_quotes(options).await,
            }
        }

        async fn create_quote(&self, quote: NewQuote) -> Result<()> {
            match self {
                #[cfg(feature = "embedded")]
                AnyBackend::Embedded(backend) => backend.create_quote(quote).await,
                #[cfg(feature = "hosted")]
                AnyBackend::Hosted(backend) => backend.create_quote(quote).await,
            }
        }

        async fn list_products(&self) -> Result<Vec<Product>> {
            match self {
                #[cfg(feature = "embedded")]
                AnyBackend::Embedded(backend) => backend.list_products().await,
                #[cfg(feature = "hosted")]
                AnyBackend::Hosted(backend) => backend.list_products().await,
            }
        }

        async fn patch_quote(&self, id: &str, patch: QuotePatch) -> Result<()> {
            match self {
                #[cfg(feature = "embedded")]
                AnyBackend::Embedded(backend) => backend.patch_quote(id, patch).await,
                #[cfg(feature = "hosted")]
                AnyBackend::Hosted(backend) => backend.patch_quote(id, patch).await,
            }
        }

        async fn health_check(&self) -> Result<bool> {
            match self {
                #[cfg(feature = "embedded")]
                AnyBackend::Embedded(backend) => backend.health_check().await,
                #[cfg(feature = "hosted")]
                AnyBackend::Hosted(backend) => backend.health_check().await,
            }
        }
    }

}
