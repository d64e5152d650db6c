//! High-level quote service for applications.
//!
//! Wraps a [`QuoteBackend`] in `Arc` together with its collaborators (time source,
//! current-user info, metrics) so the presentation layer receives one cheap-to-clone
//! handle instead of reaching for global state.

use crate::backend::QuoteBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::key::QueryKeyBuilder;
use crate::model::{
    ListResult, NewQuote, Product, ProductWithQuantity, Quote, QuotePatch, QuoteStatus,
};
use crate::observability::{NoOpMetrics, ServiceMetrics};
use crate::query::ListQuotesOptions;
use crate::totals::calculate_totals;
use crate::translator::prepare_list_options;
use crate::user::{StaticUserInfo, UserInfoProvider};
use chrono::Months;
use std::sync::Arc;
use std::time::Instant;

/// Returned by [`QuoteService::submit_quote`] when no product has a positive quantity.
pub const EMPTY_SELECTION_MESSAGE: &str = "Please select at least one product and try again!";

/// High-level quote service.
///
/// The four storage operations pass straight through to the backend (no retries, no
/// caching). [`submit_quote`](QuoteService::submit_quote) and
/// [`accept_quote`](QuoteService::accept_quote) implement the application flows on
/// top of them.
///
/// # Example
///
/// ```no_run
/// use quote_kit::{QuoteService, backend::EmbeddedBackend, user::StaticUserInfo};
/// use quote_kit::model::ProductWithQuantity;
/// use std::sync::Arc;
///
/// # async fn example() -> quote_kit::Result<()> {
/// let service = QuoteService::new(EmbeddedBackend::in_memory().await?)
///     .with_user_info(Arc::new(StaticUserInfo::default().with("name", "Ada")));
///
/// let selection: Vec<ProductWithQuantity> = service
///     .list_products_with_quantities()
///     .await?
///     .into_iter()
///     .map(|mut p| { p.quantity = 1; p })
///     .collect();
/// service.submit_quote(Some("Office party".to_string()), &selection).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QuoteService<B: QuoteBackend> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    user_info: Arc<dyn UserInfoProvider>,
    metrics: Arc<dyn ServiceMetrics>,
}

impl<B: QuoteBackend> QuoteService<B> {
    /// Create a service over `backend` with the system clock, no user info and no metrics.
    pub fn new(backend: B) -> Self {
        QuoteService {
            backend: Arc::new(backend),
            clock: Arc::new(SystemClock),
            user_info: Arc::new(StaticUserInfo::default()),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Use `clock` for validity windows.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use `user_info` for the customer details of submitted quotes.
    pub fn with_user_info(mut self, user_info: Arc<dyn UserInfoProvider>) -> Self {
        self.user_info = user_info;
        self
    }

    /// Report operations to `metrics`.
    pub fn with_metrics(mut self, metrics: Box<dyn ServiceMetrics>) -> Self {
        self.metrics = Arc::from(metrics);
        self
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Identity key of a list query: `quotes:list:` + stable JSON of the normalized query.
    ///
    /// Option sets that normalize to the same query share a key, so a caller holding
    /// several in-flight lists can drop any response whose key is no longer current.
    ///
    /// # Errors
    /// Returns `Error::SerializationError` if the query cannot be represented as JSON.
    pub fn query_key(options: &ListQuotesOptions) -> Result<String> {
        QueryKeyBuilder::build::<Quote>("list", &prepare_list_options(options))
    }

    /// List one page of quotes.
    ///
    /// # Errors
    /// Propagates backend failures unchanged.
    pub async fn list_quotes(&self, options: &ListQuotesOptions) -> Result<ListResult<Quote>> {
        let start = Instant::now();
        let result = self.observe("list_quotes", self.backend.list_quotes(options).await)?;
        let key = Self::query_key(options)?;
        self.metrics
            .record_list(&key, result.items.len(), start.elapsed());
        Ok(result)
    }

    /// Store a new quote.
    ///
    /// # Errors
    /// - `Error::ValidationError` if required fields are missing or totals are inconsistent
    /// - backend failures unchanged
    pub async fn create_quote(&self, quote: NewQuote) -> Result<()> {
        let start = Instant::now();
        self.observe("create_quote", self.backend.create_quote(quote).await)?;
        self.metrics.record_create(start.elapsed());
        Ok(())
    }

    /// Every product.
    ///
    /// # Errors
    /// Propagates backend failures unchanged.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let start = Instant::now();
        let products = self.observe("list_products", self.backend.list_products().await)?;
        self.metrics.record_products(products.len(), start.elapsed());
        Ok(products)
    }

    /// Every product with a zero quantity, ready for quote assembly.
    ///
    /// # Errors
    /// Propagates backend failures unchanged.
    pub async fn list_products_with_quantities(&self) -> Result<Vec<ProductWithQuantity>> {
        Ok(self
            .list_products()
            .await?
            .into_iter()
            .map(|product| ProductWithQuantity::new(product, 0))
            .collect())
    }

    /// Shallow-merge `patch` over the stored quote.
    ///
    /// # Errors
    /// - `Error::NotFound` if no quote has this id
    /// - backend failures unchanged
    pub async fn patch_quote(&self, id: &str, patch: QuotePatch) -> Result<()> {
        let start = Instant::now();
        self.observe("patch_quote", self.backend.patch_quote(id, patch).await)?;
        self.metrics.record_patch(id, start.elapsed());
        Ok(())
    }

    /// Create a quote from a product selection.
    ///
    /// Line items and totals come from [`calculate_totals`]; the quote is `SENT`, valid
    /// for one calendar month from now (clamped to the end of a shorter month), and
    /// carries the current user's customer details.
    ///
    /// # Errors
    /// - `Error::ValidationError` with [`EMPTY_SELECTION_MESSAGE`] if no product has a
    ///   positive quantity
    /// - any error from [`create_quote`](QuoteService::create_quote)
    pub async fn submit_quote(
        &self,
        description: Option<String>,
        products: &[ProductWithQuantity],
    ) -> Result<()> {
        let totals = calculate_totals(products);
        if totals.items.is_empty() {
            return Err(Error::ValidationError(EMPTY_SELECTION_MESSAGE.to_string()));
        }

        let now = self.clock.now();
        let valid_until = now
            .checked_add_months(Months::new(1))
            .ok_or_else(|| Error::Other(format!("Cannot compute validity after {}", now)))?;

        let quote = NewQuote {
            customer_info: self.user_info.customer_info(),
            status: QuoteStatus::Sent,
            items: totals.items,
            subtotal: totals.subtotal,
            total_tax: totals.total_tax,
            total: totals.total,
            valid_until: Some(valid_until),
            description: description.filter(|d| !d.trim().is_empty()),
        };
        self.create_quote(quote).await
    }

    /// Move a `SENT` quote to `ACCEPTED`.
    ///
    /// # Errors
    /// - `Error::ValidationError` if the quote is in any other state
    /// - any error from [`patch_quote`](QuoteService::patch_quote)
    pub async fn accept_quote(&self, quote: &Quote) -> Result<()> {
        if !quote.status.can_transition_to(QuoteStatus::Accepted) {
            return Err(Error::ValidationError(format!(
                "Quote {} is {} and cannot be accepted",
                quote.id, quote.status
            )));
        }
        self.patch_quote(&quote.id, QuotePatch::status(QuoteStatus::Accepted))
            .await
    }

    fn observe<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.metrics.record_error(operation, &e.to_string());
        }
        result
    }
}

#[cfg(all(test, feature = "embedded"))]
mod tests {
    use super::*;
    use crate::backend::{demo_products, EmbeddedBackend};
    use crate::clock::FixedClock;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(text: &str) -> DateTime<Utc> {
        text.parse().expect("timestamp")
    }

    async fn service(now: DateTime<Utc>) -> QuoteService<EmbeddedBackend> {
        let backend = EmbeddedBackend::in_memory().await.expect("backend");
        backend
            .insert_products(&demo_products(now))
            .await
            .expect("products");
        QuoteService::new(backend)
            .with_clock(Arc::new(FixedClock::new(now)))
            .with_user_info(Arc::new(StaticUserInfo::default().with("name", "O'Brien")))
    }

    async fn selection(service: &QuoteService<EmbeddedBackend>, quantities: &[u32]) -> Vec<ProductWithQuantity> {
        service
            .list_products_with_quantities()
            .await
            .expect("products")
            .into_iter()
            .zip(quantities)
            .map(|(mut p, q)| {
                p.quantity = *q;
                p
            })
            .collect()
    }

    #[tokio::test]
    async fn test_submit_quote() {
        let service = service(at("2024-11-05T12:00:00Z")).await;
        let products = selection(&service, &[1, 2]).await;

        service
            .submit_quote(Some("Party".to_string()), &products)
            .await
            .expect("submit");

        let page = service
            .list_quotes(&ListQuotesOptions::default())
            .await
            .expect("list");
        let quote = &page.items[0];
        assert_eq!(quote.status, QuoteStatus::Sent);
        assert_eq!(quote.items.len(), 2);
        assert!((quote.subtotal - (299.99 + 2.0 * 49.99)).abs() < 1e-9);
        assert!((quote.total_tax - quote.subtotal * 0.10).abs() < 1e-9);
        assert_eq!(quote.valid_until, Some(at("2024-12-05T12:00:00Z")));
        assert_eq!(quote.customer_info["name"], "O'Brien");
        assert_eq!(quote.description.as_deref(), Some("Party"));
    }

    #[tokio::test]
    async fn test_valid_until_clamps_to_month_end() {
        let service = service(at("2024-01-31T09:00:00Z")).await;
        let products = selection(&service, &[0, 1]).await;
        service.submit_quote(None, &products).await.expect("submit");

        let page = service
            .list_quotes(&ListQuotesOptions::default())
            .await
            .expect("list");
        assert_eq!(page.items[0].valid_until, Some(at("2024-02-29T09:00:00Z")));
        assert_eq!(page.items[0].items.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_selection() {
        let service = service(at("2024-11-05T12:00:00Z")).await;
        let products = selection(&service, &[0, 0]).await;

        let err = service.submit_quote(None, &products).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Validation error: {}", EMPTY_SELECTION_MESSAGE));
    }

    #[tokio::test]
    async fn test_accept_quote_only_from_sent() {
        let service = service(at("2024-11-05T12:00:00Z")).await;
        let products = selection(&service, &[1, 0]).await;
        service.submit_quote(None, &products).await.expect("submit");

        let quote = service
            .list_quotes(&ListQuotesOptions::default())
            .await
            .expect("list")
            .items
            .remove(0);
        service.accept_quote(&quote).await.expect("accept");

        let accepted = service
            .list_quotes(&ListQuotesOptions::default())
            .await
            .expect("list")
            .items
            .remove(0);
        assert_eq!(accepted.status, QuoteStatus::Accepted);

        let err = service.accept_quote(&accepted).await.unwrap_err();
        assert!(matches!(err, Error::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_errors_reach_metrics() {
        #[derive(Default)]
        struct Errors(Arc<AtomicUsize>);
        impl ServiceMetrics for Errors {
            fn record_error(&self, _operation: &str, _error: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let service = service(at("2024-11-05T12:00:00Z"))
            .await
            .with_metrics(Box::new(Errors(count.clone())));

        let err = service
            .patch_quote("missing", QuotePatch::status(QuoteStatus::Accepted))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_query_key_is_stable_across_equivalent_options() {
        let a = QuoteService::<EmbeddedBackend>::query_key(&ListQuotesOptions::default().page(0))
            .expect("key");
        let b = QuoteService::<EmbeddedBackend>::query_key(&ListQuotesOptions::default())
            .expect("key");
        assert_eq!(a, b);
        assert!(a.starts_with("quotes:list:{"));
    }
}
