//! Metrics hooks for quote service operations.
//!
//! Implement [`ServiceMetrics`] to feed your monitoring system:
//!
//! ```
//! use quote_kit::observability::ServiceMetrics;
//! use std::time::Duration;
//!
//! struct CountingMetrics;
//!
//! impl ServiceMetrics for CountingMetrics {
//!     fn record_list(&self, _key: &str, _items: usize, _duration: Duration) {
//!         // counter!("quote_lists").inc();
//!     }
//! }
//! ```
//!
//! Every method has a default that logs through the `log` crate, so an implementation
//! only overrides what it measures. [`NoOpMetrics`] discards everything and is what
//! [`QuoteService`](crate::QuoteService) uses unless told otherwise.

use std::time::Duration;

/// Trait for service metrics collection.
pub trait ServiceMetrics: Send + Sync {
    /// A quote page was listed. `key` is the query identity key.
    fn record_list(&self, key: &str, items: usize, duration: Duration) {
        debug!("Quote LIST: {} returned {} in {:?}", key, items, duration);
    }

    /// The product catalog was listed.
    fn record_products(&self, count: usize, duration: Duration) {
        debug!("Product LIST: {} products in {:?}", count, duration);
    }

    /// A quote was created.
    fn record_create(&self, duration: Duration) {
        debug!("Quote CREATE took {:?}", duration);
    }

    /// A quote was patched.
    fn record_patch(&self, id: &str, duration: Duration) {
        debug!("Quote PATCH: {} took {:?}", id, duration);
    }

    /// An operation failed.
    fn record_error(&self, operation: &str, error: &str) {
        warn!("Quote service ERROR in {}: {}", operation, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl ServiceMetrics for NoOpMetrics {
    fn record_list(&self, _key: &str, _items: usize, _duration: Duration) {}
    fn record_products(&self, _count: usize, _duration: Duration) {}
    fn record_create(&self, _duration: Duration) {}
    fn record_patch(&self, _id: &str, _duration: Duration) {}
    fn record_error(&self, _operation: &str, _error: &str) {}
}
