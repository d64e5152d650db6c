//! # quote-kit
//!
//! Quote and product record access behind one interface, with interchangeable backends.
//!
//! ## Features
//!
//! - **One contract, two backends:** a hosted record REST API (`hosted` feature) and an
//!   embedded SQLite store (`embedded` feature) answer the same four operations with the
//!   same filtering, ordering, paging and error semantics
//! - **Shared query translation:** list options are normalized once and only rendered
//!   differently per backend, so the backends cannot drift apart
//! - **Safe by construction:** the SQLite backend binds every value as a parameter
//! - **Explicit wiring:** clock, current-user info and metrics are injected into
//!   [`QuoteService`], never read from global state
//!
//! ## Quick Start
//!
//! ```no_run
//! use quote_kit::{QuoteService, backend::{AnyBackend, BackendConfig}};
//! use quote_kit::query::{FilterOperator, ListQuotesOptions, QuoteField, QuoteFilter, SortDirection};
//!
//! # async fn example() -> quote_kit::Result<()> {
//! // QUOTEKIT_BACKEND=embedded|hosted picks the backend.
//! let backend = AnyBackend::connect(BackendConfig::from_env()?).await?;
//! let service = QuoteService::new(backend);
//!
//! let options = ListQuotesOptions::default()
//!     .filter(QuoteFilter::new(QuoteField::Status, FilterOperator::Eq, "SENT"))
//!     .sort(QuoteField::Total, SortDirection::Desc)
//!     .page_size(20);
//! let page = service.list_quotes(&options).await?;
//! println!("{} of {} quotes", page.items.len(), page.total_items);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod clock;
pub mod error;
pub mod key;
pub mod model;
pub mod observability;
pub mod query;
pub mod record;
pub mod retry;
pub mod serialization;
pub mod service;
pub mod totals;
pub mod translator;
pub mod user;

// Re-exports for convenience
pub use backend::QuoteBackend;
pub use error::{Error, Result};
pub use model::{ListResult, NewQuote, Product, ProductWithQuantity, Quote, QuoteItem, QuotePatch, QuoteStatus};
pub use query::{ListQuotesOptions, QuoteFilter};
pub use record::Record;
pub use retry::RetryPolicy;
pub use service::QuoteService;
pub use totals::{calculate_totals, QuoteTotals, TAX_RATE};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
