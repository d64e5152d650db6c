//! Records exchanged with the quote backends.
//!
//! Field names follow the record-store wire format (`snake_case`, with list envelopes in
//! `camelCase`), so the same types serialize for the hosted backend and for the
//! embedded store's JSON columns.

use crate::error::{Error, Result};
use crate::record::Record;
use crate::serialization::empty_as_none;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Free-form customer details (name, email, phone, address, city, country).
pub type CustomerInfo = Map<String, Value>;

/// Free-form flat product attributes.
pub type Attributes = Map<String, Value>;

/// Absolute tolerance used when checking stored arithmetic.
const TOLERANCE: f64 = 1e-6;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Lifecycle status of a quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [QuoteStatus; 5] = [
        QuoteStatus::Draft,
        QuoteStatus::Sent,
        QuoteStatus::Accepted,
        QuoteStatus::Rejected,
        QuoteStatus::Expired,
    ];

    /// Wire/storage spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::Draft => "DRAFT",
            QuoteStatus::Sent => "SENT",
            QuoteStatus::Accepted => "ACCEPTED",
            QuoteStatus::Rejected => "REJECTED",
            QuoteStatus::Expired => "EXPIRED",
        }
    }

    /// Transitions the application itself performs. Storage accepts any status.
    pub fn can_transition_to(self, next: QuoteStatus) -> bool {
        matches!((self, next), (QuoteStatus::Sent, QuoteStatus::Accepted))
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        QuoteStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::DeserializationError(format!("unknown quote status: {}", s)))
    }
}

/// A sellable product. Read-only for this crate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub title: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

impl Record for Product {
    fn collection() -> &'static str {
        "products"
    }
}

/// A product plus the quantity picked while assembling a quote. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductWithQuantity {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
}

impl ProductWithQuantity {
    pub fn new(product: Product, quantity: u32) -> Self {
        ProductWithQuantity { product, quantity }
    }
}

/// Snapshot of a product line at quote creation.
///
/// The product is referenced by name, not id, so later product edits never change
/// historical quotes. `subtotal` is fixed at construction to `quantity * price`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteItem {
    product_name: String,
    quantity: u32,
    price: f64,
    subtotal: f64,
}

impl QuoteItem {
    /// Build a line item, computing its subtotal.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` for a zero quantity, an empty name or a
    /// negative/non-finite price.
    pub fn new(product_name: impl Into<String>, quantity: u32, price: f64) -> Result<Self> {
        let item = QuoteItem {
            product_name: product_name.into(),
            quantity,
            price,
            subtotal: f64::from(quantity) * price,
        };
        item.validate()?;
        Ok(item)
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn subtotal(&self) -> f64 {
        self.subtotal
    }

    /// Check the line invariants, including `subtotal == quantity * price`.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` describing the first broken invariant.
    pub fn validate(&self) -> Result<()> {
        if self.product_name.trim().is_empty() {
            return Err(Error::ValidationError(
                "quote item is missing a product name".to_string(),
            ));
        }
        if self.quantity == 0 {
            return Err(Error::ValidationError(format!(
                "quote item `{}` must have a positive quantity",
                self.product_name
            )));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(Error::ValidationError(format!(
                "quote item `{}` has an invalid price {}",
                self.product_name, self.price
            )));
        }
        if !approx_eq(self.subtotal, f64::from(self.quantity) * self.price) {
            return Err(Error::ValidationError(format!(
                "quote item `{}` subtotal {} does not equal {} x {}",
                self.product_name, self.subtotal, self.quantity, self.price
            )));
        }
        Ok(())
    }
}

/// A stored quote.
///
/// Totals are stored, never recomputed on read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub customer_info: CustomerInfo,
    pub status: QuoteStatus,
    pub items: Vec<QuoteItem>,
    pub subtotal: f64,
    pub total_tax: f64,
    pub total: f64,
    #[serde(
        default,
        deserialize_with = "empty_as_none::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "empty_as_none::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

impl Quote {
    /// Materialize a new quote with backend-assigned identity and timestamps.
    pub fn from_new(id: String, now: DateTime<Utc>, quote: NewQuote) -> Self {
        Quote {
            id,
            created: now,
            updated: now,
            customer_info: quote.customer_info,
            status: quote.status,
            items: quote.items,
            subtotal: quote.subtotal,
            total_tax: quote.total_tax,
            total: quote.total,
            valid_until: quote.valid_until,
            description: quote.description.filter(|d| !d.is_empty()),
        }
    }

    /// Shallow-merge a patch over this quote and bump `updated`.
    pub fn apply_patch(&mut self, patch: QuotePatch, now: DateTime<Utc>) {
        if let Some(customer_info) = patch.customer_info {
            self.customer_info = customer_info;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(items) = patch.items {
            self.items = items;
        }
        if let Some(subtotal) = patch.subtotal {
            self.subtotal = subtotal;
        }
        if let Some(total_tax) = patch.total_tax {
            self.total_tax = total_tax;
        }
        if let Some(total) = patch.total {
            self.total = total;
        }
        if let Some(valid_until) = patch.valid_until {
            self.valid_until = Some(valid_until);
        }
        if let Some(description) = patch.description {
            self.description = Some(description).filter(|d| !d.is_empty());
        }
        self.updated = now;
    }
}

impl Record for Quote {
    fn collection() -> &'static str {
        "quotes"
    }
}

/// A quote before the backend assigned its id and timestamps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewQuote {
    pub customer_info: CustomerInfo,
    pub status: QuoteStatus,
    pub items: Vec<QuoteItem>,
    pub subtotal: f64,
    pub total_tax: f64,
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewQuote {
    /// Check required fields and the stored arithmetic before anything is written.
    ///
    /// # Errors
    /// Returns `Error::ValidationError` naming the missing field or broken invariant.
    pub fn validate(&self) -> Result<()> {
        if self.customer_info.is_empty() {
            return Err(Error::ValidationError(
                "quote is missing customer_info".to_string(),
            ));
        }
        if self.items.is_empty() {
            return Err(Error::ValidationError("quote has no items".to_string()));
        }
        for item in &self.items {
            item.validate()?;
        }

        let items_subtotal: f64 = self.items.iter().map(QuoteItem::subtotal).sum();
        if !approx_eq(self.subtotal, items_subtotal) {
            return Err(Error::ValidationError(format!(
                "quote subtotal {} does not equal the sum of its items {}",
                self.subtotal, items_subtotal
            )));
        }
        if !approx_eq(self.total, self.subtotal + self.total_tax) {
            return Err(Error::ValidationError(format!(
                "quote total {} does not equal subtotal {} + tax {}",
                self.total, self.subtotal, self.total_tax
            )));
        }
        Ok(())
    }
}

/// Partial update for a stored quote. `None` fields are left untouched.
///
/// Identity and timestamps are not patchable; `updated` is always set by the backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_info: Option<CustomerInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<QuoteStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<QuoteItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tax: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl QuotePatch {
    /// Patch that only changes the status.
    pub fn status(status: QuoteStatus) -> Self {
        QuotePatch {
            status: Some(status),
            ..QuotePatch::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_customer_info(mut self, customer_info: CustomerInfo) -> Self {
        self.customer_info = Some(customer_info);
        self
    }
}

/// One page of a list query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub items: Vec<T>,
    /// 1-indexed page number.
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    /// `ceil(total_items / per_page)`; 0 when nothing matched.
    pub total_pages: u32,
}

impl<T> ListResult<T> {
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total_items: u64) -> Self {
        ListResult {
            items,
            page,
            per_page,
            total_items,
            total_pages: total_pages(total_items, per_page),
        }
    }
}

/// Page count shared by every backend: `ceil(total_items / per_page)`.
pub fn total_pages(total_items: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    let pages = total_items.div_ceil(u64::from(per_page));
    u32::try_from(pages).unwrap_or(u32::MAX)
}
