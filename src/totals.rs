//! Quote totals from a product selection.

use crate::model::{ProductWithQuantity, QuoteItem};

/// Tax applied to a quote's subtotal when it is created.
///
/// Stored totals are never recomputed, so changing this only affects new quotes.
pub const TAX_RATE: f64 = 0.10;

/// Line items and totals for a new quote.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuoteTotals {
    pub items: Vec<QuoteItem>,
    pub subtotal: f64,
    pub total_tax: f64,
    pub total: f64,
}

/// Compute line items, subtotal, tax and total.
///
/// Products with quantity 0 are skipped; an empty selection yields all zeros.
/// A product whose price is negative or not finite is skipped as well.
pub fn calculate_totals(products: &[ProductWithQuantity]) -> QuoteTotals {
    let items: Vec<QuoteItem> = products
        .iter()
        .filter(|p| p.quantity > 0)
        .filter_map(|p| {
            QuoteItem::new(p.product.title.clone(), p.quantity, p.product.price)
                .map_err(|e| warn!("Skipping product {}: {}", p.product.id, e))
                .ok()
        })
        .collect();

    let subtotal: f64 = items.iter().map(QuoteItem::subtotal).sum();
    let total_tax = subtotal * TAX_RATE;
    let total = subtotal + total_tax;

    QuoteTotals {
        items,
        subtotal,
        total_tax,
        total,
    }
}
