//! Quote flow against the embedded SQLite backend.
//!
//! Run with: cargo run --example embedded_quotes

use quote_kit::backend::{EmbeddedBackend, EmbeddedConfig};
use quote_kit::error::Result;
use quote_kit::query::{FilterOperator, ListQuotesOptions, QuoteField, QuoteFilter, SortDirection};
use quote_kit::user::StaticUserInfo;
use quote_kit::{QuoteService, QuoteStatus};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Quote Kit - Embedded Example ===\n");

    // 1. Open the store; an in-memory database is seeded with the demo catalog
    println!("1. Opening embedded store...");
    let backend = EmbeddedBackend::connect(EmbeddedConfig::default()).await?;
    let user_info = StaticUserInfo::default()
        .with("name", "Ada Lovelace")
        .with("email", "ada@example.com")
        .with("country", "UK");
    let service = QuoteService::new(backend).with_user_info(Arc::new(user_info));
    println!("   ✓ Store ready\n");

    // 2. Catalog
    println!("2. Listing products:");
    let mut selection = service.list_products_with_quantities().await?;
    for entry in &selection {
        println!("   - {} (${:.2})", entry.product.title, entry.product.price);
    }
    println!();

    // 3. Submit a quote for two of the first product and one of the second
    println!("3. Submitting a quote:");
    for (entry, quantity) in selection.iter_mut().zip([2, 1]) {
        entry.quantity = quantity;
    }
    service
        .submit_quote(Some("Holiday order".to_string()), &selection)
        .await?;
    println!("   ✓ Quote submitted\n");

    // 4. Filtered, sorted listing
    println!("4. Listing SENT quotes by total (descending):");
    let options = ListQuotesOptions::default()
        .filter(QuoteFilter::new(QuoteField::Status, FilterOperator::Eq, "SENT"))
        .sort(QuoteField::Total, SortDirection::Desc);
    let page = service.list_quotes(&options).await?;
    for quote in &page.items {
        println!(
            "   - {} subtotal ${:.2} tax ${:.2} total ${:.2}",
            quote.id, quote.subtotal, quote.total_tax, quote.total
        );
    }
    println!(
        "   ✓ {} quote(s), page {}/{}\n",
        page.total_items, page.page, page.total_pages
    );

    // 5. Accept it
    if let Some(quote) = page.items.first() {
        println!("5. Accepting quote {}:", quote.id);
        service.accept_quote(quote).await?;
        let accepted = service
            .list_quotes(&ListQuotesOptions::default().filter(QuoteFilter::new(
                QuoteField::Status,
                FilterOperator::Eq,
                QuoteStatus::Accepted.as_str(),
            )))
            .await?;
        println!("   ✓ {} accepted quote(s)\n", accepted.total_items);
    }

    println!("=== Example Complete ===\n");
    Ok(())
}
