//! Catalog browsing commands.

use std::io::Write;

use emporium_core::{Product, ProductId, format_price};
use emporium_storefront::api::catalog::{GetProduct, ListCategories};
use emporium_storefront::{SortMode, Storefront};

use super::{CatalogArgs, CommandError};

/// `emporium products`
pub async fn products(
    storefront: &Storefront,
    args: CatalogArgs,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let sort: SortMode = args
        .sort
        .parse()
        .map_err(|e| CommandError::InvalidInput(format!("{e}")))?;

    let mut filters = storefront.composer().initial_state();
    let (default_min, default_max) = filters.price_range();
    filters
        .set_category(args.category.as_str())
        .set_price_range(
            args.min_price.unwrap_or(default_min),
            args.max_price.unwrap_or(default_max),
        )
        .set_min_rating(args.min_rating)
        .set_search_text(args.search)
        .set_sort_mode(sort)
        .set_page(args.page);

    let mut subscription = storefront.compose_and_run(&filters);
    let state = subscription.settled().await;
    if let Some(err) = state.error {
        return Err(err.into());
    }
    let Some(page) = state.data else {
        return Ok(());
    };

    for product in &page.items {
        write_product_row(out, product)?;
    }
    writeln!(
        out,
        "page {}/{} ({} products)",
        page.pagination.page, page.pagination.total_pages, page.pagination.total
    )?;
    Ok(())
}

/// `emporium product <id>`
pub async fn product(
    storefront: &Storefront,
    id: i64,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let product = storefront
        .gateway()
        .fetch::<GetProduct>(ProductId::new(id))
        .await?;

    write_product_row(out, &product)?;
    if !product.description.is_empty() {
        writeln!(out, "\n{}", product.description)?;
    }
    writeln!(
        out,
        "\nstock: {}  reviews: {}  saved: {}  in cart: {}",
        product.stock,
        product.review_count,
        if storefront.wishlist().has(product.id) { "yes" } else { "no" },
        storefront.cart().quantity_of(product.id).unwrap_or(0),
    )?;
    Ok(())
}

/// `emporium categories`
pub async fn categories(storefront: &Storefront, out: &mut impl Write) -> Result<(), CommandError> {
    let categories = storefront.gateway().fetch::<ListCategories>(()).await?;
    for category in categories.iter() {
        writeln!(
            out,
            "{:<20} {:<28} {:>5}",
            category.slug, category.name, category.product_count
        )?;
    }
    Ok(())
}

fn write_product_row(out: &mut impl Write, product: &Product) -> std::io::Result<()> {
    let price = match product.original_price {
        Some(original) if product.is_on_sale() => {
            format!("{} (was {})", format_price(product.price), format_price(original))
        }
        _ => format_price(product.price),
    };
    let rating = product
        .rating
        .map_or_else(|| "-".to_string(), |r| format!("{r:.1}"));

    writeln!(
        out,
        "{:>6}  {:<40} {:>22}  {:>4}",
        product.id, product.title, price, rating
    )
}
