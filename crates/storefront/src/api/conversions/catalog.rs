use emporium_core::{Category, CategoryId, Product, ProductId};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::slugify;
use crate::api::wire::{CategoryRef, CategoryWire, ProductWire};
use crate::gateway::ApiError;

pub(crate) fn product(wire: ProductWire) -> Result<Product, ApiError> {
    if wire.price.is_sign_negative() {
        return Err(ApiError::parsing(format!(
            "product {} has a negative price",
            wire.id
        )));
    }

    // A compare-at price no higher than the price is not a sale.
    let original_price = wire.original_price.filter(|original| *original > wire.price);
    let discount_pct = wire
        .discount_pct
        .filter(|pct| *pct > 0.0)
        .map(|pct| pct.round().clamp(0.0, 100.0))
        .and_then(|pct| pct.to_u8())
        .or_else(|| original_price.and_then(|original| discount(original, wire.price)));

    let image_url = wire
        .image_url
        .or_else(|| wire.images.first().cloned())
        .unwrap_or_default();

    Ok(Product {
        id: ProductId::new(wire.id),
        title: wire.title,
        description: wire.description.unwrap_or_default(),
        price: wire.price,
        original_price,
        discount_pct,
        image_url,
        images: wire.images,
        category: wire.category.and_then(category_slug),
        rating: wire.rating.map(|r| r.clamp(0.0, 5.0)),
        review_count: wire.review_count.unwrap_or(0),
        stock: wire.stock.unwrap_or(0),
        created_at: wire.created_at,
    })
}

/// Whole-percent discount of `price` against `original`.
fn discount(original: Decimal, price: Decimal) -> Option<u8> {
    if original <= Decimal::ZERO {
        return None;
    }
    ((original - price) / original * Decimal::ONE_HUNDRED)
        .round()
        .to_u8()
        .filter(|pct| *pct > 0)
}

fn category_slug(reference: CategoryRef) -> Option<String> {
    match reference {
        CategoryRef::Slug(slug) => Some(slug).filter(|s| !s.is_empty()),
        CategoryRef::Object { slug, name } => slug
            .filter(|s| !s.is_empty())
            .or_else(|| name.map(|n| slugify(&n))),
    }
}

#[allow(clippy::unnecessary_wraps)]
pub(crate) fn category(wire: CategoryWire) -> Result<Category, ApiError> {
    let slug = wire
        .slug
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&wire.name));

    Ok(Category {
        id: CategoryId::new(wire.id),
        name: wire.name,
        slug,
        description: wire.description,
        image_url: wire.image_url,
        product_count: wire.product_count.unwrap_or(0),
    })
}
