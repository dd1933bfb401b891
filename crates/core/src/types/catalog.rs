//! Catalog types: products and categories.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId};

/// A product as the storefront displays it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    /// Pre-discount price, present only when the product is on sale.
    pub original_price: Option<Decimal>,
    /// Discount percentage (0-100), present only when the product is on sale.
    pub discount_pct: Option<u8>,
    pub image_url: String,
    pub images: Vec<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Average rating on a 0-5 scale.
    pub rating: Option<f64>,
    pub review_count: u32,
    pub stock: u32,
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Whether at least one unit can be ordered.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Whether the product is currently discounted.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.original_price.is_some_and(|original| original > self.price)
    }
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// URL-safe identifier, used as the catalog filter value.
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub product_count: u32,
}
