//! Subcommand implementations.
//!
//! Output is written to the handle passed in, never straight to stdout, so
//! the commands stay testable against a buffer.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod orders;

use clap::{Args, Subcommand};
use emporium_storefront::{ApiError, StorefrontError};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Catalog filters for `products`.
#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Category slug, or `all`
    #[arg(short, long, default_value = "all")]
    pub category: String,

    #[arg(long)]
    pub min_price: Option<Decimal>,

    #[arg(long)]
    pub max_price: Option<Decimal>,

    /// Minimum stars (2, 3 or 4)
    #[arg(short = 'r', long, default_value_t = 0)]
    pub min_rating: u8,

    /// Free-text search
    #[arg(short, long, default_value = "")]
    pub search: String,

    /// default, priceAsc, priceDesc, ratingDesc or newest
    #[arg(long, default_value = "default")]
    pub sort: String,

    #[arg(short, long, default_value_t = 1)]
    pub page: u32,
}

#[derive(Debug, Subcommand)]
pub enum CartAction {
    /// List the cart's lines and subtotal
    Show,
    /// Add a product
    Add {
        product_id: i64,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity
    Set { product_id: i64, quantity: u32 },
    /// Remove a line
    Remove { product_id: i64 },
    /// Empty the cart
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum WishlistAction {
    /// List saved products
    Show,
    /// Save a product, or unsave it if already saved
    Toggle { product_id: i64 },
    /// Move a saved product into the cart
    Move { product_id: i64 },
    /// Remove every saved product
    Clear,
}
