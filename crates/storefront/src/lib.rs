//! Emporium Storefront library.
//!
//! Client-side commerce state and query layer: the cart, wishlist, and
//! session stores with durable local persistence, a query gateway caching
//! remote API results with tag-based invalidation, and the catalog composer
//! turning UI filter state into product list queries.
//!
//! [`Storefront`] ties them together; UI code holds one and calls into it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod session;
pub mod state;
pub mod storage;
pub mod wishlist;

pub use cart::{CartLine, CartStore, CheckoutDraft, CheckoutError};
pub use catalog::{CatalogComposer, CategoryFilter, MinRating, QueryFilterState, SortMode};
pub use config::StorefrontConfig;
pub use error::{Result, StorefrontError};
pub use gateway::{ApiError, QueryGateway, QueryState, QueryStatus, QuerySubscription};
pub use session::{Session, SessionStore, UserPatch};
pub use state::Storefront;
pub use storage::{DurableStore, FileStorage, MemoryStorage};
pub use wishlist::{WishlistEntry, WishlistStore};
