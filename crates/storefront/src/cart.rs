//! Shopping cart.
//!
//! The cart lives entirely on the client. Every mutation is synchronous and
//! persisted before it returns; a mutation that changes nothing writes
//! nothing. Totals are always derived from the lines, never stored.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use emporium_core::{Product, ProductId, line_total};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::add_breadcrumb;
use crate::storage::{DurableStore, keys};

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub title: String,
    /// Price per unit when the line was added.
    pub unit_price: Decimal,
    #[serde(default, alias = "imageRef")]
    pub image_url: String,
    /// Always at least 1.
    pub quantity: u32,
}

impl CartLine {
    /// A line for `quantity` units of `product`.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            title: product.title.clone(),
            unit_price: product.price,
            image_url: product.image_url.clone(),
            quantity,
        }
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        line_total(self.unit_price, self.quantity)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("cannot check out an empty cart")]
    EmptyCart,

    #[error("sign in to check out")]
    NotSignedIn,
}

/// Snapshot of the cart handed to checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutDraft {
    pub lines: Vec<CartLine>,
    pub subtotal: Decimal,
    pub item_count: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedCart {
    lines: Vec<CartLine>,
}

/// Shared handle to the cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartInner>,
}

struct CartInner {
    lines: RwLock<Vec<CartLine>>,
    store: DurableStore,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("lines", &*self.read())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Load the persisted cart, falling back to empty.
    ///
    /// Lines persisted by an older build are repaired: duplicates of one
    /// product are merged and zero quantities raised to 1.
    #[must_use]
    pub fn load(store: DurableStore) -> Self {
        let persisted = store.load::<PersistedCart>(keys::CART).unwrap_or_default();
        let lines = sanitize(persisted.lines);
        debug!(lines = lines.len(), "Loaded cart");

        Self {
            inner: Arc::new(CartInner {
                lines: RwLock::new(lines),
                store,
            }),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `line`, merging it into an existing line for the same product by
    /// incrementing that line's quantity. A quantity of 0 counts as 1.
    pub fn add_item(&self, mut line: CartLine) {
        line.quantity = line.quantity.max(1);
        let product_id = line.product_id;
        let added = line.quantity;

        self.update(|lines| {
            match lines.iter_mut().find(|l| l.product_id == product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(added);
                }
                None => lines.push(line),
            }
            true
        });

        add_breadcrumb(
            "cart",
            "Added item",
            Some(&[
                ("product_id", &product_id.to_string()),
                ("quantity", &added.to_string()),
            ]),
        );
    }

    /// Add `quantity` units of `product`.
    pub fn add_product(&self, product: &Product, quantity: u32) {
        if !product.in_stock() {
            warn!(product_id = %product.id, "Adding out-of-stock product to cart");
        }
        self.add_item(CartLine::from_product(product, quantity));
    }

    /// Set the quantity of a line. Values below 1 are clamped to 1; use
    /// [`Self::remove_item`] to drop a line. Returns `false` if the product
    /// is not in the cart.
    pub fn set_quantity(&self, product_id: ProductId, quantity: u32) -> bool {
        let quantity = quantity.max(1);
        let mut found = false;

        self.update(|lines| {
            let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) else {
                return false;
            };
            found = true;
            if line.quantity == quantity {
                return false;
            }
            line.quantity = quantity;
            true
        });

        found
    }

    /// Add one unit of a product already in the cart.
    pub fn increment(&self, product_id: ProductId) -> bool {
        self.quantity_of(product_id)
            .is_some_and(|q| self.set_quantity(product_id, q.saturating_add(1)))
    }

    /// Remove one unit. A line at quantity 1 stays at 1.
    pub fn decrement(&self, product_id: ProductId) -> bool {
        self.quantity_of(product_id)
            .is_some_and(|q| self.set_quantity(product_id, q.saturating_sub(1)))
    }

    /// Remove a product's line. Returns whether it was present.
    pub fn remove_item(&self, product_id: ProductId) -> bool {
        let removed = self.update(|lines| {
            let before = lines.len();
            lines.retain(|l| l.product_id != product_id);
            lines.len() != before
        });

        if removed {
            add_breadcrumb(
                "cart",
                "Removed item",
                Some(&[("product_id", &product_id.to_string())]),
            );
        }
        removed
    }

    /// Remove every line.
    pub fn clear(&self) {
        let cleared = self.update(|lines| {
            let had_lines = !lines.is_empty();
            lines.clear();
            had_lines
        });

        if cleared {
            add_breadcrumb("cart", "Cleared cart", None);
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.read().clone()
    }

    /// Sum of every line total.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.read().iter().map(CartLine::total).sum()
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.read()
            .iter()
            .fold(0_u32, |count, line| count.saturating_add(line.quantity))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.quantity_of(product_id).is_some()
    }

    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.read()
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.quantity)
    }

    /// Snapshot of the cart for checkout.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] if there is nothing to order.
    pub fn checkout_draft(&self) -> Result<CheckoutDraft, CheckoutError> {
        let lines = self.read();
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        Ok(CheckoutDraft {
            subtotal: lines.iter().map(CartLine::total).sum(),
            item_count: lines
                .iter()
                .fold(0_u32, |count, line| count.saturating_add(line.quantity)),
            lines: lines.clone(),
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn read(&self) -> RwLockReadGuard<'_, Vec<CartLine>> {
        self.inner.lines.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<CartLine>> {
        self.inner.lines.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` and persist once if it reports a change.
    fn update(&self, f: impl FnOnce(&mut Vec<CartLine>) -> bool) -> bool {
        let mut lines = self.write();
        let changed = f(&mut lines);
        if changed {
            let persisted = PersistedCartRef { lines: &lines };
            self.inner.store.save(keys::CART, &persisted);
        }
        changed
    }
}

#[derive(Serialize)]
struct PersistedCartRef<'a> {
    lines: &'a [CartLine],
}

/// Merge duplicate products and raise zero quantities to 1.
fn sanitize(lines: Vec<CartLine>) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    for mut line in lines {
        line.quantity = line.quantity.max(1);
        match merged.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(line),
        }
    }
    merged
}
