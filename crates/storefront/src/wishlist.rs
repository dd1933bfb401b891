//! Wishlist of saved products, persisted like the cart.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use emporium_core::{Product, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cart::{CartLine, CartStore};
use crate::error::add_breadcrumb;
use crate::storage::{DurableStore, keys};

/// A saved product, with enough of it to render a card offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub product_id: ProductId,
    pub title: String,
    #[serde(alias = "price")]
    pub unit_price: Decimal,
    #[serde(default, alias = "imageRef")]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_pct: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: u32,
}

impl From<&Product> for WishlistEntry {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            title: product.title.clone(),
            unit_price: product.price,
            image_url: product.image_url.clone(),
            original_price: product.original_price,
            discount_pct: product.discount_pct,
            rating: product.rating,
            review_count: product.review_count,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedWishlist {
    entries: Vec<WishlistEntry>,
}

#[derive(Serialize)]
struct PersistedWishlistRef<'a> {
    entries: &'a [WishlistEntry],
}

/// Saved entries in insertion order, indexed by product for membership tests.
#[derive(Debug, Default)]
struct SavedEntries {
    entries: Vec<WishlistEntry>,
    ids: HashSet<ProductId>,
}

impl SavedEntries {
    /// Build from persisted entries, keeping the first of any duplicates.
    fn from_entries(entries: Vec<WishlistEntry>) -> Self {
        let mut saved = Self::default();
        for entry in entries {
            saved.insert(entry);
        }
        saved
    }

    fn contains(&self, product_id: ProductId) -> bool {
        self.ids.contains(&product_id)
    }

    fn get(&self, product_id: ProductId) -> Option<&WishlistEntry> {
        if !self.contains(product_id) {
            return None;
        }
        self.entries.iter().find(|e| e.product_id == product_id)
    }

    fn insert(&mut self, entry: WishlistEntry) -> bool {
        if !self.ids.insert(entry.product_id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    fn remove(&mut self, product_id: ProductId) -> bool {
        if !self.ids.remove(&product_id) {
            return false;
        }
        self.entries.retain(|e| e.product_id != product_id);
        true
    }

    fn clear(&mut self) -> bool {
        let had_entries = !self.entries.is_empty();
        self.entries.clear();
        self.ids.clear();
        had_entries
    }
}

/// Shared handle to the wishlist. Holds at most one entry per product.
#[derive(Clone)]
pub struct WishlistStore {
    inner: Arc<WishlistInner>,
}

struct WishlistInner {
    saved: RwLock<SavedEntries>,
    store: DurableStore,
}

impl std::fmt::Debug for WishlistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistStore")
            .field("entries", &self.read().entries)
            .finish_non_exhaustive()
    }
}

impl WishlistStore {
    /// Load the persisted wishlist, dropping duplicate products.
    #[must_use]
    pub fn load(store: DurableStore) -> Self {
        let entries = store
            .load::<PersistedWishlist>(keys::WISHLIST)
            .unwrap_or_default()
            .entries;

        let saved = SavedEntries::from_entries(entries);
        debug!(entries = saved.entries.len(), "Loaded wishlist");

        Self {
            inner: Arc::new(WishlistInner {
                saved: RwLock::new(saved),
                store,
            }),
        }
    }

    /// Add the entry if its product is absent, remove it otherwise.
    /// Returns whether the product is saved afterwards.
    pub fn toggle(&self, entry: WishlistEntry) -> bool {
        let product_id = entry.product_id;
        let saved = self.update(|saved| {
            if saved.remove(product_id) {
                (false, true)
            } else {
                saved.insert(entry);
                (true, true)
            }
        });

        add_breadcrumb(
            "wishlist",
            if saved { "Saved item" } else { "Unsaved item" },
            Some(&[("product_id", &product_id.to_string())]),
        );
        saved
    }

    /// Save an entry. Returns `false` if the product was already saved.
    pub fn add(&self, entry: WishlistEntry) -> bool {
        self.update(|saved| {
            let added = saved.insert(entry);
            (added, added)
        })
    }

    /// Returns whether the product was saved.
    pub fn remove(&self, product_id: ProductId) -> bool {
        self.update(|saved| {
            let removed = saved.remove(product_id);
            (removed, removed)
        })
    }

    pub fn clear(&self) {
        self.update(|saved| ((), saved.clear()));
    }

    /// Move a saved product into the cart with quantity 1.
    ///
    /// Returns `false` and leaves both stores untouched if the product is not
    /// saved.
    pub fn move_to_cart(&self, product_id: ProductId, cart: &CartStore) -> bool {
        let Some(entry) = self.read().get(product_id).cloned() else {
            return false;
        };

        cart.add_item(CartLine {
            product_id: entry.product_id,
            title: entry.title,
            unit_price: entry.unit_price,
            image_url: entry.image_url,
            quantity: 1,
        });
        self.remove(product_id)
    }

    #[must_use]
    pub fn has(&self, product_id: ProductId) -> bool {
        self.read().contains(product_id)
    }

    /// Entries in the order they were saved.
    #[must_use]
    pub fn entries(&self) -> Vec<WishlistEntry> {
        self.read().entries.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, SavedEntries> {
        self.inner.saved.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f`, which returns its result and whether it changed anything,
    /// and persist once on change.
    fn update<R>(&self, f: impl FnOnce(&mut SavedEntries) -> (R, bool)) -> R {
        let mut saved = self
            .inner
            .saved
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let (result, changed) = f(&mut saved);
        if changed {
            let persisted = PersistedWishlistRef {
                entries: &saved.entries,
            };
            self.inner.store.save(keys::WISHLIST, &persisted);
        }
        result
    }
}
