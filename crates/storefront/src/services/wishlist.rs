//! Wishlist persisted in the local store.
//!
//! The wishlist is local-only: it is never synced with the server and does
//! not change on login or logout.

use std::sync::{Arc, Mutex, PoisonError};

use bazaar_core::{Product, ProductId};
use tracing::{debug, instrument};

use crate::api::CartService;
use crate::cart::CartEngine;
use crate::error::{CartError, add_breadcrumb};
use crate::store::{LocalStore, keys};

/// Saved products, unique by id, in the order they were added.
///
/// Cheaply cloneable; clones share the same list.
#[derive(Clone)]
pub struct WishlistStore {
    inner: Arc<WishlistInner>,
}

struct WishlistInner {
    store: LocalStore,
    items: Mutex<Vec<Product>>,
}

impl WishlistStore {
    /// Restore the wishlist from the local store. A missing or unreadable
    /// entry yields an empty wishlist.
    #[must_use]
    pub fn load(store: LocalStore) -> Self {
        let items: Vec<Product> = store.load_or_default(keys::WISHLIST);
        debug!(items = items.len(), "Wishlist loaded");

        Self {
            inner: Arc::new(WishlistInner {
                store,
                items: Mutex::new(items),
            }),
        }
    }

    /// A copy of the saved products.
    #[must_use]
    pub fn items(&self) -> Vec<Product> {
        self.lock().clone()
    }

    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.lock().iter().any(|p| &p.id == product_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Save a product. Returns `false` if it was already saved.
    pub fn add(&self, product: Product) -> bool {
        let mut items = self.lock();
        if items.iter().any(|p| p.id == product.id) {
            return false;
        }
        add_breadcrumb(
            "wishlist",
            "Added to wishlist",
            Some(&[("product_id", product.id.as_str())]),
        );
        items.push(product);
        self.inner.store.save(keys::WISHLIST, items.as_slice());
        true
    }

    /// Drop a product. Returns the removed product, if it was saved.
    pub fn remove(&self, product_id: &ProductId) -> Option<Product> {
        let mut items = self.lock();
        let index = items.iter().position(|p| &p.id == product_id)?;
        let product = items.remove(index);
        self.inner.store.save(keys::WISHLIST, items.as_slice());
        Some(product)
    }

    /// Add the product if it is not saved, remove it otherwise. Returns
    /// whether it is saved afterwards.
    pub fn toggle(&self, product: Product) -> bool {
        if self.remove(&product.id).is_some() {
            false
        } else {
            self.add(product)
        }
    }

    pub fn clear(&self) {
        let mut items = self.lock();
        items.clear();
        self.inner.store.save(keys::WISHLIST, items.as_slice());
    }

    /// Add a saved product to the cart and drop it from the wishlist.
    ///
    /// The product stays saved if the cart refuses it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInWishlist`] if the product is not on the
    /// wishlist, or the cart error.
    #[instrument(skip(self, cart), fields(product_id = %product_id))]
    pub async fn move_to_cart<S: CartService>(
        &self,
        product_id: &ProductId,
        cart: &CartEngine<S>,
    ) -> Result<Product, CartError> {
        let product = self
            .lock()
            .iter()
            .find(|p| &p.id == product_id)
            .cloned()
            .ok_or_else(|| CartError::NotInWishlist(product_id.to_string()))?;

        cart.add_to_cart(&product).await?;
        self.remove(product_id);
        Ok(product)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Product>> {
        self.inner.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for WishlistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistStore")
            .field("items", &self.len())
            .finish_non_exhaustive()
    }
}
