//! Session context shared by front ends.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::cart::CartEngine;
use crate::config::StorefrontConfig;
use crate::error::StorefrontError;
use crate::services::{AuthSession, WishlistStore};
use crate::store::{FileBackend, LocalStore};

/// Everything a front end needs for one user session.
///
/// This struct is cheaply cloneable via `Arc`. All parts share one local
/// store, so the cart, wishlist and token persist side by side.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    api: ApiClient,
    store: LocalStore,
    auth: AuthSession,
    cart: CartEngine<ApiClient>,
    wishlist: WishlistStore,
}

impl Storefront {
    /// Open the file-backed store in `config.data_dir` and build the session.
    ///
    /// A token in `config.auth_token` replaces the stored one.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn open(config: StorefrontConfig) -> Result<Self, StorefrontError> {
        let store = LocalStore::new(FileBackend::open(config.data_dir.clone())?);
        Ok(Self::with_store(config, store))
    }

    /// Build the session on top of an existing store.
    #[must_use]
    pub fn with_store(config: StorefrontConfig, store: LocalStore) -> Self {
        let api = ApiClient::new(config.api_url.clone());
        let auth = AuthSession::load(store.clone());
        if let Some(token) = &config.auth_token {
            auth.set_token(token.clone());
        }
        let cart = CartEngine::new(api.clone(), store.clone(), auth.clone(), config.cart_debounce);
        let wishlist = WishlistStore::load(store.clone());

        Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                store,
                auth,
                cart,
                wishlist,
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the REST API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the local store.
    #[must_use]
    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    /// Get a reference to the auth session.
    #[must_use]
    pub fn auth(&self) -> &AuthSession {
        &self.inner.auth
    }

    /// Get a reference to the cart engine.
    #[must_use]
    pub fn cart(&self) -> &CartEngine<ApiClient> {
        &self.inner.cart
    }

    /// Get a reference to the wishlist.
    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore {
        &self.inner.wishlist
    }
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("config", &self.inner.config)
            .field("auth", &self.inner.auth)
            .field("cart", &self.inner.cart)
            .field("wishlist", &self.inner.wishlist)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::{ExposeSecret, SecretString};
    use url::Url;

    use super::*;
    use crate::store::keys;

    fn config() -> StorefrontConfig {
        StorefrontConfig::new(Url::parse("http://127.0.0.1:9").unwrap(), ".unused")
    }

    #[test]
    fn test_parts_share_one_store() {
        let store = LocalStore::in_memory();
        let storefront = Storefront::with_store(config(), store.clone());

        storefront.auth().set_token(SecretString::from("abc"));
        assert_eq!(store.load::<String>(keys::AUTH_TOKEN).as_deref(), Some("abc"));
        assert!(storefront.cart().lines().is_empty());
        assert!(storefront.wishlist().is_empty());
    }

    #[test]
    fn test_configured_token_seeds_session() {
        let store = LocalStore::in_memory();
        let config = StorefrontConfig {
            auth_token: Some(SecretString::from("from-env")),
            ..config()
        };

        let storefront = Storefront::with_store(config, store);
        assert_eq!(
            storefront.auth().token().unwrap().expose_secret(),
            "from-env"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = StorefrontConfig {
            auth_token: Some(SecretString::from("super_secret_token")),
            ..config()
        };
        let storefront = Storefront::with_store(config, LocalStore::in_memory());
        assert!(!format!("{storefront:?}").contains("super_secret_token"));
    }
}
