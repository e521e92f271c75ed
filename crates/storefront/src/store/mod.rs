//! Durable local key-value store.
//!
//! Persists the guest cart, the wishlist and the bearer token across runs.
//! Values are opaque JSON blobs under named keys; there is no schema
//! versioning and no transaction spanning several keys.
//!
//! # Failure policy
//!
//! The store never raises to its callers. A failed write is logged and
//! dropped; a missing key or a value that is not valid JSON loads as `None`
//! (and as the empty default through [`LocalStore::load_or_default`]).
//!
//! # Backends
//!
//! - [`FileBackend`] - one `<key>.json` file per key in a data directory
//! - [`MemoryBackend`] - in-process map, used by tests

mod file;
mod memory;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Keys used in the local store.
pub mod keys {
    /// Key for the serialized guest cart line list.
    pub const GUEST_CART: &str = "cart_items";

    /// Key for the serialized wishlist.
    pub const WISHLIST: &str = "wishlist";

    /// Key for the bearer token of the logged-in user.
    pub const AUTH_TOKEN: &str = "auth_token";
}

/// Errors raised by a storage backend.
///
/// These never escape [`LocalStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key contains characters that cannot be used as a file name.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Raw string storage behind a [`LocalStore`].
pub trait KeyValueBackend: Send + Sync {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete the value stored under `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Typed, fail-soft JSON store over a [`KeyValueBackend`].
///
/// Cheaply cloneable; clones share the same backend.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl LocalStore {
    /// Create a store over the given backend.
    #[must_use]
    pub fn new(backend: impl KeyValueBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Create a store backed by an in-memory map.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::default())
    }

    /// Persist `value` under `key`, replacing any previous value.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize value for local store");
                return;
            }
        };

        if let Err(e) = self.backend.set(key, &json) {
            warn!(key, error = %e, "Failed to write to local store");
        }
    }

    /// Load the value stored under `key`.
    ///
    /// Returns `None` if the key is missing, unreadable, or not valid JSON
    /// for `T`.
    #[must_use]
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "Failed to read from local store");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding malformed local store entry");
                None
            }
        }
    }

    /// Load the value stored under `key`, or the type's empty default.
    #[must_use]
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.load(key).unwrap_or_default()
    }

    /// Delete the value stored under `key`.
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!(key, error = %e, "Failed to remove local store entry");
        }
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let store = LocalStore::in_memory();
        store.save("numbers", &vec![1, 2, 3]);
        assert_eq!(store.load::<Vec<i32>>("numbers"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_save_replaces_previous_value() {
        let store = LocalStore::in_memory();
        store.save("k", &"first");
        store.save("k", &"second");
        assert_eq!(store.load::<String>("k").as_deref(), Some("second"));
    }

    #[test]
    fn test_missing_key_is_none() {
        let store = LocalStore::in_memory();
        assert_eq!(store.load::<Vec<i32>>("absent"), None);
        assert!(store.load_or_default::<Vec<i32>>("absent").is_empty());
    }

    #[test]
    fn test_malformed_json_defaults_to_empty() {
        let backend = MemoryBackend::default();
        backend.set(keys::GUEST_CART, "{not json").unwrap();
        let store = LocalStore::new(backend);

        assert_eq!(store.load::<Vec<i32>>(keys::GUEST_CART), None);
        assert!(store.load_or_default::<Vec<i32>>(keys::GUEST_CART).is_empty());
    }

    #[test]
    fn test_remove() {
        let store = LocalStore::in_memory();
        store.save("k", &42);
        store.remove("k");
        assert_eq!(store.load::<i32>("k"), None);

        // Removing twice is fine
        store.remove("k");
    }
}
