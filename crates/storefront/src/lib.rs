//! Bazaar storefront client library.
//!
//! Keeps a shopper's cart consistent between a durable local store (guest
//! mode) and the storefront REST API (authenticated mode), with optimistic
//! updates, per-product debouncing of quantity changes and rollback on
//! failure. Also holds the local-only wishlist, catalog search and the auth
//! session.
//!
//! # Modules
//!
//! - [`api`] - REST client and the [`api::CartService`] seam
//! - [`cart`] - the cart engine
//! - [`store`] - durable key-value store
//! - [`services`] - auth session, catalog search and wishlist
//! - [`state`] - [`Storefront`], the per-session context

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod store;

pub use cart::{CartEngine, CartEvent, CartOperation, CartState};
pub use config::StorefrontConfig;
pub use error::{CartError, StorefrontError};
pub use state::Storefront;
