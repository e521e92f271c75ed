//! Client-side services around the cart.
//!
//! # Services
//!
//! - `auth` - bearer token session with client-side JWT expiry
//! - `catalog` - client-side product search
//! - `wishlist` - local-only saved products

pub mod auth;
pub mod catalog;
pub mod wishlist;

pub use auth::AuthSession;
pub use wishlist::WishlistStore;
