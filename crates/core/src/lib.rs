//! Bazaar Core - Shared types library.
//!
//! This crate provides the types shared by all Bazaar components:
//! - `storefront` - Cart engine, wishlist, local store and REST client
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for product IDs, quantities and prices,
//!   plus the catalog and cart line records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
