//! CLI command implementations.

pub mod cart;
pub mod catalog;
pub mod session;
pub mod wishlist;

use bazaar_storefront::api::ApiError;
use bazaar_storefront::{CartError, CartEvent, StorefrontError};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The session could not be opened.
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    /// Cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Catalog request failed.
    #[error("Catalog request failed: {0}")]
    Api(#[from] ApiError),

    /// No catalog product with this id.
    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    /// Quantities start at 1.
    #[error("Invalid quantity: {0} (must be at least 1)")]
    InvalidQuantity(u32),

    /// Product is not on the wishlist.
    #[error("Not on the wishlist: {0}")]
    NotInWishlist(String),
}

/// Print background sync failures collected during the run.
#[allow(clippy::print_stderr)]
pub fn report_sync_failures(events: &mut broadcast::Receiver<CartEvent>) {
    while let Ok(event) = events.try_recv() {
        if let CartEvent::SyncFailed {
            operation,
            product_id,
            message,
        } = event
        {
            match product_id {
                Some(id) => eprintln!("warning: {operation} for {id} failed and was undone: {message}"),
                None => eprintln!("warning: {operation} failed: {message}"),
            }
        }
    }
}
