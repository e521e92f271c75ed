//! Storefront REST API client.
//!
//! # Architecture
//!
//! - Plain JSON request/response over `reqwest`, bearer token per call
//! - The server is source of truth for authenticated carts - NO local cache
//! - One attempt per call: no retry, no backoff
//!
//! # Endpoints
//!
//! ## Cart (authenticated)
//! - `GET /api/cart` - fetch the user's cart
//! - `POST /api/cart/add` - add units of a product
//! - `PUT /api/cart/update` - set a line's quantity
//! - `DELETE /api/cart/remove/{productId}` - remove a line
//! - `DELETE /api/cart/clear` - empty the cart
//! - `POST /api/cart/merge` - merge a guest cart into the user's cart
//!
//! ## Catalog (public)
//! - `GET /api/products` - list products
//!
//! Cart responses are wrapped in `{ "status": bool, "message": .., "data": .. }`;
//! the catalog is a bare product array.
//! Cart lines come back either nested (`{ product: {..}, quantity }`) or
//! flattened (`{ productId, name, price, .., quantity }`); both normalize to
//! [`CartLine`].
//!
//! # Example
//!
//! ```rust,ignore
//! use bazaar_storefront::api::{ApiClient, CartService};
//!
//! let client = ApiClient::new(config.api_url.clone());
//!
//! // Browse the catalog
//! let products = client.products().await?;
//!
//! // Add the first one to the user's cart
//! let lines = client.add_item(&token, &products[0].id, Quantity::ONE).await?;
//! ```

mod client;
mod conversions;
mod types;

use std::future::Future;

use bazaar_core::{CartLine, ProductId, Quantity};
use secrecy::SecretString;
use thiserror::Error;

pub use client::ApiClient;

/// Errors that can occur when calling the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, TLS, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token was rejected (missing, invalid or expired).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Server returned a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server message or truncated body.
        message: String,
    },

    /// Server answered with `status: false`.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// Response envelope carried no `data`.
    #[error("Response has no data")]
    MissingData,

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether the server rejected the bearer token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

/// Remote cart operations used by the cart engine.
///
/// Every call is a single request; every successful call returning lines
/// returns the server's canonical cart after the change.
pub trait CartService: Send + Sync + 'static {
    /// Fetch the user's cart.
    fn fetch_cart(
        &self,
        token: &SecretString,
    ) -> impl Future<Output = Result<Vec<CartLine>, ApiError>> + Send;

    /// Add `quantity` units of a product.
    fn add_item(
        &self,
        token: &SecretString,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Vec<CartLine>, ApiError>> + Send;

    /// Set the quantity of a product's line.
    fn set_quantity(
        &self,
        token: &SecretString,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Vec<CartLine>, ApiError>> + Send;

    /// Remove a product's line.
    fn remove_item(
        &self,
        token: &SecretString,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Vec<CartLine>, ApiError>> + Send;

    /// Empty the cart.
    fn clear(&self, token: &SecretString) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Merge guest lines into the user's cart; the result replaces local state.
    fn merge(
        &self,
        token: &SecretString,
        guest_lines: &[CartLine],
    ) -> impl Future<Output = Result<Vec<CartLine>, ApiError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Status {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: Internal Server Error");

        let err = ApiError::Rejected("Product not found".to_string());
        assert_eq!(err.to_string(), "Rejected by server: Product not found");
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(ApiError::Unauthorized("jwt expired".to_string()).is_unauthorized());
        assert!(!ApiError::MissingData.is_unauthorized());
    }
}
