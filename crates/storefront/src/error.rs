//! Error types with Sentry integration.
//!
//! [`CartError`] is what cart and wishlist operations return. Remote failures
//! are captured to Sentry once, at the point where the engine rolls back, via
//! [`report_sync_failure`].

use thiserror::Error;

use crate::api::ApiError;
use crate::store::StoreError;

/// Failure of a cart operation.
#[derive(Debug, Error)]
pub enum CartError {
    /// The server call failed; the optimistic change (if any) was rolled back.
    #[error("Cart sync failed: {0}")]
    Api(#[from] ApiError),

    /// The product is not in the cart.
    #[error("Product not in cart: {0}")]
    NotInCart(String),

    /// The product is not on the wishlist.
    #[error("Product not on the wishlist: {0}")]
    NotInWishlist(String),
}

impl CartError {
    /// Whether the server rejected the bearer token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        match self {
            Self::Api(e) => e.is_unauthorized(),
            Self::NotInCart(_) | Self::NotInWishlist(_) => false,
        }
    }
}

/// Failure while assembling the storefront context.
#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Capture a failed remote cart operation to Sentry and log it.
///
/// Authorization failures are expected (expired sessions) and only logged.
pub fn report_sync_failure(operation: &str, error: &ApiError) {
    if error.is_unauthorized() {
        tracing::warn!(operation, error = %error, "Cart request was not authorized");
        return;
    }

    let event_id = sentry::capture_error(error);
    tracing::error!(
        operation,
        error = %error,
        sentry_event_id = %event_id,
        "Cart sync failed, rolled back"
    );
}

/// Associate subsequent Sentry events with a logged-in session.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
