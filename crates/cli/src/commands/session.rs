//! Login and logout.

use bazaar_storefront::Storefront;
use bazaar_storefront::error::{clear_sentry_user, set_sentry_user};
use bazaar_storefront::services::auth;
use secrecy::SecretString;

use super::{CommandError, cart};

/// Store the token and merge the guest cart into the account's cart.
///
/// A failed merge leaves the guest cart stored for the next login.
pub async fn login(storefront: &Storefront, token: String) -> Result<(), CommandError> {
    let token = SecretString::from(token);
    if let Some(user_id) = auth::user_id(&token) {
        set_sentry_user(&user_id);
    }
    let result = storefront.cart().on_login(token).await;

    cart::print(&storefront.cart().state());
    result?;
    tracing::info!("Logged in");
    Ok(())
}

/// Drop the token; the cart stays as a guest cart.
pub fn logout(storefront: &Storefront) {
    storefront.cart().on_logout();
    clear_sentry_user();
    cart::print(&storefront.cart().state());
}
