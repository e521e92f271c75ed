//! Wishlist commands.

use bazaar_core::{Product, ProductId};
use bazaar_storefront::Storefront;

use super::{CommandError, catalog};

pub async fn add(storefront: &Storefront, product_id: &str) -> Result<(), CommandError> {
    let product = catalog::find(storefront, product_id).await?;
    if !storefront.wishlist().add(product) {
        tracing::info!(product_id, "Already on the wishlist");
    }
    Ok(())
}

pub fn remove(storefront: &Storefront, product_id: &str) -> Result<(), CommandError> {
    storefront
        .wishlist()
        .remove(&ProductId::new(product_id))
        .map(|_| ())
        .ok_or_else(|| CommandError::NotInWishlist(product_id.to_string()))
}

pub async fn move_to_cart(storefront: &Storefront, product_id: &str) -> Result<(), CommandError> {
    storefront
        .wishlist()
        .move_to_cart(&ProductId::new(product_id), storefront.cart())
        .await?;
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn print(items: &[Product]) {
    println!("Wishlist ({} item(s))", items.len());
    for product in items {
        println!(
            "  {:<26} {:<32} {:>10}",
            product.id,
            product.name,
            product.price.to_string()
        );
    }
}
