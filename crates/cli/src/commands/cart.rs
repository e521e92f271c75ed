//! Cart commands.

use bazaar_core::{ProductId, Quantity};
use bazaar_storefront::{CartError, CartState, Storefront};

use super::{CommandError, catalog};

pub async fn add(storefront: &Storefront, product_id: &str) -> Result<(), CommandError> {
    let product = catalog::find(storefront, product_id).await?;
    storefront.cart().add_to_cart(&product).await?;
    Ok(())
}

pub fn set(storefront: &Storefront, product_id: &str, quantity: u32) -> Result<(), CommandError> {
    let quantity = Quantity::new(quantity).ok_or(CommandError::InvalidQuantity(quantity))?;
    let product_id = in_cart(storefront, product_id)?;
    storefront.cart().set_quantity(&product_id, quantity);
    Ok(())
}

pub fn inc(storefront: &Storefront, product_id: &str) -> Result<(), CommandError> {
    let product_id = in_cart(storefront, product_id)?;
    storefront.cart().increase_quantity(&product_id);
    Ok(())
}

pub fn dec(storefront: &Storefront, product_id: &str) -> Result<(), CommandError> {
    let product_id = in_cart(storefront, product_id)?;
    storefront.cart().decrease_quantity(&product_id);
    Ok(())
}

pub async fn remove(storefront: &Storefront, product_id: &str) -> Result<(), CommandError> {
    let product_id = in_cart(storefront, product_id)?;
    storefront.cart().remove_from_cart(&product_id).await?;
    Ok(())
}

fn in_cart(storefront: &Storefront, product_id: &str) -> Result<ProductId, CommandError> {
    let product_id = ProductId::new(product_id);
    if storefront.cart().state().line(&product_id).is_none() {
        return Err(CartError::NotInCart(product_id.into_inner()).into());
    }
    Ok(product_id)
}

/// Print the cart with its totals.
#[allow(clippy::print_stdout)]
pub fn print(state: &CartState) {
    println!("Cart ({}, {})", state.mode, state.sync_status);
    if state.is_empty() {
        println!("  (empty)");
        return;
    }

    for line in &state.lines {
        println!(
            "  {:<26} {:<32} {:>4} x {:>10} = {:>10}",
            line.product_id,
            line.name,
            line.quantity,
            line.price.to_string(),
            line.line_total().to_string()
        );
    }
    println!(
        "  {} item(s), subtotal {}",
        state.item_count(),
        state.subtotal()
    );
    if let Some(error) = &state.last_error {
        println!("  last error: {error}");
    }
}
