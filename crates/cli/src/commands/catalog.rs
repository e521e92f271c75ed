//! Catalog commands.

use bazaar_core::{Product, ProductId};
use bazaar_storefront::Storefront;
use bazaar_storefront::services::catalog;

use super::CommandError;

/// Print the catalog, narrowed by a search query and a category.
#[allow(clippy::print_stdout)]
pub async fn list(
    storefront: &Storefront,
    query: Option<&str>,
    category: Option<&str>,
) -> Result<(), CommandError> {
    let products = storefront.api().products().await?;
    let found = catalog::search(&products, query.unwrap_or_default(), category);
    if found.is_empty() {
        println!("No products found.");
        return Ok(());
    }

    for product in found {
        println!(
            "{:<26} {:<32} {:>10}  {}",
            product.id, product.name, product.price.to_string(), product.category
        );
    }
    Ok(())
}

/// Print up to five products matching `query`.
#[allow(clippy::print_stdout)]
pub async fn suggest(storefront: &Storefront, query: &str) -> Result<(), CommandError> {
    let products = storefront.api().products().await?;
    for product in catalog::suggestions(&products, query) {
        println!("{:<26} {}", product.id, product.name);
    }
    Ok(())
}

/// Look up a catalog product by id.
pub async fn find(storefront: &Storefront, product_id: &str) -> Result<Product, CommandError> {
    storefront
        .api()
        .product(&ProductId::new(product_id))
        .await?
        .ok_or_else(|| CommandError::UnknownProduct(product_id.to_string()))
}
