//! Catalog search.
//!
//! Filtering happens client-side over the full product list, the same list
//! [`crate::api::ApiClient::products`] returns.

use bazaar_core::Product;

/// Maximum number of search suggestions.
pub const MAX_SUGGESTIONS: usize = 5;

/// Products matching a free-text query and an optional category.
///
/// The query matches case-insensitively against the product name or its
/// category name; a blank query matches everything. The category matches the
/// category id exactly or the category name case-insensitively. Catalog order
/// is kept.
#[must_use]
pub fn search<'a>(products: &'a [Product], query: &str, category: Option<&str>) -> Vec<&'a Product> {
    let needle = query.trim().to_lowercase();
    products
        .iter()
        .filter(|p| category.is_none_or(|c| in_category(p, c)))
        .filter(|p| needle.is_empty() || matches_text(p, &needle))
        .collect()
}

/// The first few products matching `query`, for type-ahead.
///
/// Empty for a blank query.
#[must_use]
pub fn suggestions<'a>(products: &'a [Product], query: &str) -> Vec<&'a Product> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let mut found = search(products, query, None);
    found.truncate(MAX_SUGGESTIONS);
    found
}

fn matches_text(product: &Product, needle: &str) -> bool {
    product.name.to_lowercase().contains(needle)
        || product.category.to_lowercase().contains(needle)
}

fn in_category(product: &Product, category: &str) -> bool {
    product.category_id.as_deref() == Some(category)
        || (!product.category.is_empty() && product.category.eq_ignore_ascii_case(category))
}
