//! Catalog product and cart line records.
//!
//! Both serialize with camelCase field names (`productId`), the same names the
//! storefront API uses in request bodies.

use serde::{Deserialize, Serialize};

use super::{Price, ProductId, Quantity};

/// A product as shown in the catalog and stored in the wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product ID.
    #[serde(rename = "productId")]
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Price,
    /// Image URL (empty when the product has none).
    #[serde(default)]
    pub image: String,
    /// Category name.
    #[serde(default)]
    pub category: String,
    /// Category ID, when the server sent a populated category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

/// A line item in the cart.
///
/// Unique by `product_id` within a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
    pub quantity: Quantity,
}

impl CartLine {
    /// Create a line for `product` with the given quantity.
    #[must_use]
    pub fn new(product: &Product, quantity: Quantity) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone(),
            category: product.category.clone(),
            quantity,
        }
    }

    /// Price of the whole line (`price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId::new("p1"),
            name: "Desk Lamp".to_string(),
            price: Price::from_cents(2450),
            image: "https://cdn.example.com/lamp.jpg".to_string(),
            category: "Home".to_string(),
            category_id: Some("c1".to_string()),
        }
    }

    #[test]
    fn test_line_from_product() {
        let line = CartLine::new(&product(), Quantity::new(2).unwrap());
        assert_eq!(line.product_id.as_str(), "p1");
        assert_eq!(line.line_total(), Price::from_cents(4900));
    }

    #[test]
    fn test_line_json_field_names() {
        let line = CartLine::new(&product(), Quantity::ONE);
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["productId"], "p1");
        assert_eq!(json["quantity"], 1);
        assert_eq!(json["price"], "24.50");
    }

    #[test]
    fn test_line_rejects_zero_quantity() {
        let json = r#"{"productId":"p1","name":"Lamp","price":1,"quantity":0}"#;
        assert!(serde_json::from_str::<CartLine>(json).is_err());
    }

    #[test]
    fn test_product_missing_optional_fields() {
        let json = r#"{"productId":"p9","name":"Mug","price":"7.5"}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.image, "");
        assert_eq!(product.category, "");
        assert_eq!(product.category_id, None);
    }
}
