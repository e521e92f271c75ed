//! Wire type conversion functions.

use bazaar_core::{CartLine, Product, ProductId, Quantity};
use tracing::warn;

use super::types::{FlatLine, NestedLine, WireCart, WireCategory, WireLine, WireProduct};

/// Normalize a cart payload into canonical lines.
///
/// Malformed lines, lines without a product and lines with a quantity below
/// one are dropped with a warning. Repeated products are folded into the
/// first occurrence so the result stays unique by product.
pub fn convert_cart(cart: WireCart) -> Vec<CartLine> {
    let mut lines: Vec<CartLine> = Vec::new();

    for value in cart.into_lines() {
        let Some(line) = convert_line_value(value) else {
            continue;
        };

        if let Some(existing) = lines.iter_mut().find(|l| l.product_id == line.product_id) {
            warn!(product_id = %line.product_id, "Duplicate cart line from server, folding quantities");
            existing.quantity = Quantity::new(existing.quantity.get().saturating_add(line.quantity.get()))
                .unwrap_or(existing.quantity);
        } else {
            lines.push(line);
        }
    }

    lines
}

/// Normalize catalog entries, skipping products without an id.
pub fn convert_products(products: Vec<WireProduct>) -> Vec<Product> {
    products.into_iter().filter_map(convert_product).collect()
}

fn convert_line_value(value: serde_json::Value) -> Option<CartLine> {
    match serde_json::from_value::<WireLine>(value) {
        Ok(WireLine::Flat(line)) => convert_flat_line(line),
        Ok(WireLine::Nested(line)) => convert_nested_line(line),
        Err(e) => {
            warn!(error = %e, "Skipping unrecognized cart line");
            None
        }
    }
}

fn convert_flat_line(line: FlatLine) -> Option<CartLine> {
    let Some(id) = line.product_id.or(line.mongo_id) else {
        warn!(name = %line.name, "Skipping cart line without a product id");
        return None;
    };
    let quantity = convert_quantity(&id, line.quantity)?;

    Some(CartLine {
        product_id: ProductId::new(id),
        name: line.name,
        price: line.price,
        image: line.image.unwrap_or_default(),
        category: line.category.map(|c| c.into_name()).unwrap_or_default(),
        quantity,
    })
}

fn convert_nested_line(line: NestedLine) -> Option<CartLine> {
    let Some(product) = line.product.and_then(convert_product) else {
        warn!("Skipping cart line whose product no longer exists");
        return None;
    };
    let quantity = convert_quantity(product.id.as_str(), line.quantity)?;

    Some(CartLine::new(&product, quantity))
}

fn convert_product(product: WireProduct) -> Option<Product> {
    let Some(id) = product.mongo_id.or(product.id).or(product.product_id) else {
        warn!(name = %product.name, "Skipping product without an id");
        return None;
    };

    let (category, category_id) = product
        .category
        .map(WireCategory::into_parts)
        .unwrap_or_default();

    Some(Product {
        id: ProductId::new(id),
        name: product.name,
        price: product.price,
        image: product.image.unwrap_or_default(),
        category,
        category_id,
    })
}

fn convert_quantity(product_id: &str, quantity: i64) -> Option<Quantity> {
    match Quantity::try_from(quantity) {
        Ok(quantity) => Some(quantity),
        Err(e) => {
            warn!(product_id, error = %e, "Skipping cart line with invalid quantity");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::Price;
    use serde_json::json;

    use super::*;

    fn cart(value: serde_json::Value) -> Vec<CartLine> {
        convert_cart(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_nested_lines() {
        let lines = cart(json!([
            {
                "_id": "line-1",
                "product": {
                    "_id": "p1",
                    "name": "Desk Lamp",
                    "price": 24.5,
                    "image": "lamp.jpg",
                    "category": { "_id": "c1", "name": "Home" }
                },
                "quantity": 2
            }
        ]));

        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.product_id.as_str(), "p1");
        assert_eq!(line.name, "Desk Lamp");
        assert_eq!(line.price, Price::from_cents(2450));
        assert_eq!(line.category, "Home");
        assert_eq!(line.quantity.get(), 2);
    }

    #[test]
    fn test_flat_lines() {
        let lines = cart(json!({
            "items": [
                {
                    "_id": "line-9",
                    "productId": "p2",
                    "name": "Mug",
                    "price": "7.50",
                    "image": null,
                    "category": "Kitchen",
                    "quantity": 3
                }
            ]
        }));

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id.as_str(), "p2");
        assert_eq!(lines[0].image, "");
        assert_eq!(lines[0].category, "Kitchen");
        assert_eq!(lines[0].quantity.get(), 3);
    }

    #[test]
    fn test_populated_product_id_reference() {
        let lines = cart(json!([
            {
                "productId": { "_id": "p3", "name": "Rug", "price": 120 },
                "quantity": 1
            }
        ]));

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id.as_str(), "p3");
        assert_eq!(lines[0].price, Price::from_cents(12000));
    }

    #[test]
    fn test_drops_invalid_lines() {
        let lines = cart(json!([
            { "product": null, "quantity": 1 },
            { "productId": "p4", "name": "Zero", "price": 1, "quantity": 0 },
            { "unexpected": true },
            { "productId": "p5", "name": "Kept", "price": 1, "quantity": 1 }
        ]));

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id.as_str(), "p5");
    }

    #[test]
    fn test_folds_duplicate_products() {
        let lines = cart(json!([
            { "productId": "p1", "name": "Lamp", "price": 1, "quantity": 1 },
            { "product": { "_id": "p2", "name": "Mug", "price": 2 }, "quantity": 1 },
            { "productId": "p1", "name": "Lamp", "price": 1, "quantity": 2 }
        ]));

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_id.as_str(), "p1");
        assert_eq!(lines[0].quantity.get(), 3);
        assert_eq!(lines[1].product_id.as_str(), "p2");
    }

    #[test]
    fn test_products() {
        let products: Vec<WireProduct> = serde_json::from_value(json!([
            { "_id": "p1", "name": "Lamp", "price": 10, "category": "Home" },
            { "name": "No id", "price": 1 },
            { "_id": "p2", "name": "Mug", "price": 2, "category": { "_id": "c7", "name": "Kitchen" } }
        ]))
        .unwrap();

        let products = convert_products(products);
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id.as_str(), "p1");
        assert_eq!(products[0].category, "Home");
        assert_eq!(products[0].category_id, None);
        assert_eq!(products[1].category, "Kitchen");
        assert_eq!(products[1].category_id.as_deref(), Some("c7"));
    }
}
