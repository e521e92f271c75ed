//! Integration tests for the REST client against the mock API.

use bazaar_core::{Price, ProductId, Quantity};
use bazaar_integration_tests::{MockApi, VALID_TOKEN};
use bazaar_storefront::api::{ApiClient, ApiError, CartService};
use bazaar_storefront::services::catalog;
use secrecy::SecretString;
use url::Url;

fn token() -> SecretString {
    SecretString::from(VALID_TOKEN)
}

fn pid(id: &str) -> ProductId {
    ProductId::new(id)
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_products_are_normalized() {
    let mock = MockApi::start().await;
    let products = mock.client().products().await.expect("catalog request failed");

    assert_eq!(products.len(), 3);
    let lamp = &products[0];
    assert_eq!(lamp.id, pid("p1"));
    assert_eq!(lamp.price, Price::from_cents(2450));
    assert_eq!(lamp.category, "Home");
    assert_eq!(lamp.category_id.as_deref(), Some("c1"));

    // String price, plain-string category, null image
    assert_eq!(products[1].price, Price::from_cents(750));
    assert_eq!(products[2].category, "Home");
    assert_eq!(products[2].category_id, None);
    assert_eq!(products[2].image, "");
}

#[tokio::test]
async fn test_catalog_search() {
    let mock = MockApi::start().await;
    let products = mock.client().products().await.expect("catalog request failed");

    let names = |found: Vec<&bazaar_core::Product>| -> Vec<String> {
        found.into_iter().map(|p| p.name.clone()).collect()
    };

    assert_eq!(names(catalog::search(&products, "lamp", None)), vec!["Desk Lamp"]);
    assert_eq!(
        names(catalog::search(&products, "home", None)),
        vec!["Desk Lamp", "Rug"]
    );
    // Only populated categories carry an id
    assert_eq!(names(catalog::search(&products, "", Some("c1"))), vec!["Desk Lamp"]);
    assert_eq!(
        names(catalog::search(&products, "", Some("HOME"))),
        vec!["Desk Lamp", "Rug"]
    );
    assert_eq!(catalog::search(&products, "", None).len(), 3);
}

#[tokio::test]
async fn test_product_lookup() {
    let mock = MockApi::start().await;
    let client = mock.client();

    let mug = client.product(&pid("p2")).await.expect("lookup failed");
    assert_eq!(mug.map(|p| p.name), Some("Mug".to_string()));
    assert!(client.product(&pid("nope")).await.expect("lookup failed").is_none());
}

// ============================================================================
// Cart endpoints
// ============================================================================

#[tokio::test]
async fn test_fetch_nested_cart() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p1", 2), ("p3", 1)]);

    let lines = mock.client().fetch_cart(&token()).await.expect("fetch failed");

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].product_id, pid("p1"));
    assert_eq!(lines[0].name, "Desk Lamp");
    assert_eq!(lines[0].quantity.get(), 2);
    assert_eq!(lines[1].line_total(), Price::from_cents(12000));
}

#[tokio::test]
async fn test_add_update_remove_round_trip() {
    let mock = MockApi::start().await;
    let client = mock.client();
    let two = Quantity::new(2).expect("non-zero");

    let lines = client
        .add_item(&token(), &pid("p2"), Quantity::ONE)
        .await
        .expect("add failed");
    assert_eq!(lines.len(), 1);

    let lines = client
        .set_quantity(&token(), &pid("p2"), two)
        .await
        .expect("update failed");
    assert_eq!(lines[0].quantity, two);

    let lines = client
        .remove_item(&token(), &pid("p2"))
        .await
        .expect("remove failed");
    assert!(lines.is_empty());

    assert_eq!(
        mock.requests(),
        vec![
            "POST add p2 1".to_string(),
            "PUT update p2 2".to_string(),
            "DELETE remove p2".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_clear_without_data() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p1", 1)]);

    mock.client().clear(&token()).await.expect("clear failed");
    assert!(mock.cart().is_empty());
}

#[tokio::test]
async fn test_merge_returns_flat_lines() {
    let mock = MockApi::start().await;
    let guest = mock
        .client()
        .add_item(&token(), &pid("p2"), Quantity::ONE)
        .await
        .expect("add failed");
    mock.set_cart(&[("p1", 1)]);

    let lines = mock
        .client()
        .merge(&token(), &guest)
        .await
        .expect("merge failed");

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].product_id, pid("p2"));
    assert_eq!(lines[1].category, "Kitchen");
    assert_eq!(lines[1].price, Price::from_cents(750));
    assert_eq!(mock.requests_to("POST merge"), vec!["POST merge p2:1".to_string()]);
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let mock = MockApi::start().await;
    let err = mock
        .client()
        .fetch_cart(&SecretString::from("bogus"))
        .await
        .expect_err("bogus token accepted");

    assert!(err.is_unauthorized());
    assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Invalid token"));
}

#[tokio::test]
async fn test_server_failure_carries_message() {
    let mock = MockApi::start().await;
    mock.fail("update");

    let err = mock
        .client()
        .set_quantity(&token(), &pid("p1"), Quantity::ONE)
        .await
        .expect_err("failure not reported");

    assert!(matches!(
        err,
        ApiError::Status { status: 500, ref message } if message == "update failed"
    ));
}

#[tokio::test]
async fn test_unreachable_server() {
    // Reserve a port, then free it so nothing is listening there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind failed");
    let addr = listener.local_addr().expect("no address");
    drop(listener);

    let client = ApiClient::new(Url::parse(&format!("http://{addr}")).expect("bad url"));
    let result = client.fetch_cart(&token()).await;

    assert!(matches!(result, Err(ApiError::Http(_))));
}
