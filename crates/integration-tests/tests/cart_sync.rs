//! End-to-end cart tests: a file-backed storefront session against the mock
//! API.

use bazaar_core::{CartLine, CartMode, ProductId, Quantity, SyncStatus};
use bazaar_integration_tests::{MockApi, VALID_TOKEN, open_storefront, settle};
use bazaar_storefront::store::keys;
use bazaar_storefront::{CartEvent, CartOperation, Storefront};
use secrecy::SecretString;
use tempfile::{TempDir, tempdir};

fn pid(id: &str) -> ProductId {
    ProductId::new(id)
}

fn qty(n: u32) -> Quantity {
    Quantity::new(n).expect("non-zero")
}

fn data_dir() -> TempDir {
    tempdir().expect("Failed to create temp dir")
}

fn quantities(storefront: &Storefront) -> Vec<(String, u32)> {
    storefront
        .cart()
        .lines()
        .into_iter()
        .map(|l| (l.product_id.into_inner(), l.quantity.get()))
        .collect()
}

async fn add(storefront: &Storefront, id: &str) {
    let product = storefront
        .api()
        .product(&pid(id))
        .await
        .expect("catalog request failed")
        .expect("unknown product");
    storefront
        .cart()
        .add_to_cart(&product)
        .await
        .expect("add failed");
}

// ============================================================================
// Guest mode
// ============================================================================

#[tokio::test]
async fn test_guest_cart_survives_restart() {
    let mock = MockApi::start().await;
    let dir = data_dir();

    {
        let storefront = open_storefront(&mock, &dir, None);
        storefront.cart().initialize().await.expect("init failed");
        add(&storefront, "p1").await;
        add(&storefront, "p1").await;
        add(&storefront, "p2").await;
        storefront.cart().decrease_quantity(&pid("p2"));
    }

    let storefront = open_storefront(&mock, &dir, None);
    storefront.cart().initialize().await.expect("init failed");

    assert_eq!(
        quantities(&storefront),
        vec![("p1".to_string(), 2), ("p2".to_string(), 1)]
    );
    let state = storefront.cart().state();
    assert_eq!(state.mode, CartMode::Guest);
    assert_eq!(state.subtotal().to_string(), "$56.50");
    // Guests never talk to the cart endpoints
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_corrupt_guest_cart_loads_empty() {
    let mock = MockApi::start().await;
    let dir = data_dir();
    std::fs::write(dir.path().join("cart_items.json"), b"{not json").expect("write failed");

    let storefront = open_storefront(&mock, &dir, None);
    storefront.cart().initialize().await.expect("init failed");

    assert!(storefront.cart().lines().is_empty());
}

// ============================================================================
// Authenticated mode
// ============================================================================

#[tokio::test]
async fn test_initialize_fetches_account_cart() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p3", 2)]);
    let dir = data_dir();

    let storefront = open_storefront(&mock, &dir, Some(VALID_TOKEN));
    storefront.cart().initialize().await.expect("init failed");

    assert_eq!(quantities(&storefront), vec![("p3".to_string(), 2)]);
    let state = storefront.cart().state();
    assert_eq!(state.mode, CartMode::Authenticated);
    assert_eq!(state.sync_status, SyncStatus::Succeeded);
}

#[tokio::test]
async fn test_debounced_quantity_sends_latest_only() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p1", 1)]);
    let dir = data_dir();
    let storefront = open_storefront(&mock, &dir, Some(VALID_TOKEN));
    storefront.cart().initialize().await.expect("init failed");

    storefront.cart().set_quantity(&pid("p1"), qty(2));
    storefront.cart().increase_quantity(&pid("p1"));
    storefront.cart().increase_quantity(&pid("p1"));
    assert_eq!(quantities(&storefront), vec![("p1".to_string(), 4)]);

    settle().await;

    assert_eq!(mock.requests_to("PUT"), vec!["PUT update p1 4".to_string()]);
    assert_eq!(mock.cart(), vec![("p1".to_string(), 4)]);
    assert!(!storefront.cart().is_pending(&pid("p1")));
}

#[tokio::test]
async fn test_add_during_debounce_keeps_both_changes() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p1", 1)]);
    let dir = data_dir();
    let storefront = open_storefront(&mock, &dir, Some(VALID_TOKEN));
    storefront.cart().initialize().await.expect("init failed");

    storefront.cart().set_quantity(&pid("p1"), qty(4));
    add(&storefront, "p1").await;
    settle().await;

    assert_eq!(quantities(&storefront), vec![("p1".to_string(), 5)]);
    assert_eq!(mock.cart(), vec![("p1".to_string(), 5)]);
    assert_eq!(mock.requests_to("PUT"), vec!["PUT update p1 5".to_string()]);
    assert!(mock.requests_to("POST add").is_empty());
}

#[tokio::test]
async fn test_failed_update_rolls_back() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p1", 2), ("p2", 1)]);
    mock.fail("update");
    let dir = data_dir();
    let storefront = open_storefront(&mock, &dir, Some(VALID_TOKEN));
    storefront.cart().initialize().await.expect("init failed");
    let mut events = storefront.cart().subscribe();

    storefront.cart().set_quantity(&pid("p1"), qty(5));
    settle().await;

    assert_eq!(
        quantities(&storefront),
        vec![("p1".to_string(), 2), ("p2".to_string(), 1)]
    );
    let state = storefront.cart().state();
    assert_eq!(state.sync_status, SyncStatus::Failed);
    assert_eq!(state.last_error.as_deref(), Some("HTTP 500: update failed"));

    let mut failures = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CartEvent::SyncFailed {
            operation,
            product_id,
            ..
        } = event
        {
            failures.push((operation, product_id));
        }
    }
    assert_eq!(failures, vec![(CartOperation::SetQuantity, Some(pid("p1")))]);
}

#[tokio::test]
async fn test_clear_cancels_pending_updates() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p1", 1), ("p2", 1)]);
    let dir = data_dir();
    let storefront = open_storefront(&mock, &dir, Some(VALID_TOKEN));
    storefront.cart().initialize().await.expect("init failed");

    storefront.cart().set_quantity(&pid("p1"), qty(3));
    storefront.cart().clear_cart().await.expect("clear failed");
    settle().await;

    assert!(storefront.cart().lines().is_empty());
    assert!(mock.cart().is_empty());
    assert!(mock.requests_to("PUT").is_empty());
}

#[tokio::test]
async fn test_failed_removal_restores_line() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p1", 1), ("p2", 2), ("p3", 1)]);
    mock.fail("remove");
    let dir = data_dir();
    let storefront = open_storefront(&mock, &dir, Some(VALID_TOKEN));
    storefront.cart().initialize().await.expect("init failed");

    let result = storefront.cart().remove_from_cart(&pid("p2")).await;

    assert!(result.is_err());
    assert_eq!(
        quantities(&storefront),
        vec![
            ("p1".to_string(), 1),
            ("p2".to_string(), 2),
            ("p3".to_string(), 1)
        ]
    );
}

#[tokio::test]
async fn test_flush_before_exit() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p2", 1)]);
    let dir = data_dir();
    let storefront = open_storefront(&mock, &dir, Some(VALID_TOKEN));
    storefront.cart().initialize().await.expect("init failed");

    storefront.cart().set_quantity(&pid("p2"), qty(6));
    storefront.cart().flush_pending().await;

    assert_eq!(mock.cart(), vec![("p2".to_string(), 6)]);
}

// ============================================================================
// Login / logout
// ============================================================================

#[tokio::test]
async fn test_login_merges_guest_cart() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p1", 1)]);
    let dir = data_dir();
    let storefront = open_storefront(&mock, &dir, None);
    storefront.cart().initialize().await.expect("init failed");
    add(&storefront, "p1").await;
    add(&storefront, "p2").await;

    storefront
        .cart()
        .on_login(SecretString::from(VALID_TOKEN))
        .await
        .expect("login failed");

    assert_eq!(
        mock.requests_to("POST merge"),
        vec!["POST merge p1:1,p2:1".to_string()]
    );
    assert_eq!(
        quantities(&storefront),
        vec![("p1".to_string(), 2), ("p2".to_string(), 1)]
    );
    assert_eq!(
        storefront.store().load::<Vec<CartLine>>(keys::GUEST_CART),
        None
    );
    assert!(storefront.auth().is_authenticated());

    // The session survives a restart
    let reopened = open_storefront(&mock, &dir, None);
    reopened.cart().initialize().await.expect("init failed");
    assert_eq!(reopened.cart().state().mode, CartMode::Authenticated);
    assert_eq!(quantities(&reopened), quantities(&storefront));
}

#[tokio::test]
async fn test_failed_merge_keeps_guest_cart() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p3", 1)]);
    mock.fail("merge");
    let dir = data_dir();
    let storefront = open_storefront(&mock, &dir, None);
    add(&storefront, "p1").await;

    let result = storefront
        .cart()
        .on_login(SecretString::from(VALID_TOKEN))
        .await;

    assert!(result.is_err());
    // Fell back to the account cart
    assert_eq!(quantities(&storefront), vec![("p3".to_string(), 1)]);
    assert_eq!(
        storefront
            .store()
            .load::<Vec<CartLine>>(keys::GUEST_CART)
            .map(|lines| lines.len()),
        Some(1)
    );

    // A later attempt goes through
    mock.recover("merge");
    let guest = storefront
        .store()
        .load_or_default::<Vec<CartLine>>(keys::GUEST_CART);
    storefront
        .cart()
        .sync_guest_cart(guest, &SecretString::from(VALID_TOKEN))
        .await
        .expect("retry failed");
    assert_eq!(
        quantities(&storefront),
        vec![("p3".to_string(), 1), ("p1".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_rejected_token_falls_back_to_guest() {
    let mock = MockApi::start().await;
    let dir = data_dir();

    let storefront = open_storefront(&mock, &dir, Some("expired-or-revoked"));
    let err = storefront
        .cart()
        .initialize()
        .await
        .expect_err("bad token accepted");

    assert!(err.is_unauthorized());
    assert!(!storefront.auth().is_authenticated());
    assert_eq!(storefront.cart().state().mode, CartMode::Guest);

    // Guest operations keep working
    add(&storefront, "p2").await;
    assert_eq!(quantities(&storefront), vec![("p2".to_string(), 1)]);
}

#[tokio::test]
async fn test_logout_keeps_cart_as_guest_cart() {
    let mock = MockApi::start().await;
    mock.set_cart(&[("p1", 3)]);
    let dir = data_dir();
    let storefront = open_storefront(&mock, &dir, Some(VALID_TOKEN));
    storefront.cart().initialize().await.expect("init failed");

    storefront.cart().on_logout();

    let reopened = open_storefront(&mock, &dir, None);
    reopened.cart().initialize().await.expect("init failed");
    assert_eq!(reopened.cart().state().mode, CartMode::Guest);
    assert_eq!(quantities(&reopened), vec![("p1".to_string(), 3)]);
}

// ============================================================================
// Wishlist
// ============================================================================

#[tokio::test]
async fn test_wishlist_move_to_account_cart() {
    let mock = MockApi::start().await;
    let dir = data_dir();
    let storefront = open_storefront(&mock, &dir, Some(VALID_TOKEN));
    storefront.cart().initialize().await.expect("init failed");

    let rug = storefront
        .api()
        .product(&pid("p3"))
        .await
        .expect("catalog request failed")
        .expect("unknown product");
    assert!(storefront.wishlist().add(rug));

    storefront
        .wishlist()
        .move_to_cart(&pid("p3"), storefront.cart())
        .await
        .expect("move failed");

    assert!(storefront.wishlist().is_empty());
    assert_eq!(mock.cart(), vec![("p3".to_string(), 1)]);
    assert_eq!(quantities(&storefront), vec![("p3".to_string(), 1)]);

    // The wishlist is local and survives a restart, even when empty
    let reopened = open_storefront(&mock, &dir, None);
    assert!(reopened.wishlist().is_empty());
}
