//! Integration test harness for Bazaar.
//!
//! Runs an in-process axum mock of the storefront REST API on an ephemeral
//! port and opens file-backed storefront sessions in `tempfile` directories.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```
//!
//! # Mock API
//!
//! - One account, authenticated by [`VALID_TOKEN`]; any other bearer token
//!   gets `401 {"status": false, "message": "Invalid token"}`
//! - The catalog is a bare product array
//! - Cart responses use nested lines (`{ product: {..}, quantity }`), except
//!   merge, which answers with flattened lines under `items`
//! - [`MockApi::fail`] makes an endpoint answer `500` until further notice
//! - Every cart request is recorded as `"<METHOD> <endpoint> [args]"`

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use bazaar_storefront::api::ApiClient;
use bazaar_storefront::{Storefront, StorefrontConfig};
use secrecy::SecretString;
use serde_json::{Value, json};
use tempfile::TempDir;
use url::Url;

/// The only bearer token the mock accepts.
pub const VALID_TOKEN: &str = "valid-token";

/// Debounce window used by test sessions.
pub const TEST_DEBOUNCE: Duration = Duration::from_millis(100);

type Reply = (StatusCode, Json<Value>);

// =============================================================================
// Mock API
// =============================================================================

#[derive(Default)]
struct MockState {
    cart: Mutex<Vec<(String, u64)>>,
    failing: Mutex<HashSet<&'static str>>,
    requests: Mutex<Vec<String>>,
}

/// Running mock server; stops when dropped.
pub struct MockApi {
    url: Url,
    state: Arc<MockState>,
    server: tokio::task::JoinHandle<()>,
}

impl MockApi {
    /// Bind to an ephemeral local port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/api/products", get(products))
            .route("/api/cart", get(fetch_cart))
            .route("/api/cart/add", post(add_item))
            .route("/api/cart/update", put(update_item))
            .route("/api/cart/remove/{product_id}", delete(remove_item))
            .route("/api/cart/clear", delete(clear_cart))
            .route("/api/cart/merge", post(merge_cart))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock API");
        let addr = listener.local_addr().expect("Mock API has no address");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock API crashed");
        });

        Self {
            url: Url::parse(&format!("http://{addr}")).expect("Invalid mock URL"),
            state,
            server,
        }
    }

    /// Base URL of the mock.
    #[must_use]
    pub fn url(&self) -> Url {
        self.url.clone()
    }

    /// API client for the mock with a short request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn client(&self) -> ApiClient {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        ApiClient::with_client(client, self.url())
    }

    /// Replace the account's server-side cart.
    pub fn set_cart(&self, lines: &[(&str, u64)]) {
        *self.state.cart.lock().expect("poisoned") = lines
            .iter()
            .map(|(id, qty)| ((*id).to_string(), *qty))
            .collect();
    }

    /// The account's server-side cart as `(product_id, quantity)` pairs.
    #[must_use]
    pub fn cart(&self) -> Vec<(String, u64)> {
        self.state.cart.lock().expect("poisoned").clone()
    }

    /// Make an endpoint (`cart`, `add`, `update`, `remove`, `clear`, `merge`)
    /// answer `500`.
    pub fn fail(&self, endpoint: &'static str) {
        self.state.failing.lock().expect("poisoned").insert(endpoint);
    }

    /// Let a failing endpoint succeed again.
    pub fn recover(&self, endpoint: &'static str) {
        self.state.failing.lock().expect("poisoned").remove(endpoint);
    }

    /// All recorded cart requests, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().expect("poisoned").clone()
    }

    /// Recorded requests starting with `prefix` (e.g. `"PUT"`).
    #[must_use]
    pub fn requests_to(&self, prefix: &str) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.starts_with(prefix))
            .collect()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Catalog served by the mock. Prices mix numbers and strings on purpose.
#[must_use]
pub fn catalog() -> Vec<Value> {
    vec![
        json!({
            "_id": "p1",
            "name": "Desk Lamp",
            "price": 24.5,
            "image": "/img/lamp.jpg",
            "category": { "_id": "c1", "name": "Home" }
        }),
        json!({
            "_id": "p2",
            "name": "Mug",
            "price": "7.50",
            "image": "/img/mug.jpg",
            "category": { "_id": "c2", "name": "Kitchen" }
        }),
        json!({
            "_id": "p3",
            "name": "Rug",
            "price": 120,
            "image": null,
            "category": "Home"
        }),
    ]
}

fn catalog_entry(product_id: &str) -> Option<Value> {
    catalog().into_iter().find(|p| p["_id"] == product_id)
}

fn ok(data: Value) -> Reply {
    (
        StatusCode::OK,
        Json(json!({ "status": true, "message": "ok", "data": data })),
    )
}

fn error(status: StatusCode, message: &str) -> Reply {
    (
        status,
        Json(json!({ "status": false, "message": message })),
    )
}

/// Record the request, then check the bearer token and injected failures.
fn admit(
    state: &MockState,
    headers: &HeaderMap,
    endpoint: &'static str,
    request: String,
) -> Result<(), Reply> {
    state.requests.lock().expect("poisoned").push(request);

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if token != Some(VALID_TOKEN) {
        return Err(error(StatusCode::UNAUTHORIZED, "Invalid token"));
    }

    if state.failing.lock().expect("poisoned").contains(endpoint) {
        return Err(error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("{endpoint} failed"),
        ));
    }
    Ok(())
}

fn nested_lines(state: &MockState) -> Value {
    let cart = state.cart.lock().expect("poisoned");
    Value::Array(
        cart.iter()
            .map(|(id, qty)| {
                json!({
                    "_id": format!("line-{id}"),
                    "product": catalog_entry(id),
                    "quantity": qty
                })
            })
            .collect(),
    )
}

fn flat_lines(state: &MockState) -> Value {
    let cart = state.cart.lock().expect("poisoned");
    let items: Vec<Value> = cart
        .iter()
        .filter_map(|(id, qty)| {
            let product = catalog_entry(id)?;
            let category = product["category"]
                .get("name")
                .unwrap_or(&product["category"])
                .clone();
            Some(json!({
                "_id": format!("line-{id}"),
                "productId": id,
                "name": product["name"],
                "price": product["price"],
                "image": product["image"],
                "category": category,
                "quantity": qty
            }))
        })
        .collect();
    json!({ "items": items })
}

fn upsert(state: &MockState, product_id: &str, quantity: u64, add: bool) {
    let mut cart = state.cart.lock().expect("poisoned");
    match cart.iter_mut().find(|(id, _)| id == product_id) {
        Some((_, existing)) if add => *existing += quantity,
        Some((_, existing)) => *existing = quantity,
        None => cart.push((product_id.to_string(), quantity)),
    }
}

fn line_request(body: &Value) -> Option<(String, u64)> {
    let product_id = body["productId"].as_str()?.to_string();
    let quantity = body["quantity"].as_u64().filter(|q| *q > 0)?;
    Some((product_id, quantity))
}

async fn products() -> Json<Value> {
    Json(Value::Array(catalog()))
}

async fn fetch_cart(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    if let Err(reply) = admit(&state, &headers, "cart", "GET cart".to_string()) {
        return reply;
    }
    ok(nested_lines(&state))
}

async fn add_item(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let Some((product_id, quantity)) = line_request(&body) else {
        return error(StatusCode::BAD_REQUEST, "productId and quantity are required");
    };
    let request = format!("POST add {product_id} {quantity}");
    if let Err(reply) = admit(&state, &headers, "add", request) {
        return reply;
    }
    if catalog_entry(&product_id).is_none() {
        return error(StatusCode::NOT_FOUND, "Product not found");
    }
    upsert(&state, &product_id, quantity, true);
    ok(nested_lines(&state))
}

async fn update_item(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let Some((product_id, quantity)) = line_request(&body) else {
        return error(StatusCode::BAD_REQUEST, "productId and quantity are required");
    };
    let request = format!("PUT update {product_id} {quantity}");
    if let Err(reply) = admit(&state, &headers, "update", request) {
        return reply;
    }
    upsert(&state, &product_id, quantity, false);
    ok(nested_lines(&state))
}

async fn remove_item(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Reply {
    let request = format!("DELETE remove {product_id}");
    if let Err(reply) = admit(&state, &headers, "remove", request) {
        return reply;
    }
    state
        .cart
        .lock()
        .expect("poisoned")
        .retain(|(id, _)| id != &product_id);
    ok(nested_lines(&state))
}

async fn clear_cart(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    if let Err(reply) = admit(&state, &headers, "clear", "DELETE clear".to_string()) {
        return reply;
    }
    state.cart.lock().expect("poisoned").clear();
    (
        StatusCode::OK,
        Json(json!({ "status": true, "message": "Cart cleared" })),
    )
}

async fn merge_cart(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let items: Vec<(String, u64)> = body["items"]
        .as_array()
        .map(|items| items.iter().filter_map(line_request).collect())
        .unwrap_or_default();
    let summary: Vec<String> = items.iter().map(|(id, qty)| format!("{id}:{qty}")).collect();
    let request = format!("POST merge {}", summary.join(","));
    if let Err(reply) = admit(&state, &headers, "merge", request) {
        return reply;
    }
    for (product_id, quantity) in &items {
        upsert(&state, product_id, *quantity, true);
    }
    ok(flat_lines(&state))
}

// =============================================================================
// Sessions
// =============================================================================

/// Open a storefront session against `mock` with its store in `dir`.
///
/// Sessions opened on the same directory share their local store, like two
/// runs of the CLI.
///
/// # Panics
///
/// Panics if the store cannot be opened.
#[must_use]
pub fn open_storefront(mock: &MockApi, dir: &TempDir, token: Option<&str>) -> Storefront {
    let config = StorefrontConfig {
        cart_debounce: TEST_DEBOUNCE,
        auth_token: token.map(SecretString::from),
        ..StorefrontConfig::new(mock.url(), dir.path())
    };
    Storefront::open(config).expect("Failed to open storefront")
}

/// Wait long enough for debounced confirmations to reach the mock.
pub async fn settle() {
    tokio::time::sleep(TEST_DEBOUNCE * 4).await;
}
