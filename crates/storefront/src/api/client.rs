//! REST API client implementation.
//!
//! Uses `reqwest` for HTTP. Nothing is cached: every call hits the server
//! exactly once.

use std::sync::Arc;

use bazaar_core::{CartLine, Product, ProductId, Quantity};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::conversions::{convert_cart, convert_products};
use super::types::{
    CatalogResponse, Envelope, LineRequest, MergeRequest, WireCart, WireProduct,
};
use super::{ApiError, CartService};

/// Maximum number of body characters copied into logs and error messages.
const BODY_SNIPPET_LEN: usize = 200;

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront REST API.
///
/// Cheaply cloneable; clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client for the server at `base_url`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a new API client using an existing `reqwest` client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, mut base_url: Url) -> Self {
        // Url::join drops the last path segment unless the base ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            inner: Arc::new(ApiClientInner { client, base_url }),
        }
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        token: Option<&SecretString>,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;
        let builder = self.inner.client.request(method, url);
        Ok(match token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        })
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized(error_message(&response_text, status)));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %snippet(&response_text),
                "Storefront API returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&response_text, status),
            });
        }

        Ok(response_text)
    }

    /// Send a request and unwrap the response envelope.
    ///
    /// Returns the envelope's `data`, which may be absent.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let response_text = self.send(request).await?;

        // Some endpoints (clear) may answer 204 with no body
        if response_text.trim().is_empty() {
            return Ok(None);
        }

        let envelope: Envelope<T> = parse_body(&response_text)?;
        envelope.into_data()
    }

    /// Execute a request whose response carries a cart.
    async fn execute_cart(&self, request: RequestBuilder) -> Result<Vec<CartLine>, ApiError> {
        let cart = self
            .execute::<WireCart>(request)
            .await?
            .ok_or(ApiError::MissingData)?;
        let lines = convert_cart(cart);
        debug!(lines = lines.len(), "Received cart");
        Ok(lines)
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// List the product catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Result<Vec<Product>, ApiError> {
        let request = self.request(Method::GET, &["api", "products"], None)?;
        let response_text = self.send(request).await?;
        Ok(convert_products(parse_catalog(&response_text)?))
    }

    /// Find a catalog product by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn product(&self, product_id: &ProductId) -> Result<Option<Product>, ApiError> {
        Ok(self
            .products()
            .await?
            .into_iter()
            .find(|p| &p.id == product_id))
    }
}

// =============================================================================
// Cart Methods
// =============================================================================

impl CartService for ApiClient {
    #[instrument(skip(self, token))]
    async fn fetch_cart(&self, token: &SecretString) -> Result<Vec<CartLine>, ApiError> {
        let request = self.request(Method::GET, &["api", "cart"], Some(token))?;
        self.execute_cart(request).await
    }

    #[instrument(skip(self, token), fields(product_id = %product_id, quantity = %quantity))]
    async fn add_item(
        &self,
        token: &SecretString,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<Vec<CartLine>, ApiError> {
        let request = self
            .request(Method::POST, &["api", "cart", "add"], Some(token))?
            .json(&LineRequest {
                product_id,
                quantity,
            });
        self.execute_cart(request).await
    }

    #[instrument(skip(self, token), fields(product_id = %product_id, quantity = %quantity))]
    async fn set_quantity(
        &self,
        token: &SecretString,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<Vec<CartLine>, ApiError> {
        let request = self
            .request(Method::PUT, &["api", "cart", "update"], Some(token))?
            .json(&LineRequest {
                product_id,
                quantity,
            });
        self.execute_cart(request).await
    }

    #[instrument(skip(self, token), fields(product_id = %product_id))]
    async fn remove_item(
        &self,
        token: &SecretString,
        product_id: &ProductId,
    ) -> Result<Vec<CartLine>, ApiError> {
        let request = self.request(
            Method::DELETE,
            &["api", "cart", "remove", product_id.as_str()],
            Some(token),
        )?;
        self.execute_cart(request).await
    }

    #[instrument(skip(self, token))]
    async fn clear(&self, token: &SecretString) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &["api", "cart", "clear"], Some(token))?;
        self.execute::<serde_json::Value>(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token, guest_lines), fields(lines = guest_lines.len()))]
    async fn merge(
        &self,
        token: &SecretString,
        guest_lines: &[CartLine],
    ) -> Result<Vec<CartLine>, ApiError> {
        let body = MergeRequest {
            items: guest_lines
                .iter()
                .map(|line| LineRequest {
                    product_id: &line.product_id,
                    quantity: line.quantity,
                })
                .collect(),
        };
        let request = self
            .request(Method::POST, &["api", "cart", "merge"], Some(token))?
            .json(&body);
        self.execute_cart(request).await
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %snippet(body),
            "Failed to parse storefront API response"
        );
        ApiError::Parse(e)
    })
}

/// The catalog is served as a bare product array; an envelope is accepted too.
fn parse_catalog(body: &str) -> Result<Vec<WireProduct>, ApiError> {
    match parse_body::<CatalogResponse>(body)? {
        CatalogResponse::Products(products) => Ok(products),
        CatalogResponse::Envelope(envelope) => envelope.into_data()?.ok_or(ApiError::MissingData),
    }
}

/// Extract the server's message from an error body, or fall back to a
/// truncated body (or the status reason when the body is empty).
fn error_message(body: &str, status: StatusCode) -> String {
    let parsed: Result<Envelope<serde_json::Value>, _> = serde_json::from_str(body);
    if let Ok(Envelope {
        message: Some(message),
        ..
    }) = parsed
    {
        return message;
    }

    if body.trim().is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string();
    }

    snippet(body)
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_LEN).collect()
}
