//! Wire types for the storefront REST API.
//!
//! These mirror what the server sends and accepts; conversions into the
//! core types live in `conversions`.

use bazaar_core::{Price, ProductId, Quantity};
use serde::{Deserialize, Serialize};

use super::ApiError;

/// Response envelope used by the cart endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// `false` when the server refused the request.
    pub status: Option<bool>,
    /// Human-readable message, mostly present on failures.
    pub message: Option<String>,
    /// Payload.
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// The payload, or [`ApiError::Rejected`] when the server said `status: false`.
    pub fn into_data(self) -> Result<Option<T>, ApiError> {
        if self.status == Some(false) {
            return Err(ApiError::Rejected(
                self.message
                    .unwrap_or_else(|| "request was not accepted".to_string()),
            ));
        }
        Ok(self.data)
    }
}

/// Catalog payload: a bare product array or an enveloped one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CatalogResponse {
    Products(Vec<WireProduct>),
    Envelope(Envelope<Vec<WireProduct>>),
}

/// Cart payload: a bare line array or an object holding one.
///
/// Lines are kept as raw JSON so one malformed line does not sink the cart.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireCart {
    Lines(Vec<serde_json::Value>),
    Object { items: Vec<serde_json::Value> },
}

impl WireCart {
    pub fn into_lines(self) -> Vec<serde_json::Value> {
        match self {
            Self::Lines(lines) | Self::Object { items: lines } => lines,
        }
    }
}

/// A cart line in either of the two shapes the server produces.
///
/// The flattened shape is tried first: it requires top-level `name` and
/// `price`, which a nested line never has.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireLine {
    Flat(FlatLine),
    Nested(NestedLine),
}

/// Line with product fields inlined.
#[derive(Debug, Deserialize)]
pub struct FlatLine {
    #[serde(rename = "productId")]
    pub product_id: Option<String>,
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<WireCategory>,
    pub quantity: i64,
}

/// Line referencing its product through a nested object.
///
/// Populated references arrive under `productId` as well as `product`.
#[derive(Debug, Deserialize)]
pub struct NestedLine {
    #[serde(alias = "productId")]
    pub product: Option<WireProduct>,
    pub quantity: i64,
}

/// Product as sent by the catalog and inside nested cart lines.
#[derive(Debug, Deserialize)]
pub struct WireProduct {
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "productId")]
    pub product_id: Option<String>,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<WireCategory>,
}

/// Category as a plain name or a populated object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireCategory {
    Name(String),
    Object {
        #[serde(rename = "_id")]
        id: Option<String>,
        name: String,
    },
}

impl WireCategory {
    /// Category name and, for a populated category, its id.
    pub fn into_parts(self) -> (String, Option<String>) {
        match self {
            Self::Name(name) => (name, None),
            Self::Object { id, name } => (name, id),
        }
    }

    pub fn into_name(self) -> String {
        self.into_parts().0
    }
}

/// Body of add and update requests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest<'a> {
    pub product_id: &'a ProductId,
    pub quantity: Quantity,
}

/// Body of the merge request.
#[derive(Debug, Serialize)]
pub struct MergeRequest<'a> {
    pub items: Vec<LineRequest<'a>>,
}
