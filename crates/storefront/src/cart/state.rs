//! Cart state and the guest-side reducers.

use bazaar_core::{CartLine, CartMode, Price, Product, ProductId, Quantity, SyncStatus};
use serde::Serialize;

/// The authoritative in-memory cart.
///
/// Owned by the cart engine; callers only ever see clones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartState {
    /// Lines in insertion order, unique by product.
    pub lines: Vec<CartLine>,
    /// Which path the last operation took.
    pub mode: CartMode,
    /// Lifecycle of the last remote request.
    pub sync_status: SyncStatus,
    /// Message of the last failed operation.
    pub last_error: Option<String>,
}

impl CartState {
    /// Create a cart holding `lines`.
    #[must_use]
    pub fn with_lines(lines: Vec<CartLine>, mode: CartMode) -> Self {
        Self {
            lines,
            mode,
            ..Self::default()
        }
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }

    /// Quantity of a product, if present.
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> Option<Quantity> {
        self.line(product_id).map(|l| l.quantity)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.quantity.get()))
    }

    /// Sum of `price * quantity` over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Add one unit of `product`: bump the existing line or append a new one.
    pub(crate) fn add_one(&mut self, product: &Product) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            line.quantity = line.quantity.increment();
        } else {
            self.lines.push(CartLine::new(product, Quantity::ONE));
        }
    }

    pub(crate) fn mark_loading(&mut self) {
        self.sync_status = SyncStatus::Loading;
    }

    pub(crate) fn mark_succeeded(&mut self) {
        self.sync_status = SyncStatus::Succeeded;
        self.last_error = None;
    }

    pub(crate) fn mark_failed(&mut self, message: impl Into<String>) {
        self.sync_status = SyncStatus::Failed;
        self.last_error = Some(message.into());
    }
}
