//! Two-phase optimistic updates.
//!
//! An [`OptimisticUpdate`] captures the lines before a change, applies the
//! change, and is then either confirmed (dropped) or rolled back. Rollback is
//! scoped to what the change touched, so other products that changed in the
//! meantime keep their state.

use bazaar_core::{CartLine, ProductId, Quantity};

/// The change carried by an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    SetQuantity {
        product_id: ProductId,
        quantity: Quantity,
    },
    Remove {
        product_id: ProductId,
    },
    Clear,
}

/// A captured snapshot plus the change applied on top of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticUpdate {
    change: Change,
    snapshot: Vec<CartLine>,
}

impl OptimisticUpdate {
    /// Capture `lines` before applying `change`.
    ///
    /// Returns `None` when the change targets a product that is not in the
    /// cart.
    #[must_use]
    pub fn capture(lines: &[CartLine], change: Change) -> Option<Self> {
        if let Some(product_id) = change.product_id()
            && !lines.iter().any(|l| &l.product_id == product_id)
        {
            return None;
        }

        Some(Self {
            change,
            snapshot: lines.to_vec(),
        })
    }

    /// Lines as they were before the change.
    #[must_use]
    pub fn snapshot(&self) -> &[CartLine] {
        &self.snapshot
    }

    /// Quantity requested by a `SetQuantity` change.
    #[must_use]
    pub const fn requested_quantity(&self) -> Option<Quantity> {
        match &self.change {
            Change::SetQuantity { quantity, .. } => Some(*quantity),
            Change::Remove { .. } | Change::Clear => None,
        }
    }

    /// Apply the change to `lines`.
    pub fn apply(&self, lines: &mut Vec<CartLine>) {
        match &self.change {
            Change::SetQuantity {
                product_id,
                quantity,
            } => {
                if let Some(line) = lines.iter_mut().find(|l| &l.product_id == product_id) {
                    line.quantity = *quantity;
                }
            }
            Change::Remove { product_id } => lines.retain(|l| &l.product_id != product_id),
            Change::Clear => lines.clear(),
        }
    }

    /// Replace this update's change with a newer one on the same product,
    /// keeping the older snapshot.
    ///
    /// Used when a debounced quantity change is superseded: a failure must
    /// roll back to the state before the first unconfirmed change.
    #[must_use]
    pub fn supersede(self, newer: Self) -> Self {
        Self {
            change: newer.change,
            snapshot: self.snapshot,
        }
    }

    /// Rewrite the snapshot so the product touched by `unconfirmed` shows its
    /// last confirmed state instead of the optimistic one.
    pub fn adopt_confirmed(&mut self, unconfirmed: &Self) {
        unconfirmed.restore(&mut self.snapshot);
    }

    /// The change was accepted; nothing to undo.
    pub fn confirm(self) {
        tracing::debug!(change = ?self.change, "Optimistic update confirmed");
    }

    /// Undo the change on `lines`.
    ///
    /// - quantity change: the line gets its snapshot quantity back, unless it
    ///   has been removed since
    /// - removal: the snapshot line is reinserted at its old position
    /// - clear: snapshot lines come back in front of anything added since
    pub fn rollback(self, lines: &mut Vec<CartLine>) {
        self.restore(lines);
    }

    fn restore(&self, lines: &mut Vec<CartLine>) {
        match &self.change {
            Change::SetQuantity { product_id, .. } => {
                let previous = self.snapshot.iter().find(|l| &l.product_id == product_id);
                let current = lines.iter_mut().find(|l| &l.product_id == product_id);
                if let (Some(previous), Some(current)) = (previous, current) {
                    current.quantity = previous.quantity;
                }
            }
            Change::Remove { product_id } => {
                if lines.iter().any(|l| &l.product_id == product_id) {
                    return;
                }
                if let Some((index, line)) = self
                    .snapshot
                    .iter()
                    .enumerate()
                    .find(|(_, l)| &l.product_id == product_id)
                {
                    lines.insert(index.min(lines.len()), line.clone());
                }
            }
            Change::Clear => {
                let added_since: Vec<CartLine> = lines
                    .drain(..)
                    .filter(|l| !self.snapshot.iter().any(|s| s.product_id == l.product_id))
                    .collect();
                lines.extend(self.snapshot.iter().cloned());
                lines.extend(added_since);
            }
        }
    }
}

impl Change {
    /// Product targeted by the change (`None` for whole-cart changes).
    #[must_use]
    pub const fn product_id(&self) -> Option<&ProductId> {
        match self {
            Self::SetQuantity { product_id, .. } | Self::Remove { product_id } => Some(product_id),
            Self::Clear => None,
        }
    }
}
