//! Per-product debounce bookkeeping for quantity confirmations.
//!
//! Each product with an unconfirmed quantity change has one entry holding the
//! coalesced [`OptimisticUpdate`] and the timer task that will confirm it.
//! Entries carry a generation number so a timer that fires after its entry
//! was replaced or cancelled finds nothing to do.

use std::collections::HashMap;

use bazaar_core::{ProductId, Quantity};
use tokio::task::JoinHandle;

use super::optimistic::OptimisticUpdate;

struct Entry {
    generation: u64,
    update: OptimisticUpdate,
    timer: JoinHandle<()>,
}

/// Unconfirmed quantity changes, keyed by product.
#[derive(Default)]
pub struct PendingConfirmations {
    entries: HashMap<ProductId, Entry>,
    next_generation: u64,
}

impl PendingConfirmations {
    /// Schedule (or reschedule) the confirmation for `product_id`.
    ///
    /// An existing entry's timer is aborted and its snapshot kept; `spawn`
    /// receives the new generation and returns the timer task.
    pub fn schedule(
        &mut self,
        product_id: ProductId,
        update: OptimisticUpdate,
        spawn: impl FnOnce(u64) -> JoinHandle<()>,
    ) {
        let update = match self.entries.remove(&product_id) {
            Some(previous) => {
                previous.timer.abort();
                previous.update.supersede(update)
            }
            None => update,
        };

        self.next_generation += 1;
        let generation = self.next_generation;
        let timer = spawn(generation);

        self.entries.insert(
            product_id,
            Entry {
                generation,
                update,
                timer,
            },
        );
    }

    /// Take the entry whose timer just fired.
    ///
    /// Returns `None` if the entry was replaced or cancelled since.
    pub fn take_due(&mut self, product_id: &ProductId, generation: u64) -> Option<OptimisticUpdate> {
        if self.entries.get(product_id)?.generation != generation {
            return None;
        }
        self.entries.remove(product_id).map(|entry| entry.update)
    }

    /// Cancel the pending confirmation for one product.
    pub fn cancel(&mut self, product_id: &ProductId) -> Option<OptimisticUpdate> {
        let entry = self.entries.remove(product_id)?;
        entry.timer.abort();
        Some(entry.update)
    }

    /// Cancel every pending confirmation.
    pub fn cancel_all(&mut self) -> Vec<OptimisticUpdate> {
        self.drain().into_iter().map(|(_, update)| update).collect()
    }

    /// Remove every entry and stop its timer, returning the updates so the
    /// caller can confirm them right away.
    pub fn drain(&mut self) -> Vec<(ProductId, OptimisticUpdate)> {
        self.entries
            .drain()
            .map(|(product_id, entry)| {
                entry.timer.abort();
                (product_id, entry.update)
            })
            .collect()
    }

    /// Whether `product_id` has an unconfirmed quantity change.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.entries.contains_key(product_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Requested quantities of all pending entries.
    pub fn requested(&self) -> impl Iterator<Item = (&ProductId, Quantity)> {
        self.entries
            .iter()
            .filter_map(|(id, entry)| entry.update.requested_quantity().map(|q| (id, q)))
    }
}

impl std::fmt::Debug for PendingConfirmations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingConfirmations")
            .field("products", &self.entries.keys().collect::<Vec<_>>())
            .field("next_generation", &self.next_generation)
            .finish()
    }
}
