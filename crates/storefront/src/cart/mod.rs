//! Cart synchronization engine.
//!
//! # Architecture
//!
//! - One authoritative [`CartState`] in memory, guarded by a mutex that is
//!   never held across an `.await`
//! - Guest mode (no token): every mutation applies locally and the line list
//!   is persisted under [`keys::GUEST_CART`]
//! - Authenticated mode: the server is the source of truth
//!   - add and fetch replace the lines with the server's cart
//!   - quantity changes apply optimistically and are confirmed after a
//!     per-product debounce window
//!   - removal and clear apply optimistically and call the server right away
//!   - a failed confirmation rolls the change back; if the session ended
//!     meanwhile the restored lines are persisted as the guest cart
//!   - adding a product with an unconfirmed quantity sends that quantity plus
//!     one instead of a separate add
//! - Login merges the guest cart into the user's cart; logout keeps the lines
//!   as a guest cart
//!
//! Observers subscribe to [`CartEvent`]s to learn about changes and
//! background failures.
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = CartEngine::new(api, store, auth, Duration::from_millis(500));
//! engine.initialize().await?;
//!
//! engine.add_to_cart(&product).await?;
//! engine.increase_quantity(&product.id);   // applied now, confirmed later
//! engine.flush_pending().await;            // confirm before exiting
//! ```

mod debounce;
mod optimistic;
mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bazaar_core::{CartLine, CartMode, Product, ProductId, Quantity, SyncStatus};
use secrecy::SecretString;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, CartService};
use crate::error::{CartError, Result, add_breadcrumb, report_sync_failure};
use crate::services::auth::AuthSession;
use crate::store::{LocalStore, keys};

use debounce::PendingConfirmations;
pub use optimistic::{Change, OptimisticUpdate};
pub use state::CartState;

/// Default debounce window for quantity confirmations.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Capacity of the event channel; slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 64;

// =============================================================================
// Events
// =============================================================================

/// The remote operation behind a [`CartEvent::SyncFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOperation {
    Fetch,
    Add,
    SetQuantity,
    Remove,
    Clear,
    Merge,
}

impl CartOperation {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Add => "add",
            Self::SetQuantity => "set_quantity",
            Self::Remove => "remove",
            Self::Clear => "clear",
            Self::Merge => "merge",
        }
    }
}

impl std::fmt::Display for CartOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification published after the cart changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    /// Lines, mode or status changed.
    Changed,
    /// A remote operation failed. Optimistic changes were rolled back.
    SyncFailed {
        operation: CartOperation,
        product_id: Option<ProductId>,
        message: String,
    },
}

// =============================================================================
// CartEngine
// =============================================================================

/// Guest/authenticated cart with optimistic, debounced server sync.
///
/// Cheaply cloneable; clones share the same state.
pub struct CartEngine<S> {
    inner: Arc<EngineInner<S>>,
}

impl<S> Clone for CartEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<S> {
    service: S,
    store: LocalStore,
    auth: AuthSession,
    debounce: Duration,
    // Lock order: state, then pending.
    state: Mutex<CartState>,
    pending: Mutex<PendingConfirmations>,
    events: broadcast::Sender<CartEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: CartService> CartEngine<S> {
    /// Create an engine.
    ///
    /// Without a token the guest cart is restored from `store` right away;
    /// with one the cart starts empty until [`initialize`](Self::initialize)
    /// fetches it.
    #[must_use]
    pub fn new(service: S, store: LocalStore, auth: AuthSession, debounce: Duration) -> Self {
        let state = if auth.is_authenticated() {
            CartState::with_lines(Vec::new(), CartMode::Authenticated)
        } else {
            CartState::with_lines(store.load_or_default(keys::GUEST_CART), CartMode::Guest)
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(EngineInner {
                service,
                store,
                auth,
                debounce,
                state: Mutex::new(state),
                pending: Mutex::new(PendingConfirmations::default()),
                events,
            }),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> CartState {
        lock(&self.inner.state).clone()
    }

    /// A copy of the current lines.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        lock(&self.inner.state).lines.clone()
    }

    /// Whether a quantity change for `product_id` awaits confirmation.
    #[must_use]
    pub fn is_pending(&self, product_id: &ProductId) -> bool {
        lock(&self.inner.pending).contains(product_id)
    }

    /// Number of products with unconfirmed quantity changes.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    /// Subscribe to cart events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Load the cart for the current session.
    ///
    /// Guests get the persisted guest cart. With a token the user's cart is
    /// fetched; if the server rejects the token, the session is discarded and
    /// the engine falls back to the guest cart before returning the error.
    ///
    /// # Errors
    ///
    /// Returns the fetch error.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        let Some(token) = self.inner.auth.token() else {
            self.restore_guest_cart();
            return Ok(());
        };

        match self.fetch_user_cart(&token).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_unauthorized() => {
                warn!(error = %e, "Session rejected by server, continuing as guest");
                self.inner.auth.discard();
                self.restore_guest_cart();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Store the new token and merge the guest cart into the user's cart.
    ///
    /// # Errors
    ///
    /// Returns the merge error; see [`sync_guest_cart`](Self::sync_guest_cart).
    #[instrument(skip(self, token))]
    pub async fn on_login(&self, token: SecretString) -> Result<()> {
        self.inner.auth.set_token(token.clone());
        // Lines of a previous account session are server lines, not a guest cart
        let guest_lines = {
            let state = lock(&self.inner.state);
            lock(&self.inner.pending).cancel_all();
            match state.mode {
                CartMode::Guest => state.lines.clone(),
                CartMode::Authenticated => Vec::new(),
            }
        };
        add_breadcrumb("auth", "Logged in", None);
        self.sync_guest_cart(guest_lines, &token).await
    }

    /// Drop the token and keep the current lines as the guest cart.
    ///
    /// Unconfirmed quantity changes are abandoned; their optimistic values
    /// stay in the lines.
    #[instrument(skip(self))]
    pub fn on_logout(&self) {
        {
            let mut state = lock(&self.inner.state);
            let abandoned = lock(&self.inner.pending).cancel_all();
            if !abandoned.is_empty() {
                debug!(count = abandoned.len(), "Abandoned unconfirmed quantity changes");
            }
            self.inner.auth.discard();
            state.mode = CartMode::Guest;
            state.sync_status = SyncStatus::Idle;
            state.last_error = None;
            self.persist_guest(&state.lines);
        }
        add_breadcrumb("auth", "Logged out", None);
        info!("Logged out, cart kept as guest cart");
        self.publish(CartEvent::Changed);
    }

    // =========================================================================
    // Server sync
    // =========================================================================

    /// Replace the lines with the user's server cart.
    ///
    /// On failure the lines are left as they were.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self, token))]
    pub async fn fetch_user_cart(&self, token: &SecretString) -> Result<()> {
        {
            let mut state = lock(&self.inner.state);
            state.mode = CartMode::Authenticated;
            state.mark_loading();
        }
        self.publish(CartEvent::Changed);

        match self.inner.service.fetch_cart(token).await {
            Ok(lines) => {
                self.replace_lines(lines);
                Ok(())
            }
            Err(e) => Err(self.fail(CartOperation::Fetch, None, e)),
        }
    }

    /// Merge `guest_lines` into the user's cart and clear the stored guest
    /// cart.
    ///
    /// An empty guest cart skips the merge and only fetches. If the merge
    /// fails the server cart is fetched instead, the stored guest cart is kept
    /// for a later attempt, and the merge error is returned.
    ///
    /// # Errors
    ///
    /// Returns the merge (or fetch) error.
    #[instrument(skip(self, guest_lines, token), fields(lines = guest_lines.len()))]
    pub async fn sync_guest_cart(
        &self,
        guest_lines: Vec<CartLine>,
        token: &SecretString,
    ) -> Result<()> {
        if guest_lines.is_empty() {
            self.inner.store.remove(keys::GUEST_CART);
            return self.fetch_user_cart(token).await;
        }

        {
            let mut state = lock(&self.inner.state);
            state.mode = CartMode::Authenticated;
            state.mark_loading();
        }

        match self.inner.service.merge(token, &guest_lines).await {
            Ok(lines) => {
                self.inner.store.remove(keys::GUEST_CART);
                info!(merged = guest_lines.len(), "Guest cart merged");
                self.replace_lines(lines);
                Ok(())
            }
            Err(merge_error) => {
                warn!(error = %merge_error, "Guest cart merge failed, fetching server cart");
                if let Err(fetch_error) = self.fetch_user_cart(token).await {
                    warn!(error = %fetch_error, "Fallback cart fetch failed");
                }
                Err(self.fail(CartOperation::Merge, None, merge_error))
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `product`.
    ///
    /// Guests get a new line or a bumped quantity. Authenticated users wait
    /// for the server, whose cart then replaces the lines. An unconfirmed
    /// quantity change for the product is folded into the request: the server
    /// is sent that quantity plus one instead of an add.
    ///
    /// # Errors
    ///
    /// Returns the API error; the lines go back to the last confirmed state.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart(&self, product: &Product) -> Result<()> {
        add_breadcrumb(
            "cart",
            "Added to cart",
            Some(&[("product_id", product.id.as_str())]),
        );

        let Some(token) = self.inner.auth.token() else {
            {
                let mut state = lock(&self.inner.state);
                state.mode = CartMode::Guest;
                state.add_one(product);
                self.persist_guest(&state.lines);
            }
            self.publish(CartEvent::Changed);
            return Ok(());
        };

        let folded = {
            let mut state = lock(&self.inner.state);
            state.mode = CartMode::Authenticated;
            state.mark_loading();
            lock(&self.inner.pending).cancel(&product.id)
        };

        let result = match folded.as_ref().and_then(OptimisticUpdate::requested_quantity) {
            Some(pending) => {
                let quantity = pending.increment();
                debug!(quantity = %quantity, "Folding add into unconfirmed quantity");
                self.inner
                    .service
                    .set_quantity(&token, &product.id, quantity)
                    .await
            }
            None => {
                self.inner
                    .service
                    .add_item(&token, &product.id, Quantity::ONE)
                    .await
            }
        };

        match result {
            Ok(lines) => {
                if let Some(update) = folded {
                    update.confirm();
                }
                self.replace_lines(lines);
                Ok(())
            }
            Err(e) => {
                if let Some(update) = folded {
                    let mut state = lock(&self.inner.state);
                    // A change made on top of the refused value is void too
                    lock(&self.inner.pending).cancel(&product.id);
                    self.roll_back(&mut state, update);
                }
                Err(self.fail(CartOperation::Add, Some(product.id.clone()), e))
            }
        }
    }

    /// Set the quantity of a line.
    ///
    /// The change shows immediately. Guests persist it; authenticated users
    /// confirm it with the server once `product_id` has been quiet for the
    /// debounce window, sending only the latest value. Unknown products are
    /// ignored.
    ///
    /// Must be called from within a Tokio runtime when authenticated.
    #[instrument(skip(self), fields(product_id = %product_id, quantity = %quantity))]
    pub fn set_quantity(&self, product_id: &ProductId, quantity: Quantity) {
        let authenticated = self.inner.auth.is_authenticated();
        {
            let mut state = lock(&self.inner.state);
            let change = Change::SetQuantity {
                product_id: product_id.clone(),
                quantity,
            };
            let Some(update) = OptimisticUpdate::capture(&state.lines, change) else {
                debug!("Product not in cart, ignoring quantity change");
                return;
            };
            update.apply(&mut state.lines);

            if authenticated {
                state.mode = CartMode::Authenticated;
                lock(&self.inner.pending).schedule(product_id.clone(), update, |generation| {
                    self.spawn_confirmation(product_id.clone(), generation)
                });
            } else {
                state.mode = CartMode::Guest;
                self.persist_guest(&state.lines);
            }
        }
        self.publish(CartEvent::Changed);
    }

    /// Add one unit to an existing line.
    pub fn increase_quantity(&self, product_id: &ProductId) {
        let current = lock(&self.inner.state).quantity_of(product_id);
        if let Some(quantity) = current {
            self.set_quantity(product_id, quantity.increment());
        }
    }

    /// Take one unit off an existing line. A line at one unit is left alone;
    /// use [`remove_from_cart`](Self::remove_from_cart) to drop it.
    pub fn decrease_quantity(&self, product_id: &ProductId) {
        let current = lock(&self.inner.state).quantity_of(product_id);
        if let Some(quantity) = current.and_then(Quantity::decrement) {
            self.set_quantity(product_id, quantity);
        }
    }

    /// Remove a line.
    ///
    /// Any unconfirmed quantity change for the product is cancelled. For
    /// authenticated users the removal shows immediately and is rolled back
    /// if the server refuses it.
    ///
    /// # Errors
    ///
    /// Returns the API error after rolling back.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_cart(&self, product_id: &ProductId) -> Result<()> {
        add_breadcrumb(
            "cart",
            "Removed from cart",
            Some(&[("product_id", product_id.as_str())]),
        );
        let token = self.inner.auth.token();

        let update = {
            let mut state = lock(&self.inner.state);
            let cancelled = lock(&self.inner.pending).cancel(product_id);
            let change = Change::Remove {
                product_id: product_id.clone(),
            };
            let Some(mut update) = OptimisticUpdate::capture(&state.lines, change) else {
                debug!("Product not in cart, nothing to remove");
                return Ok(());
            };
            if let Some(unconfirmed) = &cancelled {
                update.adopt_confirmed(unconfirmed);
            }
            update.apply(&mut state.lines);

            if token.is_none() {
                state.mode = CartMode::Guest;
                self.persist_guest(&state.lines);
            } else {
                state.mode = CartMode::Authenticated;
                state.mark_loading();
            }
            update
        };
        self.publish(CartEvent::Changed);

        let Some(token) = token else {
            return Ok(());
        };

        match self.inner.service.remove_item(&token, product_id).await {
            Ok(_) => {
                update.confirm();
                self.mark_succeeded();
                Ok(())
            }
            Err(e) => {
                self.roll_back(&mut lock(&self.inner.state), update);
                Err(self.fail(CartOperation::Remove, Some(product_id.clone()), e))
            }
        }
    }

    /// Remove every line.
    ///
    /// All unconfirmed quantity changes are cancelled. For authenticated users
    /// the cart empties immediately and is restored if the server refuses.
    ///
    /// # Errors
    ///
    /// Returns the API error after rolling back.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<()> {
        add_breadcrumb("cart", "Cleared cart", None);
        let token = self.inner.auth.token();

        let update = {
            let mut state = lock(&self.inner.state);
            let cancelled = lock(&self.inner.pending).cancel_all();
            let Some(mut update) = OptimisticUpdate::capture(&state.lines, Change::Clear) else {
                return Ok(());
            };
            for unconfirmed in &cancelled {
                update.adopt_confirmed(unconfirmed);
            }
            update.apply(&mut state.lines);

            if token.is_none() {
                state.mode = CartMode::Guest;
                self.persist_guest(&state.lines);
            } else {
                state.mode = CartMode::Authenticated;
                state.mark_loading();
            }
            update
        };
        self.publish(CartEvent::Changed);

        let Some(token) = token else {
            return Ok(());
        };

        match self.inner.service.clear(&token).await {
            Ok(()) => {
                update.confirm();
                self.mark_succeeded();
                Ok(())
            }
            Err(e) => {
                self.roll_back(&mut lock(&self.inner.state), update);
                Err(self.fail(CartOperation::Clear, None, e))
            }
        }
    }

    /// Confirm every pending quantity change now instead of waiting for its
    /// debounce window.
    ///
    /// Failures roll back and are published as events, as they would be
    /// from the timer.
    #[instrument(skip(self))]
    pub async fn flush_pending(&self) {
        let due = lock(&self.inner.pending).drain();
        if due.is_empty() {
            return;
        }
        debug!(count = due.len(), "Flushing pending quantity changes");
        for (product_id, update) in due {
            self.confirm_quantity(product_id, update).await;
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn spawn_confirmation(&self, product_id: ProductId, generation: u64) -> JoinHandle<()> {
        let engine = self.clone();
        let window = self.inner.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let due = lock(&engine.inner.pending).take_due(&product_id, generation);
            if let Some(update) = due {
                engine.confirm_quantity(product_id, update).await;
            }
        })
    }

    /// Send a debounced quantity to the server. Success leaves the state
    /// alone; failure rolls back to the snapshot taken before the first
    /// unconfirmed change.
    async fn confirm_quantity(&self, product_id: ProductId, update: OptimisticUpdate) {
        let Some(quantity) = update.requested_quantity() else {
            return;
        };

        let result = match self.inner.auth.token() {
            Some(token) => {
                self.inner
                    .service
                    .set_quantity(&token, &product_id, quantity)
                    .await
            }
            None => Err(ApiError::Unauthorized(
                "session ended before the change was confirmed".to_string(),
            )),
        };

        match result {
            Ok(_) => {
                debug!(product_id = %product_id, quantity = %quantity, "Quantity confirmed");
                update.confirm();
                self.mark_succeeded();
            }
            Err(e) => {
                {
                    let mut state = lock(&self.inner.state);
                    // A newer change made on top of the failed value is void too
                    if lock(&self.inner.pending).cancel(&product_id).is_some() {
                        debug!(product_id = %product_id, "Cancelled newer pending change");
                    }
                    self.roll_back(&mut state, update);
                }
                // The error is surfaced through the event only
                let _ = self.fail(CartOperation::SetQuantity, Some(product_id), e);
            }
        }
    }

    fn restore_guest_cart(&self) {
        {
            let mut state = lock(&self.inner.state);
            lock(&self.inner.pending).cancel_all();
            *state = CartState::with_lines(
                self.inner.store.load_or_default(keys::GUEST_CART),
                CartMode::Guest,
            );
        }
        self.publish(CartEvent::Changed);
    }

    /// Replace the lines with a server cart, keeping unconfirmed quantities
    /// visible on top of it.
    fn replace_lines(&self, mut lines: Vec<CartLine>) {
        {
            let mut state = lock(&self.inner.state);
            let pending = lock(&self.inner.pending);
            for (product_id, quantity) in pending.requested() {
                if let Some(line) = lines.iter_mut().find(|l| &l.product_id == product_id) {
                    line.quantity = quantity;
                }
            }
            state.lines = lines;
            state.mode = CartMode::Authenticated;
            state.mark_succeeded();
        }
        self.publish(CartEvent::Changed);
    }

    /// Undo a refused change. If the session ended while the request was in
    /// flight the lines are a guest cart now, so the stored copy follows.
    fn roll_back(&self, state: &mut CartState, update: OptimisticUpdate) {
        update.rollback(&mut state.lines);
        if state.mode == CartMode::Guest {
            self.persist_guest(&state.lines);
        }
    }

    fn mark_succeeded(&self) {
        lock(&self.inner.state).mark_succeeded();
        self.publish(CartEvent::Changed);
    }

    /// Record a failed remote operation and publish it.
    fn fail(
        &self,
        operation: CartOperation,
        product_id: Option<ProductId>,
        error: ApiError,
    ) -> CartError {
        report_sync_failure(operation.as_str(), &error);
        let message = error.to_string();
        lock(&self.inner.state).mark_failed(message.clone());
        self.publish(CartEvent::SyncFailed {
            operation,
            product_id,
            message,
        });
        CartError::Api(error)
    }

    fn persist_guest(&self, lines: &[CartLine]) {
        self.inner.store.save(keys::GUEST_CART, lines);
    }

    fn publish(&self, event: CartEvent) {
        // Err only means nobody is listening
        let _ = self.inner.events.send(event);
    }
}

impl<S> std::fmt::Debug for CartEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEngine")
            .field("state", &*lock(&self.inner.state))
            .field("pending", &*lock(&self.inner.pending))
            .field("debounce", &self.inner.debounce)
            .finish_non_exhaustive()
    }
}
