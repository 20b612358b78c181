//! Cart synchronization core.
//!
//! The single source of truth for "what is my cart right now". Operations
//! route between the device-local store (anonymous session) and the remote
//! cart service (authenticated session); a session signing in triggers an
//! at-most-once merge of the local cart into the server cart.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use crate::{
    catalog::ProductLookup,
    errors::CartSyncError,
    events::{CartEvent, CartEventKind, SubscriberId, Subscribers},
    models::{Cart, CartLineItem, CartSummary, ItemRef, ProductId},
    remote::{RemoteCartClient, RemoteCartState},
    session::SessionIdentity,
    storage::{KeyValueStorage, LocalCartStore, MergeMark, StoredLineItem},
};

/// Successful result of a cart operation: the new snapshot, plus an optional
/// human-readable confirmation for the UI.
#[derive(Debug, Clone)]
pub struct CartOutcome {
    pub cart: Cart,
    pub summary: CartSummary,
    pub message: Option<String>,
}

#[derive(Debug)]
struct CoreState {
    session: SessionIdentity,
    cart: Cart,
    summary: CartSummary,
    last_error: Option<String>,
}

/// The cart synchronization core.
///
/// UI surfaces share one instance; they read the current snapshot through
/// the getters, mutate through the async operations, and subscribe for
/// change events. Calls may overlap: each routed operation takes a sequence
/// number at issue time and a completed response is discarded when a newer
/// request has been issued since, so the snapshot is always the latest
/// response, never a stale one.
pub struct CartSyncService {
    remote: Arc<dyn RemoteCartClient>,
    lookup: Arc<dyn ProductLookup>,
    local: LocalCartStore,
    merge_mark: MergeMark,
    state: Mutex<CoreState>,
    subscribers: Mutex<Subscribers>,
    issued: AtomicU64,
    loading: AtomicUsize,
}

impl std::fmt::Debug for CartSyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSyncService").finish_non_exhaustive()
    }
}

struct LoadingGuard<'a>(&'a AtomicUsize);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CartSyncService {
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteCartClient>,
        lookup: Arc<dyn ProductLookup>,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Self {
        Self {
            remote,
            lookup,
            local: LocalCartStore::new(storage.clone()),
            merge_mark: MergeMark::new(storage),
            state: Mutex::new(CoreState {
                session: SessionIdentity::Anonymous,
                cart: Cart::empty(),
                summary: CartSummary::default(),
                last_error: None,
            }),
            subscribers: Mutex::new(Subscribers::default()),
            issued: AtomicU64::new(0),
            loading: AtomicUsize::new(0),
        }
    }

    /// Load the cart for the current session: the enriched local cart when
    /// anonymous, the server cart (summary taken verbatim) when
    /// authenticated.
    pub async fn fetch_cart(&self) -> Result<CartOutcome, CartSyncError> {
        let seq = self.issue_seq();
        let _loading = self.begin_loading();

        match self.session() {
            SessionIdentity::Anonymous => {
                let stored = self.local.read();
                let cart = self.enrich(&stored).await;
                let summary = cart.summary();

                self.apply(seq, cart.clone(), summary, None);

                Ok(CartOutcome {
                    cart,
                    summary,
                    message: None,
                })
            }
            SessionIdentity::Authenticated(_) => {
                let state = self
                    .remote
                    .get_cart()
                    .await
                    .map_err(|error| self.fail(error.into()))?;

                let (cart, summary, message) = split_remote(state);
                self.apply(seq, cart.clone(), summary, None);

                Ok(CartOutcome {
                    cart,
                    summary,
                    message,
                })
            }
        }
    }

    /// Add `quantity` of a product. An existing line for the same product is
    /// incremented, never duplicated. On the authenticated path the server's
    /// resulting cart replaces the snapshot wholesale; the core never
    /// guesses the resulting quantity, since the server may clamp against
    /// stock.
    pub async fn add_to_cart(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartOutcome, CartSyncError> {
        if quantity < 1 {
            return Err(self.fail(CartSyncError::InvalidQuantity));
        }

        let seq = self.issue_seq();
        let _loading = self.begin_loading();

        match self.session() {
            SessionIdentity::Anonymous => {
                let mut stored = self.local.read();

                match stored.iter_mut().find(|line| line.product_id == product_id) {
                    Some(line) => line.quantity = line.quantity.saturating_add(quantity),
                    None => stored.push(StoredLineItem {
                        product_id,
                        quantity,
                    }),
                }

                self.local.write(&stored);

                let cart = self.enrich(&stored).await;
                let summary = cart.summary();

                let message = cart
                    .items
                    .iter()
                    .find(|item| item.product_id == product_id)
                    .and_then(|item| item.product.as_ref())
                    .map_or_else(
                        || "Added item to your cart".to_string(),
                        |product| format!("Added {} to your cart", product.name),
                    );

                self.apply(seq, cart.clone(), summary, Some(CartEventKind::Added));

                Ok(CartOutcome {
                    cart,
                    summary,
                    message: Some(message),
                })
            }
            SessionIdentity::Authenticated(_) => {
                let state = self
                    .remote
                    .add_item(product_id, quantity)
                    .await
                    .map_err(|error| self.fail(error.into()))?;

                let (cart, summary, message) = split_remote(state);
                self.apply(seq, cart.clone(), summary, Some(CartEventKind::Added));

                Ok(CartOutcome {
                    cart,
                    summary,
                    message,
                })
            }
        }
    }

    /// Set the quantity of an existing line item.
    pub async fn update_item(
        &self,
        item: ItemRef,
        quantity: u32,
    ) -> Result<CartOutcome, CartSyncError> {
        if quantity < 1 {
            return Err(self.fail(CartSyncError::InvalidQuantity));
        }

        let seq = self.issue_seq();
        let _loading = self.begin_loading();

        match (self.session(), item) {
            (SessionIdentity::Anonymous, ItemRef::Local(index)) => {
                let mut stored = self.local.read();

                let Some(line) = stored.get_mut(index) else {
                    return Err(self.fail(CartSyncError::ItemNotFound));
                };
                line.quantity = quantity;

                self.local.write(&stored);
                self.finish_local(seq, &stored, CartEventKind::Updated).await
            }
            (SessionIdentity::Authenticated(_), ItemRef::Server(item_id)) => {
                let state = self
                    .remote
                    .update_item(item_id, quantity)
                    .await
                    .map_err(|error| self.fail(error.into()))?;

                self.finish_remote(seq, state, CartEventKind::Updated)
            }
            _ => Err(self.fail(CartSyncError::InvalidItemRef)),
        }
    }

    /// Remove a line item.
    pub async fn remove_item(&self, item: ItemRef) -> Result<CartOutcome, CartSyncError> {
        let seq = self.issue_seq();
        let _loading = self.begin_loading();

        match (self.session(), item) {
            (SessionIdentity::Anonymous, ItemRef::Local(index)) => {
                let mut stored = self.local.read();

                if index >= stored.len() {
                    return Err(self.fail(CartSyncError::ItemNotFound));
                }
                stored.remove(index);

                self.local.write(&stored);
                self.finish_local(seq, &stored, CartEventKind::Removed).await
            }
            (SessionIdentity::Authenticated(_), ItemRef::Server(item_id)) => {
                let state = self
                    .remote
                    .remove_item(item_id)
                    .await
                    .map_err(|error| self.fail(error.into()))?;

                self.finish_remote(seq, state, CartEventKind::Removed)
            }
            _ => Err(self.fail(CartSyncError::InvalidItemRef)),
        }
    }

    /// Empty the cart.
    ///
    /// Clearing is a user-visible irreversible intent: on the authenticated
    /// path the in-memory cart is forced empty even when the remote call
    /// fails, and the error is still returned to the caller. A stale
    /// non-empty cart after an explicit clear would be worse than a silent
    /// desync.
    pub async fn clear_cart(&self) -> Result<CartOutcome, CartSyncError> {
        let seq = self.issue_seq();
        let _loading = self.begin_loading();

        match self.session() {
            SessionIdentity::Anonymous => {
                self.local.clear();
                self.apply(
                    seq,
                    Cart::empty(),
                    CartSummary::default(),
                    Some(CartEventKind::Cleared),
                );

                Ok(CartOutcome {
                    cart: Cart::empty(),
                    summary: CartSummary::default(),
                    message: None,
                })
            }
            SessionIdentity::Authenticated(_) => match self.remote.clear().await {
                Ok(state) => self.finish_remote(seq, state, CartEventKind::Cleared),
                Err(error) => {
                    self.apply(
                        seq,
                        Cart::empty(),
                        CartSummary::default(),
                        Some(CartEventKind::Cleared),
                    );

                    Err(self.fail(error.into()))
                }
            },
        }
    }

    /// React to a session identity change reported by the authentication
    /// observer.
    ///
    /// Only the anonymous/authenticated edge matters: signing in triggers
    /// the at-most-once merge of the local cart, signing out clears the
    /// merge mark (permitting a fresh merge on the next login) and resets
    /// the snapshot. An identity switch between two authenticated users is
    /// recorded but triggers nothing.
    pub async fn handle_session_change(&self, session: SessionIdentity) {
        let (was, now) = {
            let mut state = self.state();
            let was = state.session.is_authenticated();
            state.session = session;
            (was, session.is_authenticated())
        };

        match (was, now) {
            (false, true) => self.merge_on_login().await,
            (true, false) => {
                self.merge_mark.clear();

                let seq = self.issue_seq();
                self.apply(seq, Cart::empty(), CartSummary::default(), None);
            }
            _ => {}
        }
    }

    /// Merge the anonymous local cart into the freshly authenticated server
    /// cart, at most once per login transition.
    async fn merge_on_login(&self) {
        // Claim the mark under the state lock, before the network call, so a
        // concurrent second trigger can never start a duplicate merge.
        let claimed = {
            let _guard = self.state();
            if self.merge_mark.is_set() {
                false
            } else {
                self.merge_mark.set();
                true
            }
        };

        if !claimed {
            tracing::debug!("anonymous cart already merged, skipping");
            return;
        }

        let stored = self.local.read();
        if stored.is_empty() {
            return;
        }

        let seq = self.issue_seq();
        let _loading = self.begin_loading();

        match self.remote.merge(stored).await {
            Ok(state) => {
                self.local.clear();

                let (cart, summary, _message) = split_remote(state);
                self.apply(seq, cart, summary, Some(CartEventKind::Merged));
            }
            Err(error) => {
                // Best-effort: roll the mark back so a later attempt may run,
                // and never block the login flow on it.
                self.merge_mark.clear();
                tracing::warn!(%error, "merging local cart into server cart failed");
            }
        }
    }

    /// The latest cart snapshot.
    pub fn current_cart(&self) -> Cart {
        self.state().cart.clone()
    }

    /// The latest summary.
    pub fn current_summary(&self) -> CartSummary {
        self.state().summary
    }

    /// Whether any operation is currently in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    /// Message of the most recent failed operation, cleared by the next
    /// success.
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    /// The session identity the core currently routes by.
    pub fn session(&self) -> SessionIdentity {
        self.state().session
    }

    /// Register a change subscriber. The callback runs synchronously after
    /// each successful mutation, with the full new snapshot as payload.
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&CartEvent) + Send + Sync + 'static,
    {
        self.subscribers().subscribe(Box::new(callback))
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers().unsubscribe(id);
    }

    /// Hydrate stored lines into a displayable cart with one batched lookup.
    /// Lookup misses leave `product` unset; a failed batch is the same as an
    /// empty one.
    async fn enrich(&self, stored: &[StoredLineItem]) -> Cart {
        let mut product_ids: Vec<ProductId> =
            stored.iter().map(|line| line.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();

        let snapshots = if product_ids.is_empty() {
            Default::default()
        } else {
            match self.lookup.batch_get(product_ids).await {
                Ok(snapshots) => snapshots,
                Err(error) => {
                    tracing::warn!(%error, "product enrichment failed, rendering bare items");
                    Default::default()
                }
            }
        };

        let items = stored
            .iter()
            .enumerate()
            .map(|(index, line)| CartLineItem {
                item: ItemRef::Local(index),
                product_id: line.product_id,
                quantity: line.quantity,
                product: snapshots.get(&line.product_id).cloned(),
            })
            .collect();

        Cart { items }
    }

    async fn finish_local(
        &self,
        seq: u64,
        stored: &[StoredLineItem],
        kind: CartEventKind,
    ) -> Result<CartOutcome, CartSyncError> {
        let cart = self.enrich(stored).await;
        let summary = cart.summary();

        self.apply(seq, cart.clone(), summary, Some(kind));

        Ok(CartOutcome {
            cart,
            summary,
            message: None,
        })
    }

    fn finish_remote(
        &self,
        seq: u64,
        state: RemoteCartState,
        kind: CartEventKind,
    ) -> Result<CartOutcome, CartSyncError> {
        let (cart, summary, message) = split_remote(state);

        self.apply(seq, cart.clone(), summary, Some(kind));

        Ok(CartOutcome {
            cart,
            summary,
            message,
        })
    }

    /// Replace the snapshot and notify subscribers, unless a newer request
    /// has been issued since `seq` (in which case the response is stale and
    /// discarded; the newer request's response subsumes it).
    fn apply(
        &self,
        seq: u64,
        cart: Cart,
        summary: CartSummary,
        event: Option<CartEventKind>,
    ) -> bool {
        {
            let mut state = self.state();

            if self.issued.load(Ordering::SeqCst) != seq {
                tracing::debug!(seq, "discarding stale cart response");
                return false;
            }

            state.cart = cart.clone();
            state.summary = summary;
            state.last_error = None;
        }

        if let Some(kind) = event {
            self.subscribers().emit(&CartEvent {
                kind,
                cart,
                summary,
            });
        }

        true
    }

    fn fail(&self, error: CartSyncError) -> CartSyncError {
        self.state().last_error = Some(error.to_string());
        error
    }

    fn issue_seq(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.loading.fetch_add(1, Ordering::SeqCst);
        LoadingGuard(&self.loading)
    }

    fn state(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn split_remote(state: RemoteCartState) -> (Cart, CartSummary, Option<String>) {
    let items = state
        .items
        .into_iter()
        .map(|item| CartLineItem {
            item: ItemRef::Server(item.item_id),
            product_id: item.product_id,
            quantity: item.quantity,
            product: item.product,
        })
        .collect();

    (Cart { items }, state.summary, state.message)
}
