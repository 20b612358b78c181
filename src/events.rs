//! Change notifications for UI consumers.
//!
//! An explicit observer interface with typed payloads: subscribers and the
//! event shape are statically known, rather than an ambient broadcast bus.

use std::collections::HashMap;

use crate::models::{Cart, CartSummary};

/// Which mutation produced the new snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartEventKind {
    Added,
    Updated,
    Removed,
    Cleared,
    Merged,
}

/// Emitted once per successful mutation, carrying the full new snapshot so
/// subscribers render without re-entering the core.
#[derive(Debug, Clone)]
pub struct CartEvent {
    pub kind: CartEventKind,
    pub cart: Cart,
    pub summary: CartSummary,
}

/// Handle returned by `subscribe`, used to unsubscribe.
pub type SubscriberId = u64;

type Callback = Box<dyn Fn(&CartEvent) + Send + Sync>;

/// Registry of change subscribers.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: SubscriberId,
    callbacks: HashMap<SubscriberId, Callback>,
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

impl Subscribers {
    pub(crate) fn subscribe(&mut self, callback: Callback) -> SubscriberId {
        self.next_id += 1;
        self.callbacks.insert(self.next_id, callback);
        self.next_id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriberId) {
        self.callbacks.remove(&id);
    }

    pub(crate) fn emit(&self, event: &CartEvent) {
        for callback in self.callbacks.values() {
            callback(event);
        }
    }
}
