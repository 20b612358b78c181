//! Device-local persistence: the anonymous cart and the merge mark.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};

use crate::models::ProductId;

const CART_KEY: &str = "trolley.cart";
const MERGE_MARK_KEY: &str = "trolley.merged";

/// Generic string key-value persistence, synchronous and best-effort.
///
/// Implementations swallow their own failures (quota, I/O): `set` may
/// silently do nothing and `get` returns `None` for anything unreadable.
/// The in-memory cart stays authoritative for the page lifetime either way.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-process [`KeyValueStorage`] backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }
}

/// A persisted anonymous cart line: bare product and quantity, no enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLineItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Raw persisted shape, before validation. Local storage can be corrupted or
/// tampered with, so fields are read as signed and filtered.
#[derive(Debug, Clone, Copy, Deserialize)]
struct RawLineItem {
    #[serde(default)]
    product_id: i64,
    #[serde(default)]
    quantity: i64,
}

impl RawLineItem {
    fn validate(self) -> Option<StoredLineItem> {
        let product_id = u64::try_from(self.product_id).ok().filter(|id| *id > 0)?;
        let quantity = u32::try_from(self.quantity).ok().filter(|qty| *qty > 0)?;

        Some(StoredLineItem {
            product_id,
            quantity,
        })
    }
}

/// Durable storage for the anonymous cart.
#[derive(Clone)]
pub struct LocalCartStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl std::fmt::Debug for LocalCartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCartStore").finish_non_exhaustive()
    }
}

impl LocalCartStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Read the persisted cart. Never fails: an absent key or unparseable
    /// value is an empty cart, and individual invalid entries are dropped.
    pub fn read(&self) -> Vec<StoredLineItem> {
        let Some(raw) = self.storage.get(CART_KEY) else {
            return Vec::new();
        };

        match serde_json::from_str::<Vec<RawLineItem>>(&raw) {
            Ok(entries) => entries
                .into_iter()
                .filter_map(RawLineItem::validate)
                .collect(),
            Err(error) => {
                tracing::warn!(%error, "stored cart unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Persist the whole cart. Best-effort: serialization of these plain
    /// records cannot fail, and storage swallows its own write failures.
    pub fn write(&self, items: &[StoredLineItem]) {
        if let Ok(encoded) = serde_json::to_string(items) {
            self.storage.set(CART_KEY, &encoded);
        }
    }

    pub fn clear(&self) {
        self.storage.remove(CART_KEY);
    }
}

/// One-shot flag recording that this device's anonymous cart has already
/// been merged into a server cart.
///
/// The core sets it before the merge network call starts and clears it on
/// merge failure and on logout.
#[derive(Clone)]
pub struct MergeMark {
    storage: Arc<dyn KeyValueStorage>,
}

impl std::fmt::Debug for MergeMark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeMark").finish_non_exhaustive()
    }
}

impl MergeMark {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn is_set(&self) -> bool {
        self.storage.get(MERGE_MARK_KEY).is_some()
    }

    pub fn set(&self) {
        self.storage.set(MERGE_MARK_KEY, "1");
    }

    pub fn clear(&self) {
        self.storage.remove(MERGE_MARK_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (Arc<MemoryStorage>, LocalCartStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = LocalCartStore::new(storage.clone());
        (storage, store)
    }

    #[test]
    fn absent_key_reads_as_empty_cart() {
        let (_, store) = store();

        assert!(store.read().is_empty());
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_, store) = store();
        let items = vec![
            StoredLineItem {
                product_id: 5,
                quantity: 2,
            },
            StoredLineItem {
                product_id: 9,
                quantity: 1,
            },
        ];

        store.write(&items);

        assert_eq!(store.read(), items);
    }

    #[test]
    fn unparseable_value_reads_as_empty_cart() {
        let (storage, store) = store();
        storage.set("trolley.cart", "{not json");

        assert!(store.read().is_empty());
    }

    #[test]
    fn invalid_entries_are_filtered_out() {
        let (storage, store) = store();
        storage.set(
            "trolley.cart",
            r#"[{"product_id":5,"quantity":2},
                {"product_id":-3,"quantity":1},
                {"product_id":7,"quantity":0},
                {"product_id":9}]"#,
        );

        assert_eq!(
            store.read(),
            vec![StoredLineItem {
                product_id: 5,
                quantity: 2
            }]
        );
    }

    #[test]
    fn clear_removes_the_cart() {
        let (_, store) = store();
        store.write(&[StoredLineItem {
            product_id: 5,
            quantity: 1,
        }]);

        store.clear();

        assert!(store.read().is_empty());
    }

    #[test]
    fn merge_mark_set_and_clear() {
        let storage = Arc::new(MemoryStorage::new());
        let mark = MergeMark::new(storage);

        assert!(!mark.is_set());

        mark.set();
        assert!(mark.is_set());

        mark.clear();
        assert!(!mark.is_set());
    }
}
