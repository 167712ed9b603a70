//! Per-bundle payload cache.

use crate::BundleResult;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

type Slot = Arc<OnceCell<Arc<[u8]>>>;

/// Decompressed payloads keyed by path.
///
/// Each path owns a [`OnceCell`] slot, so concurrent misses on the same path
/// run exactly one fetch and every caller observes its result. A failed fetch
/// leaves the slot empty and the next caller retries.
#[derive(Default)]
pub struct PayloadCache {
    slots: RwLock<HashMap<String, Slot>>,
}

impl PayloadCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached payload for `path`, running `fetch` on a miss.
    pub fn get_or_fetch<F>(&self, path: &str, fetch: F) -> BundleResult<Arc<[u8]>>
    where
        F: FnOnce() -> BundleResult<Vec<u8>>,
    {
        let slot = self.slot(path);
        slot.get_or_try_init(|| {
            trace!(path, "fetching payload");
            fetch().map(Arc::from)
        })
        .cloned()
    }

    /// Returns the payload if it has already been fetched.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Arc<[u8]>> {
        self.slots.read().get(path).and_then(|slot| slot.get().cloned())
    }

    /// Drop the slot for `path`.
    pub fn invalidate(&self, path: &str) {
        self.slots.write().remove(path);
    }

    pub fn clear(&self) {
        self.slots.write().clear();
    }

    /// Number of filled slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, path: &str) -> Slot {
        if let Some(slot) = self.slots.read().get(path) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(path.to_string()).or_default())
    }
}

impl fmt::Debug for PayloadCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadCache")
            .field("cached", &self.len())
            .finish()
    }
}
