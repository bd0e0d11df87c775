//! Key-value persistence used by the section lock and the list store
//!
//! Values are JSON text. Writes made through a handle do not notify that
//! handle's own subscribers; subscribers only hear about changes made by
//! another context (another process writing the same file, or
//! `MemoryStore::external_set` in tests).

pub mod file;
#[cfg(test)]
pub mod memory;

use serde::{de::DeserializeOwned, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::VaultResult;

pub use file::FileStore;
#[cfg(test)]
pub use memory::MemoryStore;

pub type SubscriptionId = u64;
pub type ChangeCallback = Rc<dyn Fn(&str)>;

pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> VaultResult<()>;
    fn remove(&self, key: &str) -> VaultResult<()>;

    /// Register `callback` for external changes to `key`
    fn subscribe(&self, key: &str, callback: ChangeCallback) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);

    /// Pick up changes made by other contexts and notify subscribers.
    /// Returns the keys that changed.
    fn poll_external(&self) -> VaultResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Read and decode a JSON value. Undecodable values are logged and treated as absent.
pub fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring unreadable value for '{}': {}", key, e);
            None
        }
    }
}

pub fn set_json<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> VaultResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Subscriber registry shared by the store implementations
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: Cell<SubscriptionId>,
    entries: RefCell<Vec<(SubscriptionId, String, ChangeCallback)>>,
}

impl Subscribers {
    pub(crate) fn add(&self, key: &str, callback: ChangeCallback) -> SubscriptionId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.entries.borrow_mut().push((id, key.to_string(), callback));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) {
        self.entries.borrow_mut().retain(|(sub_id, _, _)| *sub_id != id);
    }

    pub(crate) fn notify(&self, key: &str) {
        // Collect first so callbacks may (un)subscribe without a double borrow
        let callbacks: Vec<ChangeCallback> = self
            .entries
            .borrow()
            .iter()
            .filter(|(_, sub_key, _)| sub_key == key)
            .map(|(_, _, cb)| cb.clone())
            .collect();

        for callback in callbacks {
            callback(key);
        }
    }
}

/// Flag-setting subscription helper: the returned flag flips to `true` on any
/// external change to one of `keys`.
pub fn watch_keys(store: &dyn KvStore, keys: &[&str]) -> (Rc<Cell<bool>>, Vec<SubscriptionId>) {
    let stale = Rc::new(Cell::new(false));
    let ids = keys
        .iter()
        .map(|key| {
            let flag = stale.clone();
            store.subscribe(key, Rc::new(move |_| flag.set(true)))
        })
        .collect();
    (stale, ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_json_ignores_garbage() {
        let store = MemoryStore::new();
        store.set("settings", "{not json").unwrap();
        let value: Option<Vec<String>> = get_json(&store, "settings");
        assert!(value.is_none());
    }

    #[test]
    fn test_watch_keys_flags_only_watched_keys() {
        let store = MemoryStore::new();
        let (stale, _ids) = watch_keys(&store, &["userRole"]);

        store.external_set("customLists", "[]");
        assert!(!stale.get());

        store.external_set("userRole", "\"admin\"");
        assert!(stale.get());
    }
}
