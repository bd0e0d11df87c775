use std::cell::RefCell;
use std::collections::BTreeMap;

use super::{ChangeCallback, KvStore, Subscribers, SubscriptionId};
use crate::error::VaultResult;

/// In-process store, the injected fake for tests
#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
    subscribers: Subscribers,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write as if another context did it, firing subscribers
    pub fn external_set(&self, key: &str, value: &str) {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        self.subscribers.notify(key);
    }

    pub fn external_remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
        self.subscribers.notify(key);
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> VaultResult<()> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> VaultResult<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn subscribe(&self, key: &str, callback: ChangeCallback) -> SubscriptionId {
        self.subscribers.add(key, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_own_writes_do_not_notify() {
        let store = MemoryStore::new();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        store.subscribe("k", Rc::new(move |_| counter.set(counter.get() + 1)));

        store.set("k", "1").unwrap();
        assert_eq!(hits.get(), 0);

        store.external_set("k", "2");
        store.external_remove("k");
        assert_eq!(hits.get(), 2);
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = MemoryStore::new();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let id = store.subscribe("k", Rc::new(move |_| counter.set(counter.get() + 1)));
        store.unsubscribe(id);

        store.external_set("k", "1");
        assert_eq!(hits.get(), 0);
    }
}
