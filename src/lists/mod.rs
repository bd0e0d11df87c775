//! Named movie lists persisted to the key-value store.
//!
//! Every mutation builds the next collection, writes it, and only then
//! replaces the in-memory copy, so a failed write leaves state untouched.

pub mod item;
pub mod view;

use serde::Deserialize;
use serde_json::Value;
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::clock::Clock;
use crate::error::{VaultError, VaultResult};
use crate::store::{set_json, watch_keys, KvStore, SubscriptionId};
pub use item::{Item, List};
pub use view::{ItemSort, ListSort, ListStats};

/// Key of the main collection
pub const KEY_LISTS: &str = "customLists";

/// Key holding the lists kept behind a locked section
pub fn section_lists_key(section: &str) -> String {
    format!("sectionLists:{}", section)
}

/// Result of `add_item` when nothing went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Same title already in the list; nothing changed
    AlreadyPresent,
}

/// Up or down by one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Key where a stored collection that did not fully decode is kept
fn unreadable_key(key: &str) -> String {
    format!("{}:unreadable", key)
}

/// Decode a stored collection list by list and item by item, dropping only
/// the entries that do not decode. Returns whether anything was dropped.
fn decode_stored(raw: &str, key: &str) -> (Vec<List>, bool) {
    let entries = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) | Err(_) => {
            tracing::warn!("Stored lists under '{}' are not a JSON array", key);
            return (Vec::new(), true);
        }
    };

    let mut dropped = false;
    let mut lists = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(mut fields) = entry else {
            tracing::warn!("Skipping non-object list under '{}'", key);
            dropped = true;
            continue;
        };
        let Some(Value::String(name)) = fields.remove("name") else {
            tracing::warn!("Skipping list without a name under '{}'", key);
            dropped = true;
            continue;
        };

        let raw_items = match fields.remove("items") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                tracing::warn!("List '{}' has malformed items", name);
                dropped = true;
                Vec::new()
            }
        };
        let mut items = Vec::with_capacity(raw_items.len());
        for raw_item in raw_items {
            match Item::try_from(raw_item) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!("Skipping item in list '{}': {}", name, e);
                    dropped = true;
                }
            }
        }

        lists.push(List {
            name,
            items,
            favorite: fields.get("favorite").and_then(Value::as_bool).unwrap_or(false),
            created_at: fields.get("createdAt").and_then(Value::as_u64).unwrap_or(0),
        });
    }
    (lists, dropped)
}

/// Shape accepted by `import_all`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedList {
    name: String,
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    favorite: bool,
    #[serde(default)]
    created_at: Option<u64>,
}

pub struct ListStore {
    store: Rc<dyn KvStore>,
    clock: Rc<dyn Clock>,
    key: String,
    lists: Vec<List>,
    stale: Rc<Cell<bool>>,
    subscriptions: Vec<SubscriptionId>,
    /// Raw stored value that only partly decoded, saved aside before the next write
    unreadable: Option<String>,
}

impl ListStore {
    pub fn open(store: Rc<dyn KvStore>, clock: Rc<dyn Clock>, key: &str) -> Self {
        let (stale, subscriptions) = watch_keys(store.as_ref(), &[key]);
        let mut lists = Self {
            store,
            clock,
            key: key.to_string(),
            lists: Vec::new(),
            stale,
            subscriptions,
            unreadable: None,
        };
        lists.reload();
        lists
    }

    pub fn lists(&self) -> &[List] {
        &self.lists
    }

    pub fn get(&self, index: usize) -> Option<&List> {
        self.lists.get(index)
    }

    /// Index of the list called `name`, ignoring case
    pub fn find(&self, name: &str) -> Option<usize> {
        let key = name.trim().to_lowercase();
        self.lists.iter().position(|l| l.name.to_lowercase() == key)
    }

    pub fn reload(&mut self) {
        let Some(raw) = self.store.get(&self.key) else {
            self.lists = Vec::new();
            return;
        };
        let (lists, dropped) = decode_stored(&raw, &self.key);
        if dropped {
            self.unreadable = Some(raw);
        }
        self.lists = lists;
    }

    /// Reload if another context changed the collection
    pub fn sync(&mut self) -> bool {
        if !self.stale.replace(false) {
            return false;
        }
        self.reload();
        tracing::debug!("Lists '{}' reloaded after external change", self.key);
        true
    }

    fn commit(&mut self, next: Vec<List>) -> VaultResult<()> {
        if let Some(raw) = &self.unreadable {
            let backup = unreadable_key(&self.key);
            self.store.set(&backup, raw)?;
            tracing::warn!("Kept the undecodable lists under '{}'", backup);
        }
        self.unreadable = None;
        set_json(self.store.as_ref(), &self.key, &next)?;
        self.lists = next;
        Ok(())
    }

    fn check_index(&self, index: usize) -> VaultResult<()> {
        if index < self.lists.len() {
            Ok(())
        } else {
            Err(VaultError::validation(format!("No list at position {}", index)))
        }
    }

    fn name_taken(&self, name: &str, except: Option<usize>) -> bool {
        let key = name.to_lowercase();
        self.lists
            .iter()
            .enumerate()
            .any(|(i, l)| Some(i) != except && l.name.to_lowercase() == key)
    }

    fn clean_name(name: &str) -> VaultResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VaultError::validation("List name cannot be empty"));
        }
        Ok(name.to_string())
    }

    pub fn create_list(&mut self, name: &str) -> VaultResult<usize> {
        let name = Self::clean_name(name)?;
        if self.name_taken(&name, None) {
            return Err(VaultError::DuplicateName(name));
        }
        let mut next = self.lists.clone();
        next.push(List::new(name.clone(), self.clock.now_ms()));
        self.commit(next)?;
        tracing::info!("Created list '{}'", name);
        Ok(self.lists.len() - 1)
    }

    pub fn rename_list(&mut self, index: usize, new_name: &str) -> VaultResult<()> {
        self.check_index(index)?;
        let name = Self::clean_name(new_name)?;
        if self.name_taken(&name, Some(index)) {
            return Err(VaultError::DuplicateName(name));
        }
        let mut next = self.lists.clone();
        next[index].name = name;
        self.commit(next)
    }

    pub fn delete_list(&mut self, index: usize) -> VaultResult<List> {
        self.check_index(index)?;
        let mut next = self.lists.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        tracing::info!("Deleted list '{}'", removed.name);
        Ok(removed)
    }

    /// Copy under `"<name> Copy"`, then `"<name> Copy 2"`, ... Returns the new index.
    pub fn duplicate_list(&mut self, index: usize) -> VaultResult<usize> {
        self.check_index(index)?;
        let source = &self.lists[index];

        let base = format!("{} Copy", source.name);
        let mut name = base.clone();
        let mut n = 2;
        while self.name_taken(&name, None) {
            name = format!("{} {}", base, n);
            n += 1;
        }

        let copy = List {
            name,
            items: source.items.clone(),
            favorite: false,
            created_at: self.clock.now_ms(),
        };
        let mut next = self.lists.clone();
        next.push(copy);
        self.commit(next)?;
        Ok(self.lists.len() - 1)
    }

    pub fn toggle_favorite(&mut self, index: usize) -> VaultResult<bool> {
        self.check_index(index)?;
        let mut next = self.lists.clone();
        next[index].favorite = !next[index].favorite;
        let favorite = next[index].favorite;
        self.commit(next)?;
        Ok(favorite)
    }

    pub fn clear_items(&mut self, index: usize) -> VaultResult<()> {
        self.check_index(index)?;
        let mut next = self.lists.clone();
        next[index].items.clear();
        self.commit(next)
    }

    pub fn add_item(&mut self, index: usize, item: Item) -> VaultResult<AddOutcome> {
        self.check_index(index)?;
        let key = item.title_key();
        if key.is_empty() {
            return Err(VaultError::validation("Title cannot be empty"));
        }
        if self.lists[index].contains_title(&key) {
            return Ok(AddOutcome::AlreadyPresent);
        }
        let mut next = self.lists.clone();
        next[index].items.push(item);
        self.commit(next)?;
        Ok(AddOutcome::Added)
    }

    pub fn remove_item(&mut self, list_index: usize, item_index: usize) -> VaultResult<Item> {
        self.check_index(list_index)?;
        if item_index >= self.lists[list_index].items.len() {
            return Err(VaultError::validation(format!("No item at position {}", item_index)));
        }
        let mut next = self.lists.clone();
        let removed = next[list_index].items.remove(item_index);
        self.commit(next)?;
        Ok(removed)
    }

    /// Swap with the neighbour in `direction`. Returns the item's new
    /// position; moving past either end is a no-op.
    pub fn move_item(&mut self, list_index: usize, item_index: usize, direction: Direction) -> VaultResult<usize> {
        self.check_index(list_index)?;
        let len = self.lists[list_index].items.len();
        if item_index >= len {
            return Err(VaultError::validation(format!("No item at position {}", item_index)));
        }
        let target = match direction {
            Direction::Up if item_index > 0 => item_index - 1,
            Direction::Down if item_index + 1 < len => item_index + 1,
            _ => return Ok(item_index),
        };
        let mut next = self.lists.clone();
        next[list_index].items.swap(item_index, target);
        self.commit(next)?;
        Ok(target)
    }

    /// Whole collection as pretty JSON
    pub fn export_all(&self) -> VaultResult<String> {
        Ok(serde_json::to_string_pretty(&self.lists)?)
    }

    /// Replace the whole collection with `blob`. Nothing changes unless the
    /// entire blob is valid.
    pub fn import_all(&mut self, blob: &str) -> VaultResult<usize> {
        let imported: Vec<ImportedList> = serde_json::from_str(blob)
            .map_err(|e| VaultError::validation(format!("Invalid list data: {}", e)))?;

        let now = self.clock.now_ms();
        let mut seen = HashSet::new();
        let mut next = Vec::with_capacity(imported.len());
        for list in imported {
            let name = Self::clean_name(&list.name)?;
            if !seen.insert(name.to_lowercase()) {
                return Err(VaultError::validation(format!("List '{}' appears twice", name)));
            }
            if list.items.iter().any(|item| item.title_key().is_empty()) {
                return Err(VaultError::validation(format!("List '{}' has an item without a title", name)));
            }
            next.push(List {
                name,
                items: list.items,
                favorite: list.favorite,
                created_at: list.created_at.unwrap_or(now),
            });
        }

        let count = next.len();
        self.commit(next)?;
        tracing::info!("Imported {} lists into '{}'", count, self.key);
        Ok(count)
    }

    pub fn view(&self, filter: &str, list_sort: ListSort, item_sort: ItemSort) -> Vec<List> {
        view::view(&self.lists, filter, list_sort, item_sort)
    }

    pub fn stats(&self) -> ListStats {
        view::stats(&self.lists)
    }
}

impl Drop for ListStore {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.store.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn open(store: &Rc<MemoryStore>) -> ListStore {
        ListStore::open(store.clone(), Rc::new(ManualClock::starting_at(1_000)), KEY_LISTS)
    }

    fn titles(store: &ListStore, index: usize) -> Vec<String> {
        store.lists()[index].items.iter().map(|i| i.title().to_string()).collect()
    }

    #[test]
    fn test_bad_entries_do_not_hide_the_rest() {
        let store = Rc::new(MemoryStore::new());
        let raw = json!([
            { "name": "Keep", "items": ["Heat"], "favorite": true, "createdAt": 5 },
            { "name": "Other", "items": [{ "id": 5 }, "Alien"] },
            7,
            { "items": ["Nameless"] }
        ])
        .to_string();
        store.set(KEY_LISTS, &raw).unwrap();

        let mut lists = open(&store);
        assert_eq!(lists.lists().len(), 2);
        assert_eq!(titles(&lists, 0), vec!["Heat"]);
        assert!(lists.lists()[0].favorite);
        assert_eq!(titles(&lists, 1), vec!["Alien"]);

        lists.create_list("New").unwrap();
        let stored: Vec<List> = serde_json::from_str(&store.get(KEY_LISTS).unwrap()).unwrap();
        let names: Vec<&str> = stored.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Keep", "Other", "New"]);
        // The original text is kept aside once
        assert_eq!(store.get(&unreadable_key(KEY_LISTS)), Some(raw));
    }

    #[test]
    fn test_clean_collection_writes_no_backup() {
        let store = Rc::new(MemoryStore::new());
        let mut lists = open(&store);
        lists.create_list("Weekend").unwrap();
        assert_eq!(store.get(&unreadable_key(KEY_LISTS)), None);
    }

    #[test]
    fn test_duplicate_name_is_case_insensitive() {
        let mut lists = open(&Rc::new(MemoryStore::new()));
        lists.create_list("Favorites").unwrap();
        assert!(matches!(lists.create_list("favorites"), Err(VaultError::DuplicateName(_))));
        assert!(matches!(lists.create_list("   "), Err(VaultError::Validation(_))));
        assert_eq!(lists.lists().len(), 1);
        assert!(!lists.lists()[0].favorite);
        assert_eq!(lists.lists()[0].created_at, 1_000);
    }

    #[test]
    fn test_rename_checks_other_lists_only() {
        let mut lists = open(&Rc::new(MemoryStore::new()));
        lists.create_list("Action").unwrap();
        lists.create_list("Drama").unwrap();

        lists.rename_list(0, "ACTION").unwrap();
        assert_eq!(lists.lists()[0].name, "ACTION");
        assert!(matches!(lists.rename_list(0, "drama"), Err(VaultError::DuplicateName(_))));
        assert!(matches!(lists.rename_list(0, ""), Err(VaultError::Validation(_))));
        assert!(matches!(lists.rename_list(5, "Other"), Err(VaultError::Validation(_))));
    }

    #[test]
    fn test_duplicate_list_naming() {
        let mut lists = open(&Rc::new(MemoryStore::new()));
        lists.create_list("Action").unwrap();
        lists.create_list("Action Copy").unwrap();
        lists.add_item(0, Item::plain("Heat")).unwrap();
        lists.toggle_favorite(0).unwrap();

        let copy = lists.duplicate_list(0).unwrap();
        assert_eq!(lists.lists()[copy].name, "Action Copy 2");
        assert_eq!(titles(&lists, copy), vec!["Heat"]);
        assert!(!lists.lists()[copy].favorite);

        let third = lists.duplicate_list(0).unwrap();
        assert_eq!(lists.lists()[third].name, "Action Copy 3");
    }

    #[test]
    fn test_add_item_is_idempotent() {
        let mut lists = open(&Rc::new(MemoryStore::new()));
        lists.create_list("Watch").unwrap();

        assert_eq!(lists.add_item(0, Item::plain("Inception")).unwrap(), AddOutcome::Added);
        assert_eq!(lists.add_item(0, Item::plain("Inception")).unwrap(), AddOutcome::AlreadyPresent);
        assert_eq!(lists.add_item(0, Item::plain(" inception ")).unwrap(), AddOutcome::AlreadyPresent);
        let rich: Item = serde_json::from_value(json!({ "title": "INCEPTION", "year": 2010 })).unwrap();
        assert_eq!(lists.add_item(0, rich).unwrap(), AddOutcome::AlreadyPresent);

        assert_eq!(titles(&lists, 0), vec!["Inception"]);
        assert!(matches!(lists.add_item(0, Item::plain("  ")), Err(VaultError::Validation(_))));
    }

    #[test]
    fn test_move_item_bounds() {
        let mut lists = open(&Rc::new(MemoryStore::new()));
        lists.create_list("Solo").unwrap();
        lists.add_item(0, Item::plain("Heat")).unwrap();

        assert_eq!(lists.move_item(0, 0, Direction::Up).unwrap(), 0);
        assert_eq!(lists.move_item(0, 0, Direction::Down).unwrap(), 0);
        assert_eq!(titles(&lists, 0), vec!["Heat"]);

        lists.add_item(0, Item::plain("Ronin")).unwrap();
        assert_eq!(lists.move_item(0, 1, Direction::Up).unwrap(), 0);
        assert_eq!(titles(&lists, 0), vec!["Ronin", "Heat"]);
        assert!(lists.move_item(0, 7, Direction::Up).is_err());
    }

    #[test]
    fn test_remove_clear_delete() {
        let mut lists = open(&Rc::new(MemoryStore::new()));
        lists.create_list("A").unwrap();
        lists.create_list("B").unwrap();
        for t in ["One", "Two", "Three"] {
            lists.add_item(0, Item::plain(t)).unwrap();
        }

        assert_eq!(lists.remove_item(0, 1).unwrap().title(), "Two");
        assert_eq!(titles(&lists, 0), vec!["One", "Three"]);
        assert!(lists.remove_item(0, 9).is_err());

        lists.clear_items(0).unwrap();
        assert!(lists.lists()[0].items.is_empty());
        assert_eq!(lists.lists()[0].name, "A");

        assert_eq!(lists.delete_list(0).unwrap().name, "A");
        assert_eq!(lists.lists().len(), 1);
        assert_eq!(lists.find("b"), Some(0));
    }

    #[test]
    fn test_mutations_persist() {
        let store = Rc::new(MemoryStore::new());
        {
            let mut lists = open(&store);
            lists.create_list("Kept").unwrap();
            lists.add_item(0, Item::plain("Heat")).unwrap();
        }
        let reopened = open(&store);
        assert_eq!(reopened.lists().len(), 1);
        assert_eq!(titles(&reopened, 0), vec!["Heat"]);
    }

    #[test]
    fn test_export_import_round_trip() {
        let store = Rc::new(MemoryStore::new());
        let mut lists = open(&store);
        lists.create_list("Action").unwrap();
        lists.create_list("Shows").unwrap();
        lists.add_item(0, Item::plain("Heat")).unwrap();
        let show: Item = serde_json::from_value(json!({ "name": "The Wire", "seasons": 5 })).unwrap();
        lists.add_item(1, show).unwrap();
        lists.toggle_favorite(1).unwrap();

        let blob = lists.export_all().unwrap();

        let mut other = ListStore::open(
            Rc::new(MemoryStore::new()),
            Rc::new(ManualClock::starting_at(9_999)),
            KEY_LISTS,
        );
        assert_eq!(other.import_all(&blob).unwrap(), 2);
        assert_eq!(other.lists(), lists.lists());
    }

    #[test]
    fn test_import_failure_leaves_state_untouched() {
        let mut lists = open(&Rc::new(MemoryStore::new()));
        lists.create_list("Mine").unwrap();
        let before = lists.lists().to_vec();

        for bad in [
            "not json",
            "{\"name\": \"x\"}",
            "[{\"items\": []}]",
            "[{\"name\": \"A\"}, {\"name\": \"a\"}]",
            "[{\"name\": \"A\", \"items\": [{\"year\": 1}]}]",
            "[{\"name\": \"A\", \"items\": [\"\"]}]",
            "[{\"name\": \"  \"}]",
        ] {
            assert!(matches!(lists.import_all(bad), Err(VaultError::Validation(_))), "{}", bad);
            assert_eq!(lists.lists(), &before[..]);
        }
    }

    #[test]
    fn test_import_fills_missing_fields() {
        let mut lists = open(&Rc::new(MemoryStore::new()));
        lists.import_all("[{\"name\": \"Bare\"}]").unwrap();
        let list = &lists.lists()[0];
        assert!(list.items.is_empty());
        assert!(!list.favorite);
        assert_eq!(list.created_at, 1_000);
    }

    #[test]
    fn test_sync_after_external_write() {
        let store = Rc::new(MemoryStore::new());
        let mut lists = open(&store);
        assert!(!lists.sync());

        store.external_set(KEY_LISTS, "[{\"name\":\"From elsewhere\",\"items\":[],\"favorite\":false,\"createdAt\":5}]");
        assert!(lists.sync());
        assert_eq!(lists.lists()[0].name, "From elsewhere");
    }

    #[test]
    fn test_section_collections_are_separate() {
        let store = Rc::new(MemoryStore::new());
        let mut public = open(&store);
        let mut private = ListStore::open(
            store.clone(),
            Rc::new(ManualClock::starting_at(0)),
            &section_lists_key("Adult Section"),
        );
        public.create_list("Same").unwrap();
        private.create_list("Same").unwrap();
        assert_eq!(public.lists().len(), 1);
        assert_eq!(private.lists().len(), 1);
    }
}
