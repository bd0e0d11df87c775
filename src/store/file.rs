use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{ChangeCallback, KvStore, Subscribers, SubscriptionId};
use crate::error::VaultResult;

type Entries = BTreeMap<String, String>;

/// Key-value store persisted as one JSON object on disk.
///
/// Every write first adopts whatever is on disk, then changes its one key
/// and rewrites the file (temp file + rename), so a write never replays stale
/// values of other keys. Other processes' writes are also picked up by
/// [`KvStore::poll_external`], which compares modification times and diffs
/// the entries; last write wins per key.
pub struct FileStore {
    path: PathBuf,
    entries: RefCell<Entries>,
    last_modified: Cell<Option<SystemTime>>,
    /// External changes merged during a write, not yet reported by a poll
    pending: RefCell<Vec<String>>,
    subscribers: Subscribers,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> VaultResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            Self::read_entries(&path)?
        } else {
            Entries::new()
        };

        tracing::debug!("Opened store {} ({} keys)", path.display(), entries.len());

        Ok(Self {
            last_modified: Cell::new(Self::modified(&path)),
            path,
            entries: RefCell::new(entries),
            pending: RefCell::new(Vec::new()),
            subscribers: Subscribers::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified(path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn read_entries(path: &Path) -> VaultResult<Entries> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Entries::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn persist(&self) -> VaultResult<()> {
        let content = serde_json::to_string_pretty(&*self.entries.borrow())?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        self.last_modified.set(Self::modified(&self.path));
        Ok(())
    }

    /// Replace the in-memory entries with the file's, returning the keys that differ
    fn reload_from_disk(&self) -> VaultResult<Vec<String>> {
        let on_disk = if self.path.exists() {
            Self::read_entries(&self.path)?
        } else {
            Entries::new()
        };

        let changed: Vec<String> = {
            let current = self.entries.borrow();
            let mut keys: Vec<String> = on_disk
                .iter()
                .filter(|(k, v)| current.get(*k) != Some(*v))
                .map(|(k, _)| k.clone())
                .collect();
            keys.extend(current.keys().filter(|k| !on_disk.contains_key(*k)).cloned());
            keys
        };

        *self.entries.borrow_mut() = on_disk;
        self.last_modified.set(Self::modified(&self.path));
        Ok(changed)
    }

    /// Adopt external writes, notify their subscribers and queue them for the next poll
    fn merge_external(&self) -> VaultResult<()> {
        let changed = self.reload_from_disk()?;
        if changed.is_empty() {
            return Ok(());
        }
        tracing::debug!("External store change: {:?}", changed);
        for key in &changed {
            self.subscribers.notify(key);
        }
        self.pending.borrow_mut().extend(changed);
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> VaultResult<()> {
        self.merge_external()?;
        let previous = self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist() {
            // Keep memory and disk in agreement
            let mut entries = self.entries.borrow_mut();
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> VaultResult<()> {
        self.merge_external()?;
        let previous = self.entries.borrow_mut().remove(key);
        if previous.is_none() {
            return Ok(());
        }
        if let Err(e) = self.persist() {
            if let Some(old) = previous {
                self.entries.borrow_mut().insert(key.to_string(), old);
            }
            return Err(e);
        }
        Ok(())
    }

    fn subscribe(&self, key: &str, callback: ChangeCallback) -> SubscriptionId {
        self.subscribers.add(key, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(id);
    }

    fn poll_external(&self) -> VaultResult<Vec<String>> {
        if Self::modified(&self.path) != self.last_modified.get() {
            self.merge_external()?;
        }
        let mut changed = self.pending.take();
        changed.sort();
        changed.dedup();
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::open(&path).unwrap();
        store.set("userRole", "\"admin\"").unwrap();
        store.set("adminPin", "\"4321\"").unwrap();
        store.remove("adminPin").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("userRole").as_deref(), Some("\"admin\""));
        assert_eq!(reopened.get("adminPin"), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(FileStore::open(&path).is_err());
    }

    #[test]
    fn test_poll_external_reports_changes_from_other_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let ours = FileStore::open(&path).unwrap();
        ours.set("keep", "1").unwrap();
        ours.set("drop", "1").unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        ours.subscribe("sectionPins", Rc::new(move |k| sink.borrow_mut().push(k.to_string())));

        // Another process writes the same file
        std::thread::sleep(std::time::Duration::from_millis(20));
        let theirs = FileStore::open(&path).unwrap();
        theirs.set("sectionPins", "{\"Adult Section\":\"1234\"}").unwrap();
        theirs.remove("drop").unwrap();
        // Make sure the timestamp differs even on coarse filesystems
        ours.last_modified.set(None);

        let mut changed = ours.poll_external().unwrap();
        changed.sort();
        assert_eq!(changed, vec!["drop".to_string(), "sectionPins".to_string()]);
        assert_eq!(*seen.borrow(), vec!["sectionPins".to_string()]);
        assert_eq!(ours.get("drop"), None);
        assert_eq!(ours.get("keep").as_deref(), Some("1"));

        // Nothing new on the second poll
        assert!(ours.poll_external().unwrap().is_empty());
    }

    #[test]
    fn test_write_keeps_other_handles_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let tui = FileStore::open(&path).unwrap();
        tui.set("sectionUnlocked:Adult Section", "true").unwrap();

        let stale = Rc::new(Cell::new(false));
        let flag = stale.clone();
        tui.subscribe("sectionUnlocked:Adult Section", Rc::new(move |_| flag.set(true)));

        // `--lock-all` from another process
        let cli = FileStore::open(&path).unwrap();
        cli.set("sectionUnlocked:Adult Section", "false").unwrap();

        // An unrelated edit must not resurrect the old flag
        tui.set("customLists", "[]").unwrap();
        assert!(stale.get());
        assert_eq!(tui.get("sectionUnlocked:Adult Section").as_deref(), Some("false"));

        let on_disk = FileStore::open(&path).unwrap();
        assert_eq!(on_disk.get("sectionUnlocked:Adult Section").as_deref(), Some("false"));
        assert_eq!(on_disk.get("customLists").as_deref(), Some("[]"));

        // The merged change is still reported once
        assert_eq!(tui.poll_external().unwrap(), vec!["sectionUnlocked:Adult Section".to_string()]);
        assert!(tui.poll_external().unwrap().is_empty());
    }

    #[test]
    fn test_remove_keeps_other_handles_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let ours = FileStore::open(&path).unwrap();
        ours.set("adminPin", "\"4321\"").unwrap();

        let theirs = FileStore::open(&path).unwrap();
        theirs.set("userRole", "\"admin\"").unwrap();

        ours.remove("adminPin").unwrap();
        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("userRole").as_deref(), Some("\"admin\""));
        assert_eq!(reopened.get("adminPin"), None);
    }
}
