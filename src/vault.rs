//! Wires the file store, session, section lock and list stores together

use anyhow::{Context, Result};
use std::rc::Rc;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::lists::{section_lists_key, ListStore, KEY_LISTS};
use crate::lock::{SectionLock, Session};
use crate::store::{FileStore, KvStore};

pub struct Vault {
    pub config: AppConfig,
    pub store: Rc<FileStore>,
    pub lock: SectionLock,
    /// The open library
    pub library: ListStore,
    /// One collection per protected section, same order as the config
    pub section_lists: Vec<ListStore>,
}

impl Vault {
    pub fn open(config: AppConfig) -> Result<Self> {
        let path = config.store_path()?;
        let store = Rc::new(
            FileStore::open(&path).with_context(|| format!("Failed to open store {}", path.display()))?,
        );
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let shared: Rc<dyn KvStore> = store.clone();

        let session = Session::new(
            shared.clone(),
            config.auto_lock.to_settings(),
            &config.default_admin_pin,
        )?;
        let lock = SectionLock::new(shared.clone(), session, clock.clone());
        let library = ListStore::open(shared.clone(), clock.clone(), KEY_LISTS);
        let section_lists = config
            .protected_sections
            .iter()
            .map(|s| ListStore::open(shared.clone(), clock.clone(), &section_lists_key(s)))
            .collect();

        tracing::info!("Vault opened at {}", store.path().display());

        Ok(Self {
            config,
            store,
            lock,
            library,
            section_lists,
        })
    }

    pub fn sections(&self) -> &[String] {
        &self.config.protected_sections
    }

    /// Pick up external changes, then run the auto-lock check on every
    /// section. Returns the sections that just locked.
    pub fn poll(&mut self) -> Result<Vec<String>> {
        let changed = self.store.poll_external()?;
        if !changed.is_empty() {
            self.lock.session_mut().sync();
            self.library.sync();
            for lists in &mut self.section_lists {
                lists.sync();
            }
        }
        let sections = self.config.protected_sections.clone();
        Ok(self.lock.check_all(&sections)?)
    }

    /// Count any interaction as activity in every unlocked section
    pub fn record_activity(&mut self) -> Result<()> {
        let sections = self.config.protected_sections.clone();
        for section in &sections {
            self.lock.record_activity(section)?;
        }
        Ok(())
    }
}
