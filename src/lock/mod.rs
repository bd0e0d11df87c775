//! PIN-gated sections with session and inactivity auto-lock.
//!
//! Per section the store holds the PIN (in the shared `sectionPins` map), an
//! `unlocked` flag and the session timestamps. Timeouts are checked lazily:
//! the UI polls [`SectionLock::check_auto_lock`] on a timer.
//!
//! State per section:
//! `Locked(no PIN) -> Locked(PIN set) -> Unlocked -> Locked(PIN set)`.
//! Only an admin `reset_pin` goes back to `Locked(no PIN)`.

pub mod pin;
pub mod session;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::clock::Clock;
use crate::error::{VaultError, VaultResult};
use crate::store::{get_json, set_json, KvStore};
use pin::{is_valid_pin, pins_match};
pub use session::{AutoLockSettings, Role, Session};

pub const KEY_SECTION_PINS: &str = "sectionPins";

fn unlocked_key(section: &str) -> String {
    format!("sectionUnlocked:{}", section)
}

fn times_key(section: &str) -> String {
    format!("sectionSession:{}", section)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionTimes {
    session_start: u64,
    last_activity: u64,
}

/// Snapshot of one section for status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStatus {
    pub section: String,
    pub has_pin: bool,
    pub unlocked: bool,
    pub remaining_ms: u64,
    pub warning: bool,
}

pub struct SectionLock {
    store: Rc<dyn KvStore>,
    session: Session,
    clock: Rc<dyn Clock>,
}

impl SectionLock {
    pub fn new(store: Rc<dyn KvStore>, session: Session, clock: Rc<dyn Clock>) -> Self {
        Self { store, session, clock }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    fn pins(&self) -> BTreeMap<String, String> {
        get_json(self.store.as_ref(), KEY_SECTION_PINS).unwrap_or_default()
    }

    pub fn get_pin(&self, section: &str) -> Option<String> {
        self.pins().remove(section)
    }

    pub fn has_pin(&self, section: &str) -> bool {
        self.get_pin(section).is_some()
    }

    pub fn set_pin(&mut self, section: &str, pin: &str) -> VaultResult<()> {
        self.session.require_admin("set section PINs")?;
        if !is_valid_pin(pin) {
            return Err(VaultError::validation("PIN must be exactly 4 digits"));
        }
        let mut pins = self.pins();
        pins.insert(section.to_string(), pin.to_string());
        set_json(self.store.as_ref(), KEY_SECTION_PINS, &pins)?;
        tracing::info!("PIN set for section '{}'", section);
        Ok(())
    }

    pub fn reset_pin(&mut self, section: &str) -> VaultResult<()> {
        self.session.require_admin("reset section PINs")?;
        let mut pins = self.pins();
        pins.remove(section);
        set_json(self.store.as_ref(), KEY_SECTION_PINS, &pins)?;
        self.lock(section)?;
        self.store.remove(&times_key(section))?;
        tracing::info!("PIN reset for section '{}'", section);
        Ok(())
    }

    pub fn unlock(&mut self, section: &str, candidate: &str) -> VaultResult<()> {
        let Some(stored) = self.get_pin(section) else {
            return Err(VaultError::auth("No PIN is set for this section; ask an admin"));
        };
        if !pins_match(candidate, &stored) {
            tracing::warn!("Incorrect PIN for section '{}'", section);
            return Err(VaultError::auth("Incorrect PIN"));
        }

        let now = self.clock.now_ms();
        let live = self.is_unlocked(section)
            && (!self.session.settings().enabled || self.remaining_time(section) > 0);
        let times = match self.times(section) {
            // Unlocking a live session only counts as activity
            Some(times) if live => SessionTimes { last_activity: now, ..times },
            _ => SessionTimes { session_start: now, last_activity: now },
        };
        set_json(self.store.as_ref(), &times_key(section), &times)?;
        set_json(self.store.as_ref(), &unlocked_key(section), &true)?;
        tracing::info!("Section '{}' unlocked", section);
        Ok(())
    }

    pub fn lock(&mut self, section: &str) -> VaultResult<()> {
        set_json(self.store.as_ref(), &unlocked_key(section), &false)?;
        tracing::info!("Section '{}' locked", section);
        Ok(())
    }

    pub fn lock_all(&mut self, sections: &[String]) -> VaultResult<()> {
        for section in sections {
            if self.is_unlocked(section) {
                self.lock(section)?;
            }
        }
        Ok(())
    }

    pub fn is_unlocked(&self, section: &str) -> bool {
        get_json(self.store.as_ref(), &unlocked_key(section)).unwrap_or(false)
    }

    fn times(&self, section: &str) -> Option<SessionTimes> {
        get_json(self.store.as_ref(), &times_key(section))
    }

    /// Touch `lastActivity`; ignored while the section is locked
    pub fn record_activity(&mut self, section: &str) -> VaultResult<()> {
        if !self.is_unlocked(section) {
            return Ok(());
        }
        // Without timestamps the session counts as expired
        let Some(times) = self.times(section) else {
            return Ok(());
        };
        let times = SessionTimes { last_activity: self.clock.now_ms(), ..times };
        set_json(self.store.as_ref(), &times_key(section), &times)
    }

    /// Milliseconds until auto-lock. The session timeout caps the session even
    /// while it stays active. 0 when auto-lock is off or nothing is unlocked.
    pub fn remaining_time(&self, section: &str) -> u64 {
        let settings = self.session.settings();
        if !settings.enabled || !self.is_unlocked(section) {
            return 0;
        }
        let Some(times) = self.times(section) else {
            return 0;
        };

        let now = self.clock.now_ms();
        let session_left = settings
            .session_timeout
            .saturating_sub(now.saturating_sub(times.session_start));
        let idle_left = settings
            .inactivity_timeout
            .saturating_sub(now.saturating_sub(times.last_activity));
        session_left.min(idle_left)
    }

    /// Lock the section if its time is up. Returns whether it was locked.
    pub fn check_auto_lock(&mut self, section: &str) -> VaultResult<bool> {
        if !self.session.settings().enabled || !self.is_unlocked(section) {
            return Ok(false);
        }
        if self.remaining_time(section) > 0 {
            return Ok(false);
        }
        set_json(self.store.as_ref(), &unlocked_key(section), &false)?;
        tracing::info!("Section '{}' auto-locked", section);
        Ok(true)
    }

    /// Run the auto-lock check on every section, returning the ones that locked
    pub fn check_all(&mut self, sections: &[String]) -> VaultResult<Vec<String>> {
        let mut locked = Vec::new();
        for section in sections {
            if self.check_auto_lock(section)? {
                locked.push(section.clone());
            }
        }
        Ok(locked)
    }

    /// Inside the warning window before auto-lock
    pub fn in_warning(&self, section: &str) -> bool {
        let remaining = self.remaining_time(section);
        remaining > 0 && remaining <= self.session.settings().warning_time
    }

    pub fn status(&self, section: &str) -> SectionStatus {
        SectionStatus {
            section: section.to_string(),
            has_pin: self.has_pin(section),
            unlocked: self.is_unlocked(section),
            remaining_ms: self.remaining_time(section),
            warning: self.in_warning(section),
        }
    }

    pub fn switch_role(&mut self, candidate: Option<&str>) -> VaultResult<Role> {
        self.session.switch_role(candidate)
    }

    pub fn change_admin_pin(&mut self, current: &str, new_pin: &str) -> VaultResult<()> {
        self.session.change_admin_pin(current, new_pin)
    }

    pub fn update_auto_lock_settings(&mut self, settings: AutoLockSettings) -> VaultResult<()> {
        self.session.update_auto_lock_settings(settings)
    }
}

/// `m:ss` countdown text
pub fn format_remaining(ms: u64) -> String {
    let secs = ms.div_ceil(1000);
    format!("{}:{:02}", secs / 60, secs % 60)
}
