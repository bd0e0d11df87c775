//! Role, admin PIN and auto-lock settings shared by every section.
//!
//! The presentation layer builds one `Session` and hands it to the
//! `SectionLock`; nothing reaches for these values through a global.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;

use super::pin::{is_valid_pin, pins_match};
use crate::error::{VaultError, VaultResult};
use crate::store::{get_json, set_json, watch_keys, KvStore, SubscriptionId};

pub const KEY_ROLE: &str = "userRole";
pub const KEY_ADMIN_PIN: &str = "adminPin";
pub const KEY_AUTO_LOCK: &str = "autoLockSettings";

/// Admin PIN used until one is stored
pub const DEFAULT_ADMIN_PIN: &str = "0000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// All durations in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoLockSettings {
    pub enabled: bool,
    pub inactivity_timeout: u64,
    pub session_timeout: u64,
    pub warning_time: u64,
}

impl Default for AutoLockSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            inactivity_timeout: 5 * 60_000,
            session_timeout: 30 * 60_000,
            warning_time: 60_000,
        }
    }
}

impl AutoLockSettings {
    pub fn validate(&self) -> VaultResult<()> {
        if self.inactivity_timeout == 0 || self.session_timeout == 0 {
            return Err(VaultError::validation("Timeouts must be greater than zero"));
        }
        if self.warning_time >= self.inactivity_timeout {
            return Err(VaultError::validation(
                "Warning time must be shorter than the inactivity timeout",
            ));
        }
        Ok(())
    }
}

pub struct Session {
    store: Rc<dyn KvStore>,
    role: Role,
    settings: AutoLockSettings,
    default_admin_pin: String,
    stale: Rc<Cell<bool>>,
    subscriptions: Vec<SubscriptionId>,
}

impl Session {
    /// Load role and settings from the store. `initial_settings` is written
    /// when the store has none yet.
    pub fn new(
        store: Rc<dyn KvStore>,
        initial_settings: AutoLockSettings,
        default_admin_pin: &str,
    ) -> VaultResult<Self> {
        let role = get_json(store.as_ref(), KEY_ROLE).unwrap_or_default();
        let settings = match get_json(store.as_ref(), KEY_AUTO_LOCK) {
            Some(settings) => settings,
            None => {
                set_json(store.as_ref(), KEY_AUTO_LOCK, &initial_settings)?;
                initial_settings
            }
        };

        let default_admin_pin = if is_valid_pin(default_admin_pin) {
            default_admin_pin.to_string()
        } else {
            tracing::warn!("Configured default admin PIN is not 4 digits, using built-in default");
            DEFAULT_ADMIN_PIN.to_string()
        };

        let (stale, subscriptions) = watch_keys(store.as_ref(), &[KEY_ROLE, KEY_AUTO_LOCK]);

        Ok(Self {
            store,
            role,
            settings,
            default_admin_pin,
            stale,
            subscriptions,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn settings(&self) -> AutoLockSettings {
        self.settings
    }

    /// Re-read role and settings if another context changed them
    pub fn sync(&mut self) -> bool {
        if !self.stale.replace(false) {
            return false;
        }
        self.role = get_json(self.store.as_ref(), KEY_ROLE).unwrap_or_default();
        if let Some(settings) = get_json(self.store.as_ref(), KEY_AUTO_LOCK) {
            self.settings = settings;
        }
        tracing::debug!("Session resynced: role={}", self.role.label());
        true
    }

    pub fn require_admin(&self, action: &str) -> VaultResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(VaultError::denied(format!("only an admin can {}", action)))
        }
    }

    fn admin_pin(&self) -> String {
        get_json(self.store.as_ref(), KEY_ADMIN_PIN).unwrap_or_else(|| self.default_admin_pin.clone())
    }

    pub fn verify_admin_pin(&self, candidate: &str) -> bool {
        pins_match(candidate, &self.admin_pin())
    }

    /// `Some(pin)` elevates to admin if the PIN matches; `None` drops to user
    pub fn switch_role(&mut self, candidate: Option<&str>) -> VaultResult<Role> {
        let role = match candidate {
            Some(pin) if self.verify_admin_pin(pin) => Role::Admin,
            Some(_) => {
                tracing::warn!("Rejected admin PIN");
                return Err(VaultError::auth("Incorrect admin PIN"));
            }
            None => Role::User,
        };
        set_json(self.store.as_ref(), KEY_ROLE, &role)?;
        self.role = role;
        tracing::info!("Role switched to {}", role.label());
        Ok(role)
    }

    pub fn change_admin_pin(&mut self, current: &str, new_pin: &str) -> VaultResult<()> {
        self.require_admin("change the admin PIN")?;
        if !self.verify_admin_pin(current) {
            tracing::warn!("Admin PIN change rejected: current PIN mismatch");
            return Err(VaultError::auth("Current admin PIN is incorrect"));
        }
        if !is_valid_pin(new_pin) {
            return Err(VaultError::validation("New PIN must be exactly 4 digits"));
        }
        if new_pin == current {
            return Err(VaultError::validation("New PIN must differ from the current PIN"));
        }
        set_json(self.store.as_ref(), KEY_ADMIN_PIN, new_pin)?;
        tracing::info!("Admin PIN changed");
        Ok(())
    }

    pub fn update_auto_lock_settings(&mut self, settings: AutoLockSettings) -> VaultResult<()> {
        self.require_admin("change auto-lock settings")?;
        settings.validate()?;
        set_json(self.store.as_ref(), KEY_AUTO_LOCK, &settings)?;
        self.settings = settings;
        tracing::info!(
            "Auto-lock settings updated: enabled={} inactivity={}ms session={}ms",
            settings.enabled,
            settings.inactivity_timeout,
            settings.session_timeout
        );
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.store.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn session_with(store: &Rc<MemoryStore>) -> Session {
        Session::new(store.clone(), AutoLockSettings::default(), DEFAULT_ADMIN_PIN).unwrap()
    }

    #[test]
    fn test_initial_settings_are_persisted() {
        let store = Rc::new(MemoryStore::new());
        let _session = session_with(&store);
        let stored: AutoLockSettings = get_json(store.as_ref(), KEY_AUTO_LOCK).unwrap();
        assert_eq!(stored, AutoLockSettings::default());
    }

    #[test]
    fn test_switch_role() {
        let store = Rc::new(MemoryStore::new());
        let mut session = session_with(&store);
        assert_eq!(session.role(), Role::User);

        assert!(matches!(session.switch_role(Some("9999")), Err(VaultError::Authentication(_))));
        assert_eq!(session.role(), Role::User);

        assert_eq!(session.switch_role(Some("0000")).unwrap(), Role::Admin);
        assert!(session.is_admin());

        assert_eq!(session.switch_role(None).unwrap(), Role::User);
    }

    #[test]
    fn test_change_admin_pin_rules() {
        let store = Rc::new(MemoryStore::new());
        let mut session = session_with(&store);

        // Knowing the PIN is not enough while in user mode
        assert!(matches!(session.change_admin_pin("0000", "2468"), Err(VaultError::PermissionDenied(_))));
        assert!(session.verify_admin_pin("0000"));

        session.switch_role(Some("0000")).unwrap();
        assert!(matches!(session.change_admin_pin("1111", "2222"), Err(VaultError::Authentication(_))));
        assert!(matches!(session.change_admin_pin("0000", "22a2"), Err(VaultError::Validation(_))));
        assert!(matches!(session.change_admin_pin("0000", "0000"), Err(VaultError::Validation(_))));

        session.change_admin_pin("0000", "2468").unwrap();
        assert!(!session.verify_admin_pin("0000"));
        assert!(session.verify_admin_pin("2468"));
    }

    #[test]
    fn test_settings_update_requires_admin() {
        let store = Rc::new(MemoryStore::new());
        let mut session = session_with(&store);
        let mut settings = session.settings();
        settings.enabled = false;

        // Valid input still refused for a user
        assert!(matches!(
            session.update_auto_lock_settings(settings),
            Err(VaultError::PermissionDenied(_))
        ));

        session.switch_role(Some("0000")).unwrap();
        session.update_auto_lock_settings(settings).unwrap();
        assert!(!session.settings().enabled);

        let bad = AutoLockSettings { warning_time: settings.inactivity_timeout, ..settings };
        assert!(matches!(session.update_auto_lock_settings(bad), Err(VaultError::Validation(_))));
    }

    #[test]
    fn test_sync_picks_up_external_role_change() {
        let store = Rc::new(MemoryStore::new());
        let mut session = session_with(&store);

        assert!(!session.sync());
        store.external_set(KEY_ROLE, "\"admin\"");
        assert!(session.sync());
        assert!(session.is_admin());
    }

    #[test]
    fn test_invalid_configured_default_pin_falls_back() {
        let store = Rc::new(MemoryStore::new());
        let session = Session::new(store.clone(), AutoLockSettings::default(), "12").unwrap();
        assert!(session.verify_admin_pin(DEFAULT_ADMIN_PIN));
    }
}
