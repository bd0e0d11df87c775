use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::lock::pin::is_valid_pin;
use crate::lock::session::DEFAULT_ADMIN_PIN;
use crate::lock::AutoLockSettings;

/// Auto-lock values seeded into the store on first run (human units)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoLockDefaults {
    pub enabled: bool,
    pub inactivity_minutes: u64,
    pub session_minutes: u64,
    pub warning_seconds: u64,
}

impl Default for AutoLockDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            inactivity_minutes: 5,
            session_minutes: 30,
            warning_seconds: 60,
        }
    }
}

impl AutoLockDefaults {
    /// Convert to store units. A bad field falls back on its own; the rest are kept.
    pub fn to_settings(&self) -> AutoLockSettings {
        let base = AutoLockSettings::default();
        let minutes = |value: u64, fallback: u64, name: &str| {
            if value == 0 {
                tracing::warn!("auto_lock.{} must be greater than zero, using the default", name);
                fallback
            } else {
                value.saturating_mul(60_000)
            }
        };

        let inactivity_timeout = minutes(self.inactivity_minutes, base.inactivity_timeout, "inactivity_minutes");
        let session_timeout = minutes(self.session_minutes, base.session_timeout, "session_minutes");
        let mut warning_time = self.warning_seconds.saturating_mul(1_000);
        if warning_time >= inactivity_timeout {
            tracing::warn!(
                "auto_lock.warning_seconds is not shorter than the inactivity timeout, using half of it"
            );
            warning_time = inactivity_timeout / 2;
        }

        AutoLockSettings {
            enabled: self.enabled,
            inactivity_timeout,
            session_timeout,
            warning_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the store and log live (defaults to the platform data dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Admin PIN used until an admin changes it
    pub default_admin_pin: String,

    /// Sections that can be PIN-locked
    pub protected_sections: Vec<String>,

    pub auto_lock: AutoLockDefaults,

    /// How often the countdown display refreshes
    pub countdown_interval_ms: u64,

    /// How often the auto-lock check runs
    pub auto_lock_check_interval_ms: u64,

    /// Desktop notification when a section auto-locks
    pub notifications: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            default_admin_pin: DEFAULT_ADMIN_PIN.to_string(),
            protected_sections: vec!["Adult Section".to_string()],
            auto_lock: AutoLockDefaults::default(),
            countdown_interval_ms: 1_000,
            auto_lock_check_interval_ms: 5_000,
            notifications: true,
        }
    }
}

impl AppConfig {
    /// Get the config file path
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("cinevault");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        let path = match Self::config_path() {
            Ok(p) => p,
            Err(_) => return Ok(AppConfig::default()),
        };

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => return Ok(config.cleaned()),
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
        }

        let config = AppConfig::default();
        let _ = config.save();
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(&self.clone().cleaned())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Drop blank or duplicate section names and fix out-of-range values
    fn cleaned(mut self) -> Self {
        let mut seen = std::collections::HashSet::new();
        self.protected_sections = self
            .protected_sections
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && !s.contains('\x1b'))
            .filter(|s| seen.insert(s.to_lowercase()))
            .collect();

        if !is_valid_pin(&self.default_admin_pin) {
            tracing::warn!("default_admin_pin must be 4 digits, using {}", DEFAULT_ADMIN_PIN);
            self.default_admin_pin = DEFAULT_ADMIN_PIN.to_string();
        }

        self.countdown_interval_ms = self.countdown_interval_ms.max(100);
        self.auto_lock_check_interval_ms = self.auto_lock_check_interval_ms.max(100);
        self
    }

    /// Directory holding `store.json` and the log file
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::data_dir()
                .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?
                .join("cinevault")),
        }
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("store.json"))
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("cinevault.log"))
    }
}
