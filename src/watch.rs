//! Background auto-lock watcher
//!
//! Runs the auto-lock check on a fixed interval so sections lock even when
//! no TUI is open, and picks up changes other processes make to the store.

use anyhow::Result;
use std::time::Duration;
use tokio::time::interval;

use crate::config::AppConfig;
use crate::vault::Vault;

/// Consecutive failed checks tolerated before giving up
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Counts failed checks in a row; one success starts the count over
#[derive(Debug, Default)]
struct FailureCount {
    errors: u32,
}

impl FailureCount {
    /// Sections that locked on success, nothing on a tolerated failure,
    /// an error once the limit is hit
    fn record(&mut self, outcome: Result<Vec<String>>) -> Result<Vec<String>> {
        match outcome {
            Ok(locked) => {
                self.errors = 0;
                Ok(locked)
            }
            Err(e) => {
                self.errors += 1;
                tracing::error!("Auto-lock check failed: {}", e);
                if self.errors >= MAX_CONSECUTIVE_ERRORS {
                    anyhow::bail!("Giving up after {} failed checks: {}", self.errors, e);
                }
                Ok(Vec::new())
            }
        }
    }
}

pub async fn start_watching() -> Result<()> {
    let config = AppConfig::load()?;
    watch(Vault::open(config)?).await
}

/// Poll until the checks fail too many times in a row
async fn watch(mut vault: Vault) -> Result<()> {
    let notifications = vault.config.notifications;
    let mut check_interval = interval(Duration::from_millis(vault.config.auto_lock_check_interval_ms));
    let mut failures = FailureCount::default();

    tracing::info!(
        "Watching {} section(s) every {}ms",
        vault.sections().len(),
        vault.config.auto_lock_check_interval_ms
    );

    loop {
        check_interval.tick().await;

        for section in failures.record(vault.poll())? {
            tracing::info!("Auto-locked '{}'", section);
            if notifications {
                crate::notify_locked(&section);
            }
        }
    }
}
