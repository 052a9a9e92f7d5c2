//! Vault configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default store file name.
pub const DEFAULT_STORE_FILE: &str = "navmed_radiation_exam.db";

/// Configuration for a [`Vault`](crate::Vault).
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Path of the encrypted store file.
    pub store_path: PathBuf,

    /// Whether to enable `PRAGMA foreign_keys` on every unit of work.
    pub foreign_keys: bool,

    /// Prompt shown when unlocking an existing store.
    pub unlock_prompt: String,

    /// Prompt shown when choosing a secret for a new store.
    pub create_prompt: String,

    /// Lock the cached secret after this much inactivity (`None` = never).
    pub idle_timeout: Option<Duration>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            foreign_keys: true,
            unlock_prompt: "Passphrase to unlock medical records".to_string(),
            create_prompt: "New passphrase for medical records".to_string(),
            idle_timeout: None,
        }
    }
}

impl VaultConfig {
    /// Creates a configuration for the store at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: path.into(),
            ..Self::default()
        }
    }

    /// Returns the store path.
    #[must_use]
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Sets whether foreign keys are enforced.
    #[must_use]
    pub fn foreign_keys(mut self, value: bool) -> Self {
        self.foreign_keys = value;
        self
    }

    /// Sets the unlock prompt.
    #[must_use]
    pub fn unlock_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.unlock_prompt = prompt.into();
        self
    }

    /// Sets the create prompt.
    #[must_use]
    pub fn create_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.create_prompt = prompt.into();
        self
    }

    /// Sets the idle auto-lock timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = VaultConfig::default();
        assert_eq!(config.store_path(), Path::new(DEFAULT_STORE_FILE));
        assert!(config.foreign_keys);
        assert!(config.idle_timeout.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = VaultConfig::new("/data/exam.db")
            .foreign_keys(false)
            .unlock_prompt("Unlock")
            .idle_timeout(Duration::from_secs(900));

        assert_eq!(config.store_path(), Path::new("/data/exam.db"));
        assert!(!config.foreign_keys);
        assert_eq!(config.unlock_prompt, "Unlock");
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(900)));
    }
}
