//! CLI command implementations.

pub mod create;
pub mod inspect;
pub mod migrate;
pub mod query;
pub mod rekey;
pub mod status;
pub mod verify;

use examvault_core::{SecretAcquirer, TerminalAcquirer, TokenFileAcquirer, Vault, VaultConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result type shared by all commands.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Settings shared by all commands.
pub struct Context {
    config: VaultConfig,
    key_file: Option<PathBuf>,
}

impl Context {
    /// Creates a context.
    pub fn new(config: VaultConfig, key_file: Option<PathBuf>) -> Self {
        Self { config, key_file }
    }

    /// Returns the store path.
    pub fn path(&self) -> &Path {
        self.config.store_path()
    }

    /// Returns the configured secret source.
    pub fn acquirer(&self) -> Arc<dyn SecretAcquirer> {
        acquirer_for(self.key_file.as_deref())
    }

    /// Opens a vault for the configured store.
    pub fn vault(&self) -> Result<Vault, Box<dyn std::error::Error>> {
        Ok(Vault::new(self.config.clone(), self.acquirer())?)
    }
}

/// Returns a key-file source for `key_file`, or the terminal prompt.
pub fn acquirer_for(key_file: Option<&Path>) -> Arc<dyn SecretAcquirer> {
    match key_file {
        Some(path) => Arc::new(TokenFileAcquirer::new(path)),
        None => Arc::new(TerminalAcquirer::new()),
    }
}

/// Formats a Unix timestamp for display.
pub fn format_timestamp(secs: Option<u64>) -> String {
    match secs {
        Some(secs) => format!("{secs} (unix)"),
        None => "-".to_string(),
    }
}
