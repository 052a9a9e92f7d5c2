//! Error types for examvault core.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur while acquiring secrets or touching an encrypted store.
///
/// No variant ever carries the secret itself. Errors raised by SQLite while a
/// secret is part of the statement text are reported as [`VaultError::Keying`]
/// without the engine's message.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The encryption backend is not available on this host.
    #[error("encryption backend unavailable: {reason}")]
    EncryptionUnavailable {
        /// Why the capability check failed.
        reason: String,
    },

    /// The key was applied but the canary read failed.
    ///
    /// A wrong key and a corrupted or foreign file are
    /// reported identically.
    #[error("authentication failed: wrong key or unreadable store")]
    AuthenticationFailed,

    /// The create or migrate target already exists and overwrite was not requested.
    #[error("store already exists: {}", path.display())]
    AlreadyExists {
        /// The colliding path.
        path: PathBuf,
    },

    /// The operator declined to provide a secret.
    #[error("secret acquisition cancelled")]
    AcquisitionCancelled,

    /// The store file is held by another handle or process.
    #[error("store locked: another connection holds {}", path.display())]
    StoreLocked {
        /// The locked store.
        path: PathBuf,
    },

    /// No store exists at the path (or the file is empty).
    #[error("no store at {}", path.display())]
    StoreMissing {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The gateway was pointed at an unencrypted SQLite file.
    #[error("store is not encrypted: {} (migrate it first)", path.display())]
    PlaintextStore {
        /// The plaintext file.
        path: PathBuf,
    },

    /// A migration source is not a readable plaintext store.
    #[error("migration source is not a plaintext store: {}", path.display())]
    NotPlaintext {
        /// The rejected source.
        path: PathBuf,
    },

    /// The two entries of a confirmation prompt differ.
    #[error("passphrase confirmation does not match")]
    ConfirmationMismatch,

    /// The secret cannot be used as a key.
    #[error("invalid secret: {reason}")]
    InvalidSecret {
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A non-interactive secret source could not produce a secret.
    #[error("secret source unavailable: {message}")]
    SecretSource {
        /// Description of the failure.
        message: String,
    },

    /// SQLite rejected a statement carrying key material.
    #[error("key statement rejected by the storage engine")]
    Keying,

    /// Operation not permitted with these arguments.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Store metadata is missing or of an unsupported version.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VaultError {
    /// Creates an encryption unavailable error.
    pub fn encryption_unavailable(reason: impl Into<String>) -> Self {
        Self::EncryptionUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(path: &Path) -> Self {
        Self::AlreadyExists {
            path: path.to_path_buf(),
        }
    }

    /// Creates a store locked error.
    pub fn store_locked(path: &Path) -> Self {
        Self::StoreLocked {
            path: path.to_path_buf(),
        }
    }

    /// Creates a store missing error.
    pub fn store_missing(path: &Path) -> Self {
        Self::StoreMissing {
            path: path.to_path_buf(),
        }
    }

    /// Creates a secret source error.
    pub fn secret_source(message: impl Into<String>) -> Self {
        Self::SecretSource {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true if the caller can recover, for example by prompting again
    /// or retrying later.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::EncryptionUnavailable { .. }
                | Self::Keying
                | Self::InvalidFormat { .. }
                | Self::Sqlite(_)
                | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(VaultError::AuthenticationFailed.is_recoverable());
        assert!(VaultError::AcquisitionCancelled.is_recoverable());
        assert!(VaultError::store_locked(Path::new("exam.db")).is_recoverable());
        assert!(VaultError::already_exists(Path::new("exam.db")).is_recoverable());
        assert!(!VaultError::encryption_unavailable("missing").is_recoverable());
        assert!(!VaultError::Keying.is_recoverable());
    }

    #[test]
    fn authentication_failure_does_not_name_the_file() {
        let message = VaultError::AuthenticationFailed.to_string();
        assert_eq!(message, "authentication failed: wrong key or unreadable store");
    }

    #[test]
    fn path_errors_render_the_path() {
        let err = VaultError::already_exists(Path::new("/data/exam.db"));
        assert!(err.to_string().contains("/data/exam.db"));
    }
}
