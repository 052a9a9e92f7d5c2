//! # ExamVault Core
//!
//! Passphrase-gated access to an encrypted SQLite store of medical exam
//! records.
//!
//! This crate provides:
//! - `Cipher` capability check for the SQLCipher backend (fail-closed)
//! - `KeyHolder` session cache for the secret, with optional idle auto-lock
//! - `SecretAcquirer` sources: terminal prompt, key file, scripted
//! - `Gateway` yielding verified, scoped `rusqlite` connections
//! - `StoreLifecycle` for create, re-key, plaintext migration and detection
//! - `Vault` facade tying these together
//!
//! The store is never opened without a key. There is no plaintext mode.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod acquire;
mod cipher;
mod config;
mod error;
mod format;
mod gateway;
mod key_holder;
mod lifecycle;
mod secret;
mod vault;

pub use acquire::{
    Acquired, PromptMode, PromptRequest, ScriptedAcquirer, SecretAcquirer, TerminalAcquirer,
    TokenFileAcquirer,
};
pub use cipher::{Cipher, CANARY_SQL};
pub use config::{VaultConfig, DEFAULT_STORE_FILE};
pub use error::{VaultError, VaultResult};
pub use format::{
    inspect_signature, sidecar_paths, Signature, StoreInfo, StoreMeta, FORMAT_VERSION,
    META_TABLE, PLAINTEXT_SIGNATURE,
};
pub use gateway::{Gateway, IntegrityReport, UnitOfWork};
pub use key_holder::KeyHolder;
pub use lifecycle::{is_encrypted, StoreLifecycle};
pub use secret::Secret;
pub use vault::Vault;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-exported so callers use the same `rusqlite` the store was opened with.
pub use rusqlite;
