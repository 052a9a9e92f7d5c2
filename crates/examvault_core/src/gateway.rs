//! Encrypted store gateway.
//!
//! The [`Gateway`] is the only way to obtain a working connection to the
//! store. Every [`UnitOfWork`] it yields has had the key applied and verified
//! by a canary read, and is closed when it goes out of scope.
//!
//! ```rust,ignore
//! use examvault_core::{Vault, VaultConfig, TerminalAcquirer};
//! use std::sync::Arc;
//!
//! let vault = Vault::new(VaultConfig::new("exam.db"), Arc::new(TerminalAcquirer::new()))?;
//! let count: i64 = vault.gateway().with_unit_of_work(|conn| {
//!     Ok(conn.query_row("SELECT count(*) FROM examinations", [], |r| r.get(0))?)
//! })?;
//! ```

use crate::acquire::{Acquired, PromptRequest, SecretAcquirer};
use crate::cipher::{canary, Cipher};
use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::format::{self, Signature, StoreInfo};
use crate::key_holder::KeyHolder;
use crate::secret::Secret;
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opens verified connections to one encrypted store.
pub struct Gateway {
    path: PathBuf,
    cipher: Cipher,
    keys: Arc<KeyHolder>,
    acquirer: Arc<dyn SecretAcquirer>,
    foreign_keys: bool,
    unlock_prompt: String,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("path", &self.path)
            .field("cipher", &self.cipher)
            .field("unlocked", &self.keys.has_secret())
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Creates a gateway for the store named in `config`.
    ///
    /// Requires a [`Cipher`] token, so a gateway cannot exist on a host
    /// without the encryption backend.
    pub fn new(
        cipher: Cipher,
        config: &VaultConfig,
        keys: Arc<KeyHolder>,
        acquirer: Arc<dyn SecretAcquirer>,
    ) -> Self {
        Self {
            path: config.store_path.clone(),
            cipher,
            keys,
            acquirer,
            foreign_keys: config.foreign_keys,
            unlock_prompt: config.unlock_prompt.clone(),
        }
    }

    /// Returns the store path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the shared key holder.
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyHolder> {
        &self.keys
    }

    /// Opens a verified connection scoped to one unit of work.
    ///
    /// Uses the cached secret if there is one, otherwise asks the acquirer
    /// and caches the answer once it has been verified.
    ///
    /// # Errors
    ///
    /// - [`VaultError::StoreMissing`] if there is no (non-empty) store file
    /// - [`VaultError::PlaintextStore`] if the file is unencrypted SQLite
    /// - [`VaultError::AcquisitionCancelled`] if the operator declined
    /// - [`VaultError::AuthenticationFailed`] if the key does not decrypt the
    ///   store; the failing secret is removed from the key holder
    /// - [`VaultError::StoreLocked`] if another connection holds the file
    pub fn open_unit_of_work(&self) -> VaultResult<UnitOfWork<'_>> {
        self.check_store_file()?;
        let (secret, acquired) = self.resolve_secret()?;

        let conn = self.cipher.open_raw(&self.path, false)?;
        self.cipher.apply_key(&conn, &secret)?;
        if let Err(err) = canary(&conn, &self.path) {
            drop(conn);
            if matches!(err, VaultError::AuthenticationFailed) {
                warn!(path = %self.path.display(), "store rejected the key");
                self.keys.clear_if_matches(&secret);
            }
            return Err(err);
        }

        if self.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON")?;
        }

        if acquired {
            self.keys.set(secret);
        } else {
            self.keys.touch();
        }

        debug!(path = %self.path.display(), "unit of work opened");
        Ok(UnitOfWork {
            conn: Some(conn),
            path: &self.path,
        })
    }

    /// Runs `f` inside a unit of work and closes the connection afterwards.
    ///
    /// An error from `f` takes precedence over an error from closing.
    ///
    /// # Errors
    ///
    /// Returns any error from [`open_unit_of_work`](Self::open_unit_of_work),
    /// from `f`, or from closing the connection.
    pub fn with_unit_of_work<T, F>(&self, f: F) -> VaultResult<T>
    where
        F: FnOnce(&mut Connection) -> VaultResult<T>,
    {
        let mut unit = self.open_unit_of_work()?;
        let result = f(&mut unit);
        let closed = unit.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Verifies page authentication codes and B-tree structure.
    ///
    /// # Errors
    ///
    /// Returns any error from opening the store or running the checks.
    pub fn verify_integrity(&self) -> VaultResult<IntegrityReport> {
        self.with_unit_of_work(|conn| {
            let cipher_errors = collect_strings(conn, "PRAGMA cipher_integrity_check")?;
            let sqlite_messages = collect_strings(conn, "PRAGMA integrity_check")?;
            Ok(IntegrityReport {
                cipher_errors,
                sqlite_messages,
            })
        })
    }

    /// Returns metadata and table names of the store.
    ///
    /// # Errors
    ///
    /// Returns any error from opening the store, or
    /// [`VaultError::InvalidFormat`] for an unsupported metadata version.
    pub fn describe(&self) -> VaultResult<StoreInfo> {
        self.with_unit_of_work(|conn| {
            Ok(StoreInfo {
                path: self.path.clone(),
                meta: format::read_meta(conn)?,
                tables: format::list_tables(conn)?,
            })
        })
    }

    fn check_store_file(&self) -> VaultResult<()> {
        match format::inspect_signature(&self.path)? {
            Signature::Empty => Err(VaultError::store_missing(&self.path)),
            Signature::Plaintext => Err(VaultError::PlaintextStore {
                path: self.path.clone(),
            }),
            Signature::Opaque => Ok(()),
        }
    }

    /// Returns the secret to use and whether it was freshly acquired.
    fn resolve_secret(&self) -> VaultResult<(Secret, bool)> {
        if self.keys.expire_idle() {
            info!(path = %self.path.display(), "cached secret locked after inactivity");
        }
        if let Some(secret) = self.keys.get() {
            return Ok((secret, false));
        }

        match self.acquirer.acquire(&PromptRequest::unlock(self.unlock_prompt.clone()))? {
            Acquired::Secret(secret) => Ok((secret, true)),
            Acquired::Cancelled => {
                debug!(path = %self.path.display(), "unlock cancelled by operator");
                Err(VaultError::AcquisitionCancelled)
            }
        }
    }
}

fn collect_strings(conn: &Connection, sql: &str) -> VaultResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Result of [`Gateway::verify_integrity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Pages whose HMAC did not verify, as reported by SQLCipher.
    pub cipher_errors: Vec<String>,
    /// Output of `PRAGMA integrity_check` (`["ok"]` when healthy).
    pub sqlite_messages: Vec<String>,
}

impl IntegrityReport {
    /// Returns true if both checks passed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.cipher_errors.is_empty() && self.sqlite_messages == ["ok"]
    }
}

/// A verified connection, exclusively owned by the scope that opened it.
///
/// Dereferences to [`rusqlite::Connection`]. The connection is closed on
/// drop, including during unwinding; use [`UnitOfWork::close`] to observe
/// close errors.
pub struct UnitOfWork<'g> {
    conn: Option<Connection>,
    path: &'g Path,
}

impl UnitOfWork<'_> {
    /// Returns the store path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns the engine error if SQLite could not close cleanly.
    pub fn close(mut self) -> VaultResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| VaultError::Sqlite(e))?;
            debug!(path = %self.path.display(), "unit of work closed");
        }
        Ok(())
    }
}

impl Deref for UnitOfWork<'_> {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        match self.conn {
            Some(ref conn) => conn,
            None => unreachable!("connection is only taken by close()"),
        }
    }
}

impl DerefMut for UnitOfWork<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.conn {
            Some(ref mut conn) => conn,
            None => unreachable!("connection is only taken by close()"),
        }
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.close() {
                Ok(()) => debug!(path = %self.path.display(), "unit of work closed"),
                Err((_, e)) => {
                    warn!(path = %self.path.display(), error = %e, "closing unit of work failed");
                }
            }
        }
    }
}

impl std::fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("path", &self.path)
            .field("open", &self.conn.is_some())
            .finish()
    }
}
