//! Encryption backend capability and keying.
//!
//! The backend is SQLCipher, linked through rusqlite when the `encryption`
//! feature is enabled. [`Cipher::detect`] is the one-time capability check: it
//! either returns a [`Cipher`] token, which is required to construct a gateway
//! or a lifecycle, or fails with [`VaultError::EncryptionUnavailable`]. There
//! is no fallback to plain SQLite.
//!
//! ## Keying
//!
//! - The secret is passed as a quoted literal in `PRAGMA key`; the statement
//!   text is zeroized after use
//! - SQLCipher derives the page key with PBKDF2-HMAC-SHA512 and the per-file salt
//! - A canary read of `sqlite_master` forces decryption of page 1; a wrong
//!   key surfaces there as `SQLITE_NOTADB`

#[cfg(feature = "encryption")]
mod probe;
#[cfg(feature = "encryption")]
use probe::backend_version;

#[cfg(not(feature = "encryption"))]
mod stub;
#[cfg(not(feature = "encryption"))]
use stub::backend_version;

use crate::error::{VaultError, VaultResult};
use crate::secret::Secret;
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

/// Query issued after keying to verify the key.
pub const CANARY_SQL: &str = "SELECT count(*) FROM sqlite_master";

/// Proof that a working encryption backend is linked.
#[derive(Debug, Clone)]
pub struct Cipher {
    version: String,
}

impl Cipher {
    /// Checks that the linked SQLite carries the SQLCipher codec.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::EncryptionUnavailable`] if the crate was built
    /// without the `encryption` feature or the linked library is plain SQLite.
    pub fn detect() -> VaultResult<Self> {
        let cipher = Self::from_probe(backend_version()?)?;
        debug!(version = %cipher.version, "encryption backend detected");
        Ok(cipher)
    }

    /// Interprets the result of `PRAGMA cipher_version`.
    pub(crate) fn from_probe(version: Option<String>) -> VaultResult<Self> {
        match version {
            Some(version) if !version.trim().is_empty() => Ok(Self { version }),
            _ => Err(VaultError::encryption_unavailable(
                "linked SQLite library does not provide the SQLCipher codec",
            )),
        }
    }

    /// Returns the SQLCipher version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Opens a raw handle. No key is applied yet.
    pub(crate) fn open_raw(&self, path: &Path, create: bool) -> VaultResult<Connection> {
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if create {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        open_with_flags(path, flags)
    }

    /// Applies `secret` as the decryption key. Must precede any other statement.
    pub(crate) fn apply_key(&self, conn: &Connection, secret: &Secret) -> VaultResult<()> {
        secret.validate()?;
        run_key_statement(conn, "PRAGMA key = ", secret).map_err(|_| VaultError::Keying)
    }

    /// Re-encrypts every page under `secret`. The connection must already be
    /// keyed and verified.
    pub(crate) fn rekey(&self, conn: &Connection, secret: &Secret, path: &Path) -> VaultResult<()> {
        secret.validate()?;
        run_key_statement(conn, "PRAGMA rekey = ", secret).map_err(|e| {
            match e.sqlite_error_code() {
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                    VaultError::store_locked(path)
                }
                _ => VaultError::Keying,
            }
        })
    }

    /// Opens an existing store, applies the key and runs the canary read.
    pub(crate) fn open_keyed(&self, path: &Path, secret: &Secret) -> VaultResult<Connection> {
        let conn = self.open_raw(path, false)?;
        self.apply_key(&conn, secret)?;
        canary(&conn, path)?;
        Ok(conn)
    }

    /// Like [`open_keyed`](Self::open_keyed), but with URI filenames enabled
    /// so another database can be attached by `file:` URI.
    pub(crate) fn open_keyed_uri(&self, path: &Path, secret: &Secret) -> VaultResult<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = open_with_flags(path, flags)?;
        self.apply_key(&conn, secret)?;
        canary(&conn, path)?;
        Ok(conn)
    }
}

fn run_key_statement(conn: &Connection, prefix: &str, secret: &Secret) -> rusqlite::Result<()> {
    let literal = secret.sql_literal();
    let mut statement = Zeroizing::new(String::with_capacity(prefix.len() + literal.len()));
    statement.push_str(prefix);
    statement.push_str(&literal);
    // SQLCipher versions differ on whether keying pragmas return a row.
    conn.query_row(statement.as_str(), [], |_| Ok(()))
        .optional()
        .map(|_| ())
}

/// Opens a handle with `flags` and a zero busy timeout.
///
/// Lock contention is reported immediately as [`VaultError::StoreLocked`]
/// rather than retried.
pub(crate) fn open_with_flags(path: &Path, flags: OpenFlags) -> VaultResult<Connection> {
    let conn = Connection::open_with_flags(path, flags).map_err(|e| classify(e, path))?;
    conn.busy_timeout(Duration::ZERO)?;
    Ok(conn)
}

/// Opens a read-only handle without any key, for plaintext inspection.
pub(crate) fn open_plain(path: &Path) -> VaultResult<Connection> {
    open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

/// Forces decryption of page 1 by reading the schema catalog.
pub(crate) fn canary(conn: &Connection, path: &Path) -> VaultResult<()> {
    conn.query_row(CANARY_SQL, [], |row| row.get::<_, i64>(0))
        .map(|_| ())
        .map_err(|e| classify(e, path))
}

/// Maps engine errors raised while opening or verifying a store.
pub(crate) fn classify(err: rusqlite::Error, path: &Path) -> VaultError {
    match err.sqlite_error_code() {
        Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) => {
            VaultError::AuthenticationFailed
        }
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => VaultError::store_locked(path),
        Some(ErrorCode::CannotOpen) => VaultError::store_missing(path),
        _ => VaultError::Sqlite(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_codec_is_unavailable() {
        assert!(matches!(
            Cipher::from_probe(None),
            Err(VaultError::EncryptionUnavailable { .. })
        ));
        assert!(matches!(
            Cipher::from_probe(Some("  ".into())),
            Err(VaultError::EncryptionUnavailable { .. })
        ));
    }

    #[test]
    fn probe_version_is_kept() {
        let cipher = Cipher::from_probe(Some("4.6.0 community".into())).unwrap();
        assert_eq!(cipher.version(), "4.6.0 community");
    }

    #[test]
    fn classify_maps_codes() {
        let path = Path::new("exam.db");
        let notadb = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_NOTADB),
            Some("file is not a database".into()),
        );
        assert!(matches!(classify(notadb, path), VaultError::AuthenticationFailed));

        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(classify(busy, path), VaultError::StoreLocked { .. }));

        let other = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(classify(other, path), VaultError::Sqlite(_)));
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn detect_finds_sqlcipher() {
        let cipher = Cipher::detect().unwrap();
        assert!(!cipher.version().is_empty());
    }

    #[cfg(not(feature = "encryption"))]
    #[test]
    fn detect_fails_without_feature() {
        assert!(matches!(
            Cipher::detect(),
            Err(VaultError::EncryptionUnavailable { .. })
        ));
    }
}
