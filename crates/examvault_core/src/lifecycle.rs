//! Store lifecycle: create, re-key, migrate, detect.

use crate::cipher::{self, Cipher};
use crate::error::{VaultError, VaultResult};
use crate::format::{self, Signature, StoreInfo};
use crate::key_holder::KeyHolder;
use crate::secret::Secret;
use rusqlite::{params, Connection};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Creates, re-keys and migrates encrypted stores.
///
/// Every successful operation leaves the secret it finished with in the
/// shared [`KeyHolder`], so the next unit of work does not prompt again.
#[derive(Debug, Clone)]
pub struct StoreLifecycle {
    cipher: Cipher,
    keys: Arc<KeyHolder>,
}

impl StoreLifecycle {
    /// Creates a lifecycle bound to a cipher token and a key holder.
    pub fn new(cipher: Cipher, keys: Arc<KeyHolder>) -> Self {
        Self { cipher, keys }
    }

    /// Creates a new, empty encrypted store at `path`.
    ///
    /// With `overwrite`, an existing file and its sidecars are removed first.
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AlreadyExists`] if `path` exists and `overwrite` is false
    /// - [`VaultError::InvalidSecret`] for an empty or NUL-containing secret
    ///
    /// The partially written file is removed on any failure.
    pub fn create(&self, path: &Path, secret: &Secret, overwrite: bool) -> VaultResult<StoreInfo> {
        secret.validate()?;
        claim_target(path, overwrite)?;

        let info = discard_on_error(path, self.initialize(path, secret))?;
        self.keys.set(secret.clone());
        info!(path = %path.display(), "encrypted store created");
        Ok(info)
    }

    fn initialize(&self, path: &Path, secret: &Secret) -> VaultResult<StoreInfo> {
        let conn = self.cipher.open_raw(path, false)?;
        self.cipher.apply_key(&conn, secret)?;
        format::init_meta(&conn)?;
        cipher::canary(&conn, path)?;
        let info = describe(&conn, path)?;
        close(conn)?;
        Ok(info)
    }

    /// Re-encrypts the store at `path` from `old` to `new`.
    ///
    /// The old secret is verified before anything is written; on failure the
    /// file is untouched.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AuthenticationFailed`] if `old` does not open the store
    /// - [`VaultError::StoreLocked`] if another connection holds the file
    /// - [`VaultError::PlaintextStore`] if the file is not encrypted
    pub fn rekey(&self, path: &Path, old: &Secret, new: &Secret) -> VaultResult<()> {
        old.validate()?;
        new.validate()?;
        require_encrypted(path)?;

        let conn = match self.cipher.open_keyed(path, old) {
            Ok(conn) => conn,
            Err(err) => {
                if matches!(err, VaultError::AuthenticationFailed) {
                    warn!(path = %path.display(), "re-key refused: current key rejected");
                    self.keys.clear_if_matches(old);
                }
                return Err(err);
            }
        };

        ensure_rollback_journal(&conn, path)?;
        self.cipher.rekey(&conn, new, path)?;
        // The file only accepts `new` from here on.
        self.keys.set(new.clone());
        format::stamp_meta(&conn, "rekeyed_at")?;
        close(conn)?;

        // Confirm the new key opens the rewritten file.
        close(self.cipher.open_keyed(path, new)?)?;
        info!(path = %path.display(), "store re-keyed");
        Ok(())
    }

    /// Copies a plaintext SQLite database into a new encrypted store.
    ///
    /// The source is attached read-only and never modified. A source with a
    /// pending rollback journal is refused rather than recovered.
    /// Destination collisions follow [`create`](Self::create).
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotPlaintext`] if `source` is not plaintext SQLite
    /// - [`VaultError::StoreMissing`] if `source` does not exist
    /// - [`VaultError::InvalidOperation`] if `source` and `dest` are the same
    ///   file, or `source` is not a UTF-8 path
    /// - [`VaultError::AlreadyExists`] if `dest` exists and `overwrite` is false
    pub fn migrate_from_plaintext(
        &self,
        source: &Path,
        dest: &Path,
        secret: &Secret,
        overwrite: bool,
    ) -> VaultResult<StoreInfo> {
        secret.validate()?;
        if same_file(source, dest) {
            return Err(VaultError::invalid_operation(
                "migration source and destination are the same file",
            ));
        }
        if format::inspect_signature(source)? == Signature::Opaque {
            return Err(VaultError::NotPlaintext {
                path: source.to_path_buf(),
            });
        }
        let source_uri = read_only_uri(source)?;

        claim_target(dest, overwrite)?;
        let info = discard_on_error(dest, self.export(source, &source_uri, dest, secret))?;
        self.keys.set(secret.clone());
        info!(
            source = %source.display(),
            dest = %dest.display(),
            tables = info.tables.len(),
            "plaintext store migrated"
        );
        Ok(info)
    }

    fn export(
        &self,
        source: &Path,
        source_uri: &str,
        dest: &Path,
        secret: &Secret,
    ) -> VaultResult<StoreInfo> {
        let not_plaintext = |err: rusqlite::Error| match cipher::classify(err, source) {
            VaultError::AuthenticationFailed => VaultError::NotPlaintext {
                path: source.to_path_buf(),
            },
            other => other,
        };

        let conn = self.cipher.open_keyed_uri(dest, secret)?;
        conn.execute("ATTACH DATABASE ?1 AS legacy KEY ''", params![source_uri])
            .map_err(not_plaintext)?;
        conn.query_row("SELECT count(*) FROM legacy.sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(not_plaintext)?;
        let user_version: i64 =
            conn.query_row("PRAGMA legacy.user_version", [], |row| row.get(0))?;

        conn.query_row("SELECT sqlcipher_export('main', 'legacy')", [], |_| Ok(()))
            .map_err(not_plaintext)?;
        conn.execute_batch(&format!("PRAGMA main.user_version = {user_version}"))?;
        conn.execute_batch("DETACH DATABASE legacy")?;
        debug!(dest = %dest.display(), user_version, "plaintext pages exported");

        format::init_meta(&conn)?;
        format::stamp_meta(&conn, "migrated_at")?;
        let info = describe(&conn, dest)?;
        close(conn)?;
        Ok(info)
    }
}

/// Reports whether the file at `path` looks encrypted.
///
/// Empty files and files carrying the plaintext signature are not
/// encrypted. Anything else is checked with a keyless catalog read, and any
/// failure of that read other than lock contention counts as encrypted. A
/// corrupt file is indistinguishable from an encrypted one here.
///
/// # Errors
///
/// - [`VaultError::StoreMissing`] if the file does not exist
/// - [`VaultError::StoreLocked`] if another connection holds the file
pub fn is_encrypted(path: &Path) -> VaultResult<bool> {
    match format::inspect_signature(path)? {
        Signature::Empty | Signature::Plaintext => Ok(false),
        Signature::Opaque => {
            // A leftover journal makes the read-only open attempt a rollback,
            // which fails with READONLY instead of NOTADB.
            let keyless =
                cipher::open_plain(path).and_then(|conn| cipher::canary(&conn, path));
            match keyless {
                Ok(()) => Ok(false),
                Err(err @ (VaultError::StoreLocked { .. } | VaultError::StoreMissing { .. })) => {
                    Err(err)
                }
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "keyless read failed");
                    Ok(true)
                }
            }
        }
    }
}

/// Builds a read-only `file:` URI for `path`.
fn read_only_uri(path: &Path) -> VaultResult<String> {
    let name = path
        .to_str()
        .ok_or_else(|| VaultError::invalid_operation("migration source path is not valid UTF-8"))?;
    let mut uri = String::with_capacity(name.len() + 16);
    uri.push_str("file:");
    for ch in name.chars() {
        match ch {
            '%' => uri.push_str("%25"),
            '?' => uri.push_str("%3f"),
            '#' => uri.push_str("%23"),
            _ => uri.push(ch),
        }
    }
    uri.push_str("?mode=ro");
    Ok(uri)
}

fn require_encrypted(path: &Path) -> VaultResult<()> {
    match format::inspect_signature(path)? {
        Signature::Empty => Err(VaultError::store_missing(path)),
        Signature::Plaintext => Err(VaultError::PlaintextStore {
            path: path.to_path_buf(),
        }),
        Signature::Opaque => Ok(()),
    }
}

/// Makes `path` available for a new store and claims it with an empty file.
fn claim_target(path: &Path, overwrite: bool) -> VaultResult<()> {
    if fs::symlink_metadata(path).is_ok() {
        if !overwrite {
            return Err(VaultError::already_exists(path));
        }
        format::remove_store_files(path)?;
        debug!(path = %path.display(), "existing store removed for overwrite");
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(VaultError::already_exists(path)),
        Err(e) => Err(e.into()),
    }
}

fn discard_on_error<T>(path: &Path, result: VaultResult<T>) -> VaultResult<T> {
    if result.is_err() {
        if let Err(e) = format::remove_store_files(path) {
            warn!(path = %path.display(), error = %e, "could not remove partial store");
        }
    }
    result
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// SQLCipher cannot re-key a database in WAL mode.
fn ensure_rollback_journal(conn: &Connection, path: &Path) -> VaultResult<()> {
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if mode.eq_ignore_ascii_case("wal") {
        let _: String = conn.query_row("PRAGMA journal_mode = DELETE", [], |row| row.get(0))?;
        debug!(path = %path.display(), "switched journal mode from WAL for re-key");
    }
    Ok(())
}

fn describe(conn: &Connection, path: &Path) -> VaultResult<StoreInfo> {
    Ok(StoreInfo {
        path: path.to_path_buf(),
        meta: format::read_meta(conn)?,
        tables: format::list_tables(conn)?,
    })
}

fn close(conn: Connection) -> VaultResult<()> {
    conn.close().map_err(|(_, e)| VaultError::Sqlite(e))
}
