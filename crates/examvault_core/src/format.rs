//! On-disk layout of an encrypted store.
//!
//! A store is a single SQLCipher 4 file:
//!
//! ```text
//! <store>.db
//! ├─ bytes 0..16   random KDF salt (a plaintext SQLite file has its signature here)
//! └─ pages         AES-256-CBC ciphertext + HMAC-SHA512 per page
//! <store>.db-journal / -wal / -shm   transient sidecars
//! ```
//!
//! Every store created or migrated by this crate also carries a `vault_meta`
//! table recording the format version and lifecycle timestamps.

use crate::error::{VaultError, VaultResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Signature at offset 0 of every plaintext SQLite database.
pub const PLAINTEXT_SIGNATURE: &[u8; 16] = b"SQLite format 3\0";

/// Current metadata format version.
pub const FORMAT_VERSION: u32 = 1;

/// Name of the metadata table.
pub const META_TABLE: &str = "vault_meta";

/// Sidecar suffixes SQLite may leave next to a store.
const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

const CREATE_META_SQL: &str =
    "CREATE TABLE IF NOT EXISTS vault_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)";

/// What the first bytes of a file say about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// Zero-length file.
    Empty,
    /// Starts with the plaintext SQLite signature.
    Plaintext,
    /// Anything else: an encrypted store, or a corrupt or foreign file.
    Opaque,
}

/// Reads the signature of the file at `path`.
///
/// # Errors
///
/// Returns [`VaultError::StoreMissing`] if the file does not exist.
pub fn inspect_signature(path: &Path) -> VaultResult<Signature> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(VaultError::store_missing(path));
        }
        Err(e) => return Err(e.into()),
    };

    let mut header = [0u8; PLAINTEXT_SIGNATURE.len()];
    let mut filled = 0;
    while filled < header.len() {
        match file.read(&mut header[filled..])? {
            0 => break,
            n => filled += n,
        }
    }

    Ok(match filled {
        0 => Signature::Empty,
        n if n == header.len() && &header == PLAINTEXT_SIGNATURE => Signature::Plaintext,
        _ => Signature::Opaque,
    })
}

/// Returns the sidecar paths SQLite may create next to `path`.
#[must_use]
pub fn sidecar_paths(path: &Path) -> Vec<PathBuf> {
    SIDECAR_SUFFIXES
        .iter()
        .map(|suffix| {
            let mut name = path.as_os_str().to_os_string();
            name.push(suffix);
            PathBuf::from(name)
        })
        .collect()
}

/// Removes a store file and its sidecars. Missing files are ignored.
pub(crate) fn remove_store_files(path: &Path) -> io::Result<()> {
    for candidate in std::iter::once(path.to_path_buf()).chain(sidecar_paths(path)) {
        match fs::remove_file(&candidate) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Metadata recorded in the `vault_meta` table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreMeta {
    /// Metadata format version.
    pub format_version: u32,
    /// Creation time, Unix seconds.
    pub created_at: Option<u64>,
    /// Time of migration from a plaintext store, Unix seconds.
    pub migrated_at: Option<u64>,
    /// Time of the last re-key, Unix seconds.
    pub rekeyed_at: Option<u64>,
}

/// Describes an unlocked store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    /// Path of the store file.
    pub path: PathBuf,
    /// Metadata, if the store carries a `vault_meta` table.
    pub meta: Option<StoreMeta>,
    /// Names of user tables, sorted.
    pub tables: Vec<String>,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Creates the metadata table and records `created_at` if absent.
pub(crate) fn init_meta(conn: &Connection) -> VaultResult<()> {
    conn.execute(CREATE_META_SQL, [])?;
    conn.execute(
        "INSERT OR REPLACE INTO vault_meta (key, value) VALUES ('format_version', ?1)",
        params![FORMAT_VERSION.to_string()],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO vault_meta (key, value) VALUES ('created_at', ?1)",
        params![unix_now().to_string()],
    )?;
    Ok(())
}

/// Records a lifecycle timestamp such as `rekeyed_at`.
pub(crate) fn stamp_meta(conn: &Connection, key: &str) -> VaultResult<()> {
    conn.execute(CREATE_META_SQL, [])?;
    conn.execute(
        "INSERT OR REPLACE INTO vault_meta (key, value) VALUES (?1, ?2)",
        params![key, unix_now().to_string()],
    )?;
    Ok(())
}

/// Reads the metadata table, if present.
///
/// # Errors
///
/// Returns [`VaultError::InvalidFormat`] if the recorded version is not
/// understood.
pub(crate) fn read_meta(conn: &Connection) -> VaultResult<Option<StoreMeta>> {
    let exists: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![META_TABLE],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Ok(None);
    }

    let mut meta = StoreMeta::default();
    let mut stmt = conn.prepare("SELECT key, value FROM vault_meta")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (key, value) = row?;
        match key.as_str() {
            "format_version" => {
                meta.format_version = value.parse().map_err(|_| {
                    VaultError::invalid_format(format!("unreadable format_version: {value}"))
                })?;
            }
            "created_at" => meta.created_at = value.parse().ok(),
            "migrated_at" => meta.migrated_at = value.parse().ok(),
            "rekeyed_at" => meta.rekeyed_at = value.parse().ok(),
            _ => {}
        }
    }

    if meta.format_version == 0 || meta.format_version > FORMAT_VERSION {
        return Err(VaultError::invalid_format(format!(
            "unsupported format version {} (this build reads up to {FORMAT_VERSION})",
            meta.format_version
        )));
    }
    Ok(Some(meta))
}

/// Lists user tables, excluding SQLite internals and the metadata table.
pub(crate) fn list_tables(conn: &Connection) -> VaultResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != ?1 \
         ORDER BY name",
    )?;
    let names = stmt
        .query_map(params![META_TABLE], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn signature_of_missing_file() {
        let dir = tempdir().unwrap();
        let result = inspect_signature(&dir.path().join("absent.db"));
        assert!(matches!(result, Err(VaultError::StoreMissing { .. })));
    }

    #[test]
    fn signature_of_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.db");
        fs::write(&path, b"").unwrap();
        assert_eq!(inspect_signature(&path).unwrap(), Signature::Empty);
    }

    #[test]
    fn signature_of_plaintext_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        drop(conn);
        assert_eq!(inspect_signature(&path).unwrap(), Signature::Plaintext);
    }

    #[test]
    fn signature_of_short_or_foreign_file() {
        let dir = tempdir().unwrap();
        let short = dir.path().join("short.db");
        fs::write(&short, b"SQLite").unwrap();
        assert_eq!(inspect_signature(&short).unwrap(), Signature::Opaque);

        let foreign = dir.path().join("foreign.db");
        fs::write(&foreign, [0xA5u8; 64]).unwrap();
        assert_eq!(inspect_signature(&foreign).unwrap(), Signature::Opaque);
    }

    #[test]
    fn sidecars_append_suffixes() {
        let paths = sidecar_paths(Path::new("/data/exam.db"));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/data/exam.db-journal"),
                PathBuf::from("/data/exam.db-wal"),
                PathBuf::from("/data/exam.db-shm"),
            ]
        );
    }

    #[test]
    fn remove_store_files_ignores_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exam.db");
        fs::write(&path, b"x").unwrap();
        fs::write(dir.path().join("exam.db-journal"), b"j").unwrap();

        remove_store_files(&path).unwrap();
        assert!(!path.exists());
        assert!(!dir.path().join("exam.db-journal").exists());
        remove_store_files(&path).unwrap();
    }

    #[test]
    fn meta_roundtrip_in_memory() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(read_meta(&conn).unwrap().is_none());

        init_meta(&conn).unwrap();
        stamp_meta(&conn, "rekeyed_at").unwrap();
        let meta = read_meta(&conn).unwrap().unwrap();
        assert_eq!(meta.format_version, FORMAT_VERSION);
        assert!(meta.created_at.is_some());
        assert!(meta.rekeyed_at.is_some());
        assert!(meta.migrated_at.is_none());
    }

    #[test]
    fn future_format_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        init_meta(&conn).unwrap();
        conn.execute(
            "UPDATE vault_meta SET value = '99' WHERE key = 'format_version'",
            [],
        )
        .unwrap();
        assert!(matches!(read_meta(&conn), Err(VaultError::InvalidFormat { .. })));
    }

    #[test]
    fn list_tables_hides_metadata() {
        let conn = Connection::open_in_memory().unwrap();
        init_meta(&conn).unwrap();
        conn.execute_batch("CREATE TABLE patients (id INTEGER); CREATE TABLE exams (id INTEGER);")
            .unwrap();
        assert_eq!(list_tables(&conn).unwrap(), vec!["exams", "patients"]);
    }
}
