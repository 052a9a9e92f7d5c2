//! Test fixtures and store helpers.
//!
//! Provides temporary store locations, scripted vaults and legacy plaintext
//! databases for the common test scenarios.

use examvault_core::rusqlite::{params, Connection};
use examvault_core::{ScriptedAcquirer, Secret, Vault, VaultConfig, VaultResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Passphrase used by the documented scenarios.
pub const SCENARIO_SECRET: &str = "alpha-9!";

/// A passphrase that never opens a scenario store.
pub const WRONG_SECRET: &str = "wrong";

/// Patient name written into fixture rows.
pub const PATIENT_NAME: &str = "Jane Doe";

/// Schema used for patient fixtures.
pub const PATIENT_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS patients (id INTEGER PRIMARY KEY, name TEXT NOT NULL)";

/// A store location inside a temporary directory.
///
/// The store file itself is not created; use [`TempStore::create`] or one of
/// the lifecycle operations.
pub struct TempStore {
    path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TempStore {
    /// Creates a fresh location named `exam.db`.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            path: temp_dir.path().join("exam.db"),
            _temp_dir: temp_dir,
        }
    }

    /// Returns the store path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns another path in the same directory.
    pub fn sibling(&self, name: &str) -> PathBuf {
        self._temp_dir.path().join(name)
    }

    /// Returns a configuration for this store.
    pub fn config(&self) -> VaultConfig {
        VaultConfig::new(&self.path)
    }

    /// Opens a vault answering prompts from `entries`.
    pub fn vault<I, S>(&self, entries: I) -> (Vault, Arc<ScriptedAcquirer>)
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<Secret>,
    {
        let acquirer = Arc::new(ScriptedAcquirer::new(entries));
        (self.vault_with(Arc::clone(&acquirer)), acquirer)
    }

    /// Opens a vault using `acquirer`.
    pub fn vault_with(&self, acquirer: Arc<ScriptedAcquirer>) -> Vault {
        Vault::new(self.config(), acquirer).expect("Failed to open vault")
    }

    /// Creates the store under `secret` and returns an unlocked vault whose
    /// script is empty.
    pub fn create(&self, secret: &str) -> Vault {
        let vault = self.vault_with(Arc::new(ScriptedAcquirer::empty()));
        vault
            .create(&Secret::new(secret), false)
            .expect("Failed to create store");
        vault
    }

    /// Returns the raw bytes of the store file.
    pub fn raw_bytes(&self) -> Vec<u8> {
        read_raw(&self.path)
    }

    /// Returns true if the store file or any sidecar contains `needle`.
    pub fn raw_contains(&self, needle: &str) -> bool {
        std::iter::once(self.path.clone())
            .chain(examvault_core::sidecar_paths(&self.path))
            .filter(|p| p.exists())
            .any(|p| contains_bytes(&read_raw(&p), needle.as_bytes()))
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a temporary store location.
///
/// # Example
///
/// ```rust,ignore
/// use examvault_testkit::with_temp_store;
///
/// #[test]
/// fn my_test() {
///     with_temp_store(|store| {
///         let vault = store.create("alpha-9!");
///         // ... test operations
///     });
/// }
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&TempStore) -> R,
{
    let store = TempStore::new();
    f(&store)
}

/// Reads a whole file.
pub fn read_raw(path: &Path) -> Vec<u8> {
    std::fs::read(path).expect("Failed to read file")
}

/// Returns true if `needle` occurs anywhere in `haystack`.
pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Builds a plaintext SQLite database like the ones written before
/// encryption was introduced.
pub struct LegacyStore {
    patients: Vec<String>,
    user_version: i64,
}

impl LegacyStore {
    /// Starts an empty legacy database.
    pub fn new() -> Self {
        Self {
            patients: Vec::new(),
            user_version: 0,
        }
    }

    /// Adds a patient row. Ids are assigned from 1.
    pub fn patient(mut self, name: impl Into<String>) -> Self {
        self.patients.push(name.into());
        self
    }

    /// Sets `PRAGMA user_version`.
    pub fn user_version(mut self, version: i64) -> Self {
        self.user_version = version;
        self
    }

    /// Writes the database to `path`.
    pub fn write(self, path: &Path) {
        let conn = Connection::open(path).expect("Failed to open legacy database");
        conn.execute_batch(PATIENT_SCHEMA)
            .expect("Failed to create legacy schema");
        for (i, name) in self.patients.iter().enumerate() {
            conn.execute(
                "INSERT INTO patients (id, name) VALUES (?1, ?2)",
                params![i as i64 + 1, name],
            )
            .expect("Failed to insert legacy row");
        }
        conn.execute_batch(&format!("PRAGMA user_version = {}", self.user_version))
            .expect("Failed to set user_version");
    }
}

impl Default for LegacyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Inserts a patient through the vault and returns its id.
pub fn insert_patient(vault: &Vault, name: &str) -> i64 {
    vault
        .with_unit_of_work(|conn| {
            conn.execute_batch(PATIENT_SCHEMA)?;
            conn.execute("INSERT INTO patients (name) VALUES (?1)", params![name])?;
            Ok(conn.last_insert_rowid())
        })
        .expect("Failed to insert patient")
}

/// Reads all patients, ordered by id.
pub fn read_patients(vault: &Vault) -> VaultResult<Vec<(i64, String)>> {
    vault.with_unit_of_work(|conn| read_patient_rows(conn))
}

/// Reads all patients from an open connection, ordered by id.
pub fn read_patient_rows(conn: &Connection) -> VaultResult<Vec<(i64, String)>> {
    let mut stmt = conn.prepare("SELECT id, name FROM patients ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_bytes_finds_substrings() {
        assert!(contains_bytes(b"xxJane Doexx", b"Jane Doe"));
        assert!(!contains_bytes(b"Jane Do", b"Jane Doe"));
        assert!(!contains_bytes(b"anything", b""));
    }

    #[test]
    fn legacy_store_is_plaintext() {
        let store = TempStore::new();
        let legacy = store.sibling("legacy.db");
        LegacyStore::new()
            .patient(PATIENT_NAME)
            .user_version(3)
            .write(&legacy);

        assert!(contains_bytes(&read_raw(&legacy), PATIENT_NAME.as_bytes()));
        assert!(read_raw(&legacy).starts_with(examvault_core::PLAINTEXT_SIGNATURE));
    }

    #[test]
    fn temp_store_does_not_create_file() {
        with_temp_store(|store| {
            assert!(!store.path().exists());
            assert_eq!(store.path().file_name().unwrap(), "exam.db");
        });
    }
}
