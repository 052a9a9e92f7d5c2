//! Runtime probe of the linked SQLCipher build.

use crate::error::VaultResult;
use rusqlite::{Connection, OptionalExtension};

/// Returns the SQLCipher version, or `None` if the linked SQLite has no codec.
///
/// Plain SQLite ignores unknown pragmas and returns no row.
pub(super) fn backend_version() -> VaultResult<Option<String>> {
    let conn = Connection::open_in_memory()?;
    let version = conn
        .query_row("PRAGMA cipher_version", [], |row| row.get::<_, String>(0))
        .optional()?;
    Ok(version)
}
