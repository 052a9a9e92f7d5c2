//! Backend probe when the `encryption` feature is disabled.

use crate::error::{VaultError, VaultResult};

/// Always fails: this build links plain SQLite.
pub(super) fn backend_version() -> VaultResult<Option<String>> {
    Err(VaultError::encryption_unavailable(
        "built without the `encryption` feature",
    ))
}
