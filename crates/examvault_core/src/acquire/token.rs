//! Key file source.

use super::{Acquired, PromptRequest, SecretAcquirer};
use crate::error::{VaultError, VaultResult};
use crate::secret::Secret;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

/// Reads the secret from the first line of a key file.
///
/// Stands in for a hardware token: the file typically lives on removable
/// media that is only mounted while the operator is present. A confirmed
/// request reads the file once, since both entries would be identical.
#[derive(Debug, Clone)]
pub struct TokenFileAcquirer {
    path: PathBuf,
}

impl TokenFileAcquirer {
    /// Creates a source reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the key file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretAcquirer for TokenFileAcquirer {
    fn acquire(&self, _request: &PromptRequest) -> VaultResult<Acquired> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => Zeroizing::new(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(VaultError::secret_source(format!(
                    "key file not found: {}",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(VaultError::secret_source(format!(
                    "cannot read key file {}: {}",
                    self.path.display(),
                    e.kind()
                )));
            }
        };

        let line = contents.lines().next().unwrap_or_default();
        if line.is_empty() {
            return Err(VaultError::secret_source(format!(
                "key file is empty: {}",
                self.path.display()
            )));
        }

        debug!(path = %self.path.display(), "secret read from key file");
        Ok(Acquired::Secret(Secret::new(line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_first_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.key");
        fs::write(&path, "alpha-9!\r\nignored\n").unwrap();

        let acquired = TokenFileAcquirer::new(&path)
            .acquire(&PromptRequest::unlock("Unlock"))
            .unwrap();
        assert_eq!(acquired.into_secret().unwrap().expose(), "alpha-9!");
    }

    #[test]
    fn missing_file_is_source_error() {
        let dir = tempdir().unwrap();
        let result = TokenFileAcquirer::new(dir.path().join("absent.key"))
            .acquire(&PromptRequest::unlock("Unlock"));
        assert!(matches!(result, Err(VaultError::SecretSource { .. })));
    }

    #[test]
    fn empty_file_is_source_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.key");
        fs::write(&path, "\n").unwrap();

        let result = TokenFileAcquirer::new(&path).acquire(&PromptRequest::confirm("New"));
        assert!(matches!(result, Err(VaultError::SecretSource { .. })));
    }
}
