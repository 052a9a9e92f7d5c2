//! The operator-supplied secret.

use crate::error::{VaultError, VaultResult};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// A passphrase that unlocks an encrypted store.
///
/// The value is zeroized when dropped. `Debug` is redacted and there is no
/// `Display` or `Serialize` implementation.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    value: String,
}

impl Secret {
    /// Wraps a passphrase.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Returns the passphrase.
    ///
    /// # Security
    ///
    /// Don't log or persist the result.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Returns the length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Returns true if the passphrase is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Checks that the secret can be used as a store key.
    ///
    /// An empty SQLCipher key disables encryption entirely, and SQL string
    /// literals cannot carry NUL, so both are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidSecret`] describing the problem.
    pub fn validate(&self) -> VaultResult<()> {
        if self.value.is_empty() {
            return Err(VaultError::InvalidSecret {
                reason: "passphrase must not be empty",
            });
        }
        if self.value.contains('\0') {
            return Err(VaultError::InvalidSecret {
                reason: "passphrase must not contain NUL characters",
            });
        }
        Ok(())
    }

    /// Renders the secret as a quoted SQL string literal.
    pub(crate) fn sql_literal(&self) -> Zeroizing<String> {
        let mut literal = Zeroizing::new(String::with_capacity(self.value.len() + 2));
        literal.push('\'');
        for ch in self.value.chars() {
            if ch == '\'' {
                literal.push('\'');
            }
            literal.push(ch);
        }
        literal.push('\'');
        literal
    }

    /// Compares two secrets without short-circuiting on the first differing byte.
    pub(crate) fn matches(&self, other: &Secret) -> bool {
        let a = self.value.as_bytes();
        let b = other.value.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
