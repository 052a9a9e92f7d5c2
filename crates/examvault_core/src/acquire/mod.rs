//! Secret acquisition.
//!
//! A [`SecretAcquirer`] obtains a [`Secret`] when the key holder is empty. The
//! gateway depends only on the trait, so the presentation technology is
//! interchangeable:
//!
//! - [`TerminalAcquirer`] - masked terminal prompt
//! - [`TokenFileAcquirer`] - first line of a key file on removable media
//! - [`ScriptedAcquirer`] - queued answers for tests
//!
//! Cancellation is a value ([`Acquired::Cancelled`]), not an error, so callers
//! can tell "operator declined" apart from an I/O failure.

mod scripted;
mod terminal;
mod token;

pub use scripted::ScriptedAcquirer;
pub use terminal::TerminalAcquirer;
pub use token::TokenFileAcquirer;

use crate::error::{VaultError, VaultResult};
use crate::secret::Secret;
use std::time::Duration;

/// How many times the operator is asked for the secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Ask once, to unlock an existing store.
    Unlock,
    /// Ask twice and require both entries to match, for new secrets.
    Confirm,
}

/// A request for a secret.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PromptRequest {
    /// Text shown to the operator.
    pub message: String,
    /// Single entry or confirmed entry.
    pub mode: PromptMode,
    /// Advisory upper bound on how long to wait for the operator.
    ///
    /// Sources that cannot honour it ignore it.
    pub timeout: Option<Duration>,
}

impl PromptRequest {
    /// Creates a single-entry request.
    pub fn unlock(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            mode: PromptMode::Unlock,
            timeout: None,
        }
    }

    /// Creates a confirmed-entry request.
    pub fn confirm(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            mode: PromptMode::Confirm,
            timeout: None,
        }
    }

    /// Sets the advisory timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of an acquisition attempt.
#[derive(Debug)]
pub enum Acquired {
    /// The operator supplied a secret.
    Secret(Secret),
    /// The operator declined.
    Cancelled,
}

impl Acquired {
    /// Returns true for [`Acquired::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Converts into a secret, mapping cancellation to
    /// [`VaultError::AcquisitionCancelled`].
    ///
    /// # Errors
    ///
    /// Returns `AcquisitionCancelled` if the operator declined.
    pub fn into_secret(self) -> VaultResult<Secret> {
        match self {
            Self::Secret(secret) => Ok(secret),
            Self::Cancelled => Err(VaultError::AcquisitionCancelled),
        }
    }
}

/// A source of secrets.
///
/// Implementations block the calling thread until a secret is obtained or
/// the operator cancels. They must never echo or log the secret.
pub trait SecretAcquirer: Send + Sync {
    /// Obtains a secret for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ConfirmationMismatch`] if a confirmed entry
    /// differs, or an error if the source itself fails.
    fn acquire(&self, request: &PromptRequest) -> VaultResult<Acquired>;
}

/// Runs the second half of a confirmed prompt.
///
/// `first` is the outcome of the first entry and `second` reads the
/// confirmation. Cancelling either entry cancels the whole request.
pub(crate) fn confirm_entries<F>(first: Acquired, second: F) -> VaultResult<Acquired>
where
    F: FnOnce() -> VaultResult<Acquired>,
{
    let Acquired::Secret(first) = first else {
        return Ok(Acquired::Cancelled);
    };
    let Acquired::Secret(second) = second()? else {
        return Ok(Acquired::Cancelled);
    };
    if first.matches(&second) {
        Ok(Acquired::Secret(first))
    } else {
        Err(VaultError::ConfirmationMismatch)
    }
}
