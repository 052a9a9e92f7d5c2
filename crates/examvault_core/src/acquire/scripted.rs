//! Scripted acquirer for tests and non-interactive callers.

use super::{confirm_entries, Acquired, PromptMode, PromptRequest, SecretAcquirer};
use crate::error::{VaultError, VaultResult};
use crate::secret::Secret;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Answers prompts from a queue of scripted entries.
///
/// Each entry is `Some(passphrase)` or `None` for "operator cancelled". A
/// confirmed request consumes two entries. Running out of entries is an
/// error, which makes unexpected prompts visible in tests.
#[derive(Debug, Default)]
pub struct ScriptedAcquirer {
    entries: Mutex<VecDeque<Option<Secret>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAcquirer {
    /// Creates an acquirer answering with `entries` in order.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<Secret>,
    {
        Self {
            entries: Mutex::new(entries.into_iter().map(|e| e.map(Into::into)).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Creates an acquirer that fails on any prompt.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates an acquirer that always cancels, once.
    #[must_use]
    pub fn cancelling() -> Self {
        Self::new([None::<Secret>])
    }

    /// Appends an entry.
    pub fn push(&self, entry: Option<Secret>) {
        self.entries.lock().push_back(entry);
    }

    /// Returns how many entries have been read.
    #[must_use]
    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Returns the prompt texts shown so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Returns how many entries are left.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.entries.lock().len()
    }

    fn next_entry(&self, message: &str) -> VaultResult<Acquired> {
        self.prompts.lock().push(message.to_string());
        match self.entries.lock().pop_front() {
            Some(Some(secret)) => Ok(Acquired::Secret(secret)),
            Some(None) => Ok(Acquired::Cancelled),
            None => Err(VaultError::secret_source("scripted acquirer has no entries left")),
        }
    }
}

impl SecretAcquirer for ScriptedAcquirer {
    fn acquire(&self, request: &PromptRequest) -> VaultResult<Acquired> {
        let first = self.next_entry(&request.message)?;
        match request.mode {
            PromptMode::Unlock => Ok(first),
            PromptMode::Confirm => confirm_entries(first, || self.next_entry(&request.message)),
        }
    }
}
