//! Masked terminal prompt.

use super::{confirm_entries, Acquired, PromptMode, PromptRequest, SecretAcquirer};
use crate::error::{VaultError, VaultResult};
use crate::secret::Secret;
use std::io;
use tracing::debug;

const DEFAULT_CONFIRM_MESSAGE: &str = "Confirm passphrase";

/// Reads the secret from the controlling terminal with echo disabled.
///
/// Submitting an empty line, closing input (Ctrl-D) or an interrupted read
/// cancels the request.
#[derive(Debug, Clone)]
pub struct TerminalAcquirer {
    confirm_message: String,
}

impl Default for TerminalAcquirer {
    fn default() -> Self {
        Self {
            confirm_message: DEFAULT_CONFIRM_MESSAGE.to_string(),
        }
    }
}

impl TerminalAcquirer {
    /// Creates a terminal acquirer with the default confirmation text.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the text shown for the second entry of a confirmed prompt.
    #[must_use]
    pub fn with_confirm_message(mut self, message: impl Into<String>) -> Self {
        self.confirm_message = message.into();
        self
    }

    fn acquire_from<F>(&self, request: &PromptRequest, mut read: F) -> VaultResult<Acquired>
    where
        F: FnMut(&str) -> io::Result<String>,
    {
        if request.timeout.is_some() {
            debug!("terminal prompt ignores the advisory timeout");
        }

        let first = classify_entry(read(&prompt_line(&request.message)))?;
        match request.mode {
            PromptMode::Unlock => Ok(first),
            PromptMode::Confirm => confirm_entries(first, || {
                classify_entry(read(&prompt_line(&self.confirm_message)))
            }),
        }
    }
}

impl SecretAcquirer for TerminalAcquirer {
    fn acquire(&self, request: &PromptRequest) -> VaultResult<Acquired> {
        self.acquire_from(request, |prompt| rpassword::prompt_password(prompt))
    }
}

fn prompt_line(message: &str) -> String {
    format!("{}: ", message.trim_end_matches([':', ' ']))
}

fn classify_entry(entry: io::Result<String>) -> VaultResult<Acquired> {
    match entry {
        Ok(value) if value.is_empty() => Ok(Acquired::Cancelled),
        Ok(value) => Ok(Acquired::Secret(Secret::new(value))),
        Err(e) if matches!(
            e.kind(),
            io::ErrorKind::UnexpectedEof | io::ErrorKind::Interrupted
        ) =>
        {
            Ok(Acquired::Cancelled)
        }
        Err(e) => Err(VaultError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn scripted(entries: Vec<io::Result<String>>) -> impl FnMut(&str) -> io::Result<String> {
        let mut entries: VecDeque<_> = entries.into();
        move |_prompt| entries.pop_front().expect("unexpected prompt")
    }

    #[test]
    fn empty_line_cancels() {
        let acquirer = TerminalAcquirer::new();
        let result = acquirer
            .acquire_from(&PromptRequest::unlock("Unlock"), scripted(vec![Ok(String::new())]))
            .unwrap();
        assert!(result.is_cancelled());
    }

    #[test]
    fn eof_cancels() {
        let acquirer = TerminalAcquirer::new();
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of file");
        let result = acquirer
            .acquire_from(&PromptRequest::unlock("Unlock"), scripted(vec![Err(eof)]))
            .unwrap();
        assert!(result.is_cancelled());
    }

    #[test]
    fn other_io_errors_are_reported() {
        let acquirer = TerminalAcquirer::new();
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "no tty");
        let result = acquirer.acquire_from(&PromptRequest::unlock("Unlock"), scripted(vec![Err(denied)]));
        assert!(matches!(result, Err(VaultError::Io(_))));
    }

    #[test]
    fn confirm_reads_twice() {
        let acquirer = TerminalAcquirer::new();
        let result = acquirer
            .acquire_from(
                &PromptRequest::confirm("New passphrase"),
                scripted(vec![Ok("alpha-9!".into()), Ok("alpha-9!".into())]),
            )
            .unwrap();
        assert_eq!(result.into_secret().unwrap().expose(), "alpha-9!");
    }

    #[test]
    fn confirm_mismatch() {
        let acquirer = TerminalAcquirer::new();
        let result = acquirer.acquire_from(
            &PromptRequest::confirm("New passphrase"),
            scripted(vec![Ok("alpha-9!".into()), Ok("alpha-9?".into())]),
        );
        assert!(matches!(result, Err(VaultError::ConfirmationMismatch)));
    }

    #[test]
    fn prompt_line_formatting() {
        assert_eq!(prompt_line("Passphrase"), "Passphrase: ");
        assert_eq!(prompt_line("Passphrase: "), "Passphrase: ");
    }

    #[test]
    fn uses_confirm_message_for_second_entry() {
        let acquirer = TerminalAcquirer::new().with_confirm_message("Again");
        let mut seen = Vec::new();
        let _ = acquirer.acquire_from(&PromptRequest::confirm("New"), |prompt| {
            seen.push(prompt.to_string());
            Ok("x".to_string())
        });
        assert_eq!(seen, vec!["New: ".to_string(), "Again: ".to_string()]);
    }
}
