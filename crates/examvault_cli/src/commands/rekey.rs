//! Rekey command implementation.

use super::{acquirer_for, CommandResult, Context};
use examvault_core::PromptRequest;
use std::path::Path;
use tracing::info;

/// Runs the rekey command.
///
/// The current passphrase comes from `--key-file` or the terminal; the new
/// one from `new_key_file` or a confirmed terminal prompt.
pub fn run(ctx: &Context, new_key_file: Option<&Path>) -> CommandResult {
    let vault = ctx.vault()?;
    info!("Re-keying store at {:?}", ctx.path());

    let old = ctx
        .acquirer()
        .acquire(&PromptRequest::unlock("Current passphrase"))?
        .into_secret()?;
    let new = acquirer_for(new_key_file)
        .acquire(&PromptRequest::confirm("New passphrase"))?
        .into_secret()?;

    vault.rekey(&old, &new)?;

    println!("✓ Store re-keyed: {}", ctx.path().display());
    println!("  The previous passphrase no longer opens it.");
    Ok(())
}
