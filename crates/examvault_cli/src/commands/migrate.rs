//! Migrate command implementation.

use super::{CommandResult, Context};
use examvault_core::is_encrypted;
use std::path::Path;
use tracing::info;

/// Runs the migrate command.
pub fn run(ctx: &Context, source: &Path, overwrite: bool) -> CommandResult {
    let vault = ctx.vault()?;
    if is_encrypted(source)? {
        return Err(format!("{:?} is already encrypted; nothing to migrate", source).into());
    }
    info!("Migrating {:?} into {:?}", source, ctx.path());

    let store = vault.migrate_interactive(source, overwrite)?;

    println!("✓ Migrated {} into {}", source.display(), store.path.display());
    println!("  Tables copied: {}", store.tables.len());
    for table in &store.tables {
        println!("    {table}");
    }
    println!();
    println!("The plaintext source was left in place. Remove it once the new store is verified.");
    Ok(())
}
