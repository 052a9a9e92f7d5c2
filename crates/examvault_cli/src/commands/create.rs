//! Create command implementation.

use super::{CommandResult, Context};
use tracing::info;

/// Runs the create command.
pub fn run(ctx: &Context, overwrite: bool) -> CommandResult {
    let vault = ctx.vault()?;
    info!("Creating encrypted store at {:?}", ctx.path());

    let store = vault.create_interactive(overwrite)?;

    println!("✓ Created encrypted store at {}", store.path.display());
    if let Some(meta) = store.meta {
        println!("  Format version: {}", meta.format_version);
    }
    Ok(())
}
