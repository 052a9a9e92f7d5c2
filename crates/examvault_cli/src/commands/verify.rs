//! Verify command implementation.

use super::{CommandResult, Context};

/// Runs the verify command.
pub fn run(ctx: &Context) -> CommandResult {
    println!("Verifying store at {:?}", ctx.path());
    println!();

    let vault = ctx.vault()?;
    let report = vault.verify_integrity()?;

    println!("Checking page authentication...");
    if report.cipher_errors.is_empty() {
        println!("  All pages authenticated");
    } else {
        for error in &report.cipher_errors {
            println!("  {error}");
        }
    }

    println!("Checking B-tree structure...");
    for message in &report.sqlite_messages {
        println!("  {message}");
    }

    println!();
    if report.is_ok() {
        println!("✓ Store verification passed");
        Ok(())
    } else {
        println!("✗ Store verification failed");
        Err("Verification failed".into())
    }
}
