//! ExamVault CLI
//!
//! Command-line tools for encrypted exam-record stores.
//!
//! # Commands
//!
//! - `create` - Create a new encrypted store
//! - `rekey` - Change the store passphrase
//! - `migrate` - Encrypt a legacy plaintext database into a new store
//! - `status` - Report whether the store file is encrypted (no key needed)
//! - `verify` - Verify page authentication and B-tree integrity
//! - `inspect` - Display store metadata and tables
//! - `query` - Run one SQL statement against the unlocked store

mod commands;

use clap::{Parser, Subcommand};
use commands::Context;
use examvault_core::{VaultConfig, VaultError, DEFAULT_STORE_FILE};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// ExamVault command-line store tools.
#[derive(Parser)]
#[command(name = "examvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long, env = "EXAMVAULT_STORE")]
    path: Option<PathBuf>,

    /// Read the passphrase from the first line of this file instead of prompting
    #[arg(global = true, short, long)]
    key_file: Option<PathBuf>,

    /// Lock the cached passphrase after this many idle seconds
    #[arg(global = true, long)]
    idle_timeout_secs: Option<u64>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new encrypted store
    Create {
        /// Replace an existing store at the path
        #[arg(long)]
        overwrite: bool,
    },

    /// Change the store passphrase
    Rekey {
        /// Read the new passphrase from this file instead of prompting
        #[arg(long)]
        new_key_file: Option<PathBuf>,
    },

    /// Encrypt a plaintext SQLite database into a new store
    Migrate {
        /// The plaintext database to read (left unchanged)
        source: PathBuf,

        /// Replace an existing store at the destination
        #[arg(long)]
        overwrite: bool,
    },

    /// Report whether the store file is encrypted
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify store integrity
    Verify,

    /// Display store metadata and tables
    Inspect {
        /// Count rows in each table
        #[arg(short, long)]
        rows: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run one SQL statement against the store
    Query {
        /// The statement to run
        sql: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(VaultError::AcquisitionCancelled) = err.downcast_ref::<VaultError>() {
                eprintln!("Cancelled.");
                return ExitCode::from(130);
            }
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> commands::CommandResult {
    let path = cli.path.unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE));
    let mut config = VaultConfig::new(path);
    if let Some(secs) = cli.idle_timeout_secs {
        config = config.idle_timeout(Duration::from_secs(secs));
    }
    let ctx = Context::new(config, cli.key_file);

    match cli.command {
        Commands::Create { overwrite } => commands::create::run(&ctx, overwrite),
        Commands::Rekey { new_key_file } => commands::rekey::run(&ctx, new_key_file.as_deref()),
        Commands::Migrate { source, overwrite } => commands::migrate::run(&ctx, &source, overwrite),
        Commands::Status { format } => commands::status::run(&ctx, &format),
        Commands::Verify => commands::verify::run(&ctx),
        Commands::Inspect { rows, format } => commands::inspect::run(&ctx, rows, &format),
        Commands::Query { sql, format } => commands::query::run(&ctx, &sql, &format),
        Commands::Version => {
            println!("ExamVault CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ExamVault Core v{}", examvault_core::VERSION);
            match examvault_core::Cipher::detect() {
                Ok(cipher) => println!("SQLCipher {}", cipher.version()),
                Err(err) => println!("SQLCipher unavailable: {err}"),
            }
            Ok(())
        }
    }
}
