//! Status command implementation.
//!
//! Never asks for the passphrase: only the file header and a keyless
//! catalog read are used.

use super::{CommandResult, Context};
use examvault_core::{inspect_signature, is_encrypted, sidecar_paths, Cipher, Signature};
use serde::Serialize;
use std::path::Path;

/// Store status.
#[derive(Debug, Serialize)]
pub struct StatusResult {
    /// Store path.
    pub path: String,
    /// Whether the store file exists.
    pub exists: bool,
    /// File size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Header classification (empty, plaintext, opaque).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<&'static str>,
    /// Whether the file is encrypted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    /// Journal sidecars present next to the store.
    pub sidecars: Vec<String>,
    /// Linked SQLCipher version, if any.
    pub cipher_version: Option<String>,
}

/// Runs the status command.
pub fn run(ctx: &Context, format: &str) -> CommandResult {
    let result = collect(ctx.path())?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn collect(path: &Path) -> Result<StatusResult, Box<dyn std::error::Error>> {
    let mut result = StatusResult {
        path: path.display().to_string(),
        exists: path.exists(),
        size: None,
        header: None,
        encrypted: None,
        sidecars: sidecar_paths(path)
            .into_iter()
            .filter(|p| p.exists())
            .map(|p| p.display().to_string())
            .collect(),
        cipher_version: Cipher::detect().ok().map(|c| c.version().to_string()),
    };

    if result.exists {
        result.size = Some(std::fs::metadata(path)?.len());
        result.header = Some(match inspect_signature(path)? {
            Signature::Empty => "empty",
            Signature::Plaintext => "plaintext SQLite",
            Signature::Opaque => "opaque",
        });
        result.encrypted = Some(is_encrypted(path)?);
    }

    Ok(result)
}

fn print_text_output(result: &StatusResult) {
    println!("Store Status");
    println!("============");
    println!("  Path: {}", result.path);

    if !result.exists {
        println!("  No store file found");
    } else {
        if let Some(size) = result.size {
            println!("  Size: {} bytes", size);
        }
        if let Some(header) = result.header {
            println!("  Header: {}", header);
        }
        match result.encrypted {
            Some(true) => println!("  ✓ Encrypted"),
            Some(false) => println!("  ✗ Not encrypted (run `examvault migrate` to encrypt it)"),
            None => {}
        }
    }

    for sidecar in &result.sidecars {
        println!("  Sidecar present: {}", sidecar);
    }

    match &result.cipher_version {
        Some(version) => println!("  Encryption backend: SQLCipher {}", version),
        None => println!("  Encryption backend: unavailable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_store_reports_absent() {
        let dir = tempdir().unwrap();
        let result = collect(&dir.path().join("exam.db")).unwrap();
        assert!(!result.exists);
        assert!(result.encrypted.is_none());
    }

    #[test]
    fn opaque_file_reports_encrypted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exam.db");
        std::fs::write(&path, vec![0x7Eu8; 4096]).unwrap();
        std::fs::write(dir.path().join("exam.db-journal"), b"j").unwrap();

        let result = collect(&path).unwrap();
        assert_eq!(result.size, Some(4096));
        assert_eq!(result.header, Some("opaque"));
        assert_eq!(result.encrypted, Some(true));
        assert_eq!(result.sidecars.len(), 1);
    }

    #[test]
    fn json_has_no_secret_fields() {
        let dir = tempdir().unwrap();
        let result = collect(&dir.path().join("exam.db")).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["exists"], false);
        assert!(json.get("size").is_none());
    }
}
