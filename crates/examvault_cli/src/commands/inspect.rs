//! Inspect command implementation.

use super::{format_timestamp, CommandResult, Context};
use examvault_core::rusqlite::Connection;
use examvault_core::VaultResult;
use serde::Serialize;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Metadata format version, if recorded.
    pub format_version: Option<u32>,
    /// Creation time, Unix seconds.
    pub created_at: Option<u64>,
    /// Migration time, Unix seconds.
    pub migrated_at: Option<u64>,
    /// Last re-key time, Unix seconds.
    pub rekeyed_at: Option<u64>,
    /// SQLite user version.
    pub user_version: i64,
    /// Per-table statistics.
    pub tables: Vec<TableStats>,
}

/// Statistics for a single table.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Number of rows (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<i64>,
}

/// Runs the inspect command.
pub fn run(ctx: &Context, count_rows: bool, format: &str) -> CommandResult {
    let vault = ctx.vault()?;
    let info = vault.describe()?;

    let (user_version, tables) = vault.with_unit_of_work(|conn| {
        let user_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        let mut tables = Vec::with_capacity(info.tables.len());
        for name in &info.tables {
            let rows = if count_rows {
                Some(count_table_rows(conn, name)?)
            } else {
                None
            };
            tables.push(TableStats {
                name: name.clone(),
                rows,
            });
        }
        Ok((user_version, tables))
    })?;

    let meta = info.meta.unwrap_or_default();
    let result = InspectResult {
        path: info.path.display().to_string(),
        format_version: (meta.format_version > 0).then_some(meta.format_version),
        created_at: meta.created_at,
        migrated_at: meta.migrated_at,
        rekeyed_at: meta.rekeyed_at,
        user_version,
        tables,
    };

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

fn count_table_rows(conn: &Connection, name: &str) -> VaultResult<i64> {
    let sql = format!("SELECT count(*) FROM {}", quote_identifier(name));
    Ok(conn.query_row(&sql, [], |row| row.get(0))?)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn print_text_output(result: &InspectResult) {
    println!("Store Information");
    println!("=================");
    println!("  Path: {}", result.path);
    match result.format_version {
        Some(version) => println!("  Format version: {}", version),
        None => println!("  Format version: (no metadata)"),
    }
    println!("  Created: {}", format_timestamp(result.created_at));
    println!("  Migrated: {}", format_timestamp(result.migrated_at));
    println!("  Re-keyed: {}", format_timestamp(result.rekeyed_at));
    println!("  User version: {}", result.user_version);
    println!();

    println!("Tables ({}):", result.tables.len());
    for table in &result.tables {
        match table.rows {
            Some(rows) => println!("  {}: {} rows", table.name, rows),
            None => println!("  {}", table.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_identifier("exams"), "\"exams\"");
        assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
    }
}
