//! Query command implementation.

use super::{CommandResult, Context};
use examvault_core::rusqlite::types::ValueRef;
use serde::Serialize;
use serde_json::Value;

/// Query output.
#[derive(Debug, Serialize)]
pub struct QueryResult {
    /// Column names.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<Vec<Value>>,
    /// Rows changed, for statements that return no columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<usize>,
}

/// Runs the query command.
pub fn run(ctx: &Context, sql: &str, format: &str) -> CommandResult {
    let vault = ctx.vault()?;

    let result = vault.with_unit_of_work(|conn| {
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        if columns.is_empty() {
            let changed = stmt.execute([])?;
            return Ok(QueryResult {
                columns,
                rows: Vec::new(),
                changed: Some(changed),
            });
        }

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(to_json(row.get_ref(i)?));
            }
            rows.push(values);
        }
        Ok(QueryResult {
            columns,
            rows,
            changed: None,
        })
    })?;

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

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

fn display_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_text_output(result: &QueryResult) {
    if let Some(changed) = result.changed {
        println!("{} row(s) changed", changed);
        return;
    }

    println!("{}", result.columns.join("\t"));
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(display_cell).collect();
        println!("{}", cells.join("\t"));
    }
    println!("({} row(s))", result.rows.len());
}
