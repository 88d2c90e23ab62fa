// src/load.rs

use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

use crate::audit::AuditLog;
use crate::error::EtlError;
use crate::table::{Table, Value};

fn unwritable(what: impl std::fmt::Display, e: impl std::fmt::Display) -> EtlError {
    EtlError::SinkUnwritable(format!("{what}: {e}"))
}

/// Serialize the table to a comma-separated file with a synthetic 0-based
/// index column, overwriting any existing file at `path`. The index header
/// cell is empty, matching the original frame dump.
pub fn load_to_csv(table: &Table, path: &Path, audit: &AuditLog) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| unwritable(path.display(), e))?;

    let mut header = Vec::with_capacity(table.num_columns() + 1);
    header.push(String::new());
    header.extend(table.header().iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| unwritable(path.display(), e))?;

    for (i, row) in table.rows().iter().enumerate() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(i.to_string());
        record.extend(row.iter().map(Value::render));
        writer
            .write_record(&record)
            .map_err(|e| unwritable(path.display(), e))?;
    }
    writer.flush().map_err(|e| unwritable(path.display(), e))?;

    debug!(rows = table.num_rows(), path = %path.display(), "wrote CSV");
    audit.log("Data saved to CSV file");
    Ok(())
}

/// Write the table into the store under `table_name` as an explicit
/// replace: any prior table of that name is dropped and recreated, so no
/// rows from an earlier run survive. The synthetic index column is not
/// persisted; column types are inferred from the values.
pub fn load_to_store(
    table: &Table,
    conn: &Connection,
    table_name: &str,
    audit: &AuditLog,
) -> Result<()> {
    audit.log("SQL Connection initiated");
    replace_table(conn, table_name, table)
        .map_err(|e| unwritable(format!("store table `{table_name}`"), e))?;
    debug!(rows = table.num_rows(), table_name, "loaded store table");
    audit.log("Data loaded to Database as a table, Executing queries");
    Ok(())
}

fn replace_table(conn: &Connection, name: &str, table: &Table) -> rusqlite::Result<()> {
    let columns: Vec<String> = table
        .header()
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} {}", quote_ident(col), column_type(table, i)))
        .collect();

    conn.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)), [])?;
    conn.execute(
        &format!("CREATE TABLE {} ({})", quote_ident(name), columns.join(", ")),
        [],
    )?;

    let placeholders = vec!["?"; table.num_columns()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} VALUES ({placeholders})",
        quote_ident(name)
    ))?;
    for row in table.rows() {
        stmt.execute(rusqlite::params_from_iter(row.iter().map(to_sql_value)))?;
    }
    Ok(())
}

/// A column is numeric only if every non-null value in it is a number.
fn column_type(table: &Table, idx: usize) -> &'static str {
    let mut numeric = false;
    for row in table.rows() {
        match &row[idx] {
            Value::Number(_) => numeric = true,
            Value::Null => {}
            Value::Text(_) => return "TEXT",
        }
    }
    if numeric {
        "REAL"
    } else {
        "TEXT"
    }
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Number(n) => rusqlite::types::Value::Real(*n),
        Value::Null => rusqlite::types::Value::Null,
    }
}

/// Double-quote an identifier for the store's SQL dialect. Column names
/// here contain spaces and punctuation, e.g. `Market cap (US$ billion)`.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
