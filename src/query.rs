// src/query.rs

use anyhow::Result;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use crate::audit::AuditLog;
use crate::error::EtlError;
use crate::table::{Table, Value};

fn query_err(sql: &str, source: rusqlite::Error) -> EtlError {
    EtlError::Query {
        sql: sql.to_string(),
        source,
    }
}

/// Execute one read-only query against the store and return the result as
/// a Table, preserving the store's row and column order. Store errors are
/// surfaced to the caller, never retried.
pub fn run_query(conn: &Connection, sql: &str, audit: &AuditLog) -> Result<Table> {
    let mut stmt = conn.prepare(sql).map_err(|e| query_err(sql, e))?;
    let header: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let column_count = header.len();

    let mut table = Table::new(header)?;
    let mut rows = stmt.query([]).map_err(|e| query_err(sql, e))?;
    while let Some(row) = rows.next().map_err(|e| query_err(sql, e))? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value = match row.get_ref(i).map_err(|e| query_err(sql, e))? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(v) => Value::Number(v as f64),
                ValueRef::Real(v) => Value::Number(v),
                ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
                // the loader never writes blobs
                ValueRef::Blob(_) => Value::Null,
            };
            values.push(value);
        }
        table.push_row(values)?;
    }

    debug!(sql, rows = table.num_rows(), "query complete");
    audit.log("Process Complete");
    Ok(table)
}
