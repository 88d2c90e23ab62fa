// src/transform.rs

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::audit::AuditLog;
use crate::error::EtlError;
use crate::table::{Table, Value};

/// The distinguished numeric column the conversion reads from.
pub const MARKET_CAP_COLUMN: &str = "Market cap (US$ billion)";

/// Currency codes and the derived column each one produces, in output order.
pub const TARGET_CURRENCIES: [(&str, &str); 3] = [
    ("GBP", "MC_GBP_Billion"),
    ("EUR", "MC_EUR_Billion"),
    ("INR", "MC_INR_Billion"),
];

#[derive(Debug, Deserialize)]
struct RateRecord {
    #[serde(rename = "Currency")]
    currency: String,
    #[serde(rename = "Rate")]
    rate: f64,
}

/// Read the `Currency,Rate` key-value file into an exchange-rate map.
pub fn load_rates(path: &Path) -> Result<HashMap<String, f64>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        EtlError::SourceUnavailable(format!("rate file `{}`: {e}", path.display()))
    })?;

    let mut rates = HashMap::new();
    for record in reader.deserialize() {
        let record: RateRecord =
            record.with_context(|| format!("parsing rate file `{}`", path.display()))?;
        rates.insert(record.currency, record.rate);
    }
    debug!(codes = rates.len(), "loaded exchange rates");
    Ok(rates)
}

/// `round(x, 2)`, half away from zero.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Append the three derived currency columns, preserving row order and
/// leaving every original column untouched. Re-applying with the same rate
/// map yields the same table: pre-existing derived columns are recomputed,
/// not duplicated.
pub fn transform(table: &Table, rates: &HashMap<String, f64>, audit: &AuditLog) -> Result<Table> {
    let mc_idx = table.column_index(MARKET_CAP_COLUMN).ok_or_else(|| {
        EtlError::SchemaMismatch(format!("missing required column `{MARKET_CAP_COLUMN}`"))
    })?;

    // All codes are required before any column is added.
    for (code, _) in TARGET_CURRENCIES {
        if !rates.contains_key(code) {
            return Err(
                EtlError::SchemaMismatch(format!("missing currency code `{code}` in rate map"))
                    .into(),
            );
        }
    }

    let derived: Vec<&str> = TARGET_CURRENCIES.iter().map(|(_, col)| *col).collect();
    let kept: Vec<usize> = (0..table.num_columns())
        .filter(|&i| !derived.contains(&table.header()[i].as_str()))
        .collect();

    let mut out = Table::new(kept.iter().map(|&i| table.header()[i].clone()).collect())?;
    for row in table.rows() {
        out.push_row(kept.iter().map(|&i| row[i].clone()).collect())?;
    }

    for (code, column) in TARGET_CURRENCIES {
        let rate = rates[code];
        let values = table
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| match row[mc_idx] {
                Value::Number(mc) => Ok(Value::Number(round2(mc * rate))),
                ref other => Err(EtlError::SchemaMismatch(format!(
                    "row {i}: market cap is not numeric ({other:?})"
                ))),
            })
            .collect::<Result<Vec<Value>, EtlError>>()?;
        out.push_column(column.to_string(), values)?;
    }

    audit.log("Data transformation complete. Initiating Loading process");
    Ok(out)
}
