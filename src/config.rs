// src/config.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Run configuration. Defaults mirror the archived largest-banks page and
/// the fixed sink names this job has always used; a YAML file can override
/// any subset of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Document source locator.
    pub url: String,
    /// Heading text that immediately precedes the target table.
    pub table_marker: String,
    /// `Currency,Rate` key-value file.
    pub exchange_rate_path: PathBuf,
    /// Flat-file sink, overwritten each run.
    pub output_csv_path: PathBuf,
    /// Tabular store, overwritten (drop/recreate) each run.
    pub database_path: PathBuf,
    /// Store table name.
    pub table_name: String,
    /// Append-only audit log sink.
    pub log_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            url: "https://web.archive.org/web/20230908091635/https://en.wikipedia.org/wiki/List_of_largest_banks".to_string(),
            table_marker: "By market capitalization".to_string(),
            exchange_rate_path: PathBuf::from("exchange_rate.csv"),
            output_csv_path: PathBuf::from("Largest_banks_data.csv"),
            database_path: PathBuf::from("Banks.db"),
            table_name: "Largest_banks".to_string(),
            log_path: PathBuf::from("code_log.txt"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config `{}`", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config `{}`", path.display()))
    }
}
