// src/pipeline.rs

use std::fmt;

use anyhow::{Context, Result};
use reqwest::Client;
use rusqlite::Connection;
use tracing::{debug, error, info};
use url::Url;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::error::EtlError;
use crate::load::quote_ident;
use crate::table::Table;
use crate::{extract, load, query, transform};

/// Driver states. Transitions are strictly forward and unconditional on
/// success; a stage failure leaves the run in its current state with no
/// rollback of stages already completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Extracted,
    Transformed,
    FileLoaded,
    StoreLoaded,
    Queried,
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

fn advance(from: Stage, to: Stage) -> Stage {
    debug!(%from, %to, "stage transition");
    to
}

/// The three fixed read-only queries issued each run.
pub fn fixed_queries(table_name: &str) -> [String; 3] {
    let name = quote_ident(table_name);
    [
        format!("SELECT * FROM {name}"),
        format!("SELECT AVG(MC_GBP_Billion) FROM {name}"),
        format!("SELECT \"Bank name\" FROM {name} LIMIT 5"),
    ]
}

/// Run the whole pipeline: fetch, then every stage in
/// [`run_from_document`].
pub async fn run(config: &Config) -> Result<()> {
    let audit = AuditLog::open(&config.log_path)?;
    audit.log("Preliminaries complete. Initiating ETL process");

    let client = Client::new();
    let url = Url::parse(&config.url)
        .with_context(|| format!("parsing source URL `{}`", config.url))?;
    let html = extract::fetch_document(&client, &url).await?;

    run_from_document(&html, config, &audit)
}

/// Every stage after the document fetch, in fixed order:
/// Extract -> Transform -> Load(file) -> Load(store) -> Query x3 -> close.
pub fn run_from_document(html: &str, config: &Config, audit: &AuditLog) -> Result<()> {
    let mut stage = Stage::Init;

    let extracted = extract::extract_from_document(html, &config.table_marker, audit)?;
    stage = advance(stage, Stage::Extracted);

    let rates = transform::load_rates(&config.exchange_rate_path)?;
    let transformed = transform::transform(&extracted, &rates, audit)?;
    stage = advance(stage, Stage::Transformed);
    println!("{transformed}");

    load::load_to_csv(&transformed, &config.output_csv_path, audit)?;
    stage = advance(stage, Stage::FileLoaded);

    // One store connection per run. It is released on every exit path
    // below, including a failed store load or query; the CSV already
    // written above is deliberately left in place on such failures.
    let conn = Connection::open(&config.database_path).map_err(|e| {
        EtlError::SourceUnavailable(format!(
            "store `{}`: {e}",
            config.database_path.display()
        ))
    })?;
    let result = store_stages(&conn, &transformed, config, audit, &mut stage);
    if let Err((_conn, e)) = conn.close() {
        error!(error = %e, "closing store connection failed");
    }
    audit.log("Server Connection closed");
    result?;

    stage = advance(stage, Stage::Closed);
    info!(%stage, "pipeline finished");
    Ok(())
}

fn store_stages(
    conn: &Connection,
    table: &Table,
    config: &Config,
    audit: &AuditLog,
    stage: &mut Stage,
) -> Result<()> {
    load::load_to_store(table, conn, &config.table_name, audit)?;
    *stage = advance(*stage, Stage::StoreLoaded);

    for sql in fixed_queries(&config.table_name) {
        info!(%sql, "running query");
        let result = query::run_query(conn, &sql, audit)?;
        println!("{result}");
    }
    *stage = advance(*stage, Stage::Queried);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use anyhow::Result;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    const PAGE: &str = r#"<html><body>
        <h2><span class="mw-headline">By market capitalization</span></h2>
        <table class="wikitable"><tbody>
        <tr><th>Rank</th><th>Bank name</th><th>Market cap (US$ billion)</th></tr>
        <tr><td>1</td><td>JPMorgan Chase</td><td>100</td></tr>
        <tr><td>2</td><td>Bank of America</td><td>50</td></tr>
        </tbody></table>
        </body></html>"#;

    fn write_rates(dir: &Path, lines: &[&str]) -> Result<std::path::PathBuf> {
        let path = dir.join("exchange_rate.csv");
        let mut file = fs::File::create(&path)?;
        writeln!(file, "Currency,Rate")?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        Ok(path)
    }

    fn test_config(dir: &TempDir) -> Result<Config> {
        Ok(Config {
            exchange_rate_path: write_rates(dir.path(), &["GBP,0.8", "EUR,0.93", "INR,82.1"])?,
            output_csv_path: dir.path().join("Largest_banks_data.csv"),
            database_path: dir.path().join("Banks.db"),
            log_path: dir.path().join("code_log.txt"),
            ..Config::default()
        })
    }

    #[test]
    fn full_run_writes_both_sinks_and_the_audit_trail() -> Result<()> {
        let dir = tempdir()?;
        let config = test_config(&dir)?;
        let audit = AuditLog::open(&config.log_path)?;

        run_from_document(PAGE, &config, &audit)?;

        // CSV sink: header + two rows, index column leading
        let csv = fs::read_to_string(&config.output_csv_path)?;
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some(",Rank,Bank name,Market cap (US$ billion),MC_GBP_Billion,MC_EUR_Billion,MC_INR_Billion")
        );
        assert_eq!(lines.next(), Some("0,1,JPMorgan Chase,100,80,93,8210"));

        // store sink: fresh connection sees the replaced table
        let conn = Connection::open(&config.database_path)?;
        let gbp: f64 = conn.query_row(
            "SELECT MC_GBP_Billion FROM Largest_banks WHERE \"Bank name\" = 'Bank of America'",
            [],
            |r| r.get(0),
        )?;
        assert_eq!(gbp, 40.0);

        // audit trail: every stage boundary, closure last
        let trail = fs::read_to_string(&config.log_path)?;
        for needle in [
            "Data extraction complete",
            "Data transformation complete",
            "Data saved to CSV file",
            "SQL Connection initiated",
            "Data loaded to Database as a table",
            "Process Complete",
            "Server Connection closed",
        ] {
            assert!(trail.contains(needle), "missing audit event: {needle}");
        }
        assert!(trail.trim_end().ends_with("Server Connection closed"));
        Ok(())
    }

    #[test]
    fn rerun_overwrites_instead_of_appending() -> Result<()> {
        let dir = tempdir()?;
        let config = test_config(&dir)?;
        let audit = AuditLog::open(&config.log_path)?;

        run_from_document(PAGE, &config, &audit)?;
        run_from_document(PAGE, &config, &audit)?;

        let conn = Connection::open(&config.database_path)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM Largest_banks", [], |r| r.get(0))?;
        assert_eq!(count, 2);

        let csv = fs::read_to_string(&config.output_csv_path)?;
        assert_eq!(csv.lines().count(), 3);
        Ok(())
    }

    #[test]
    fn missing_currency_halts_before_any_load() -> Result<()> {
        let dir = tempdir()?;
        let mut config = test_config(&dir)?;
        config.exchange_rate_path = write_rates(dir.path(), &["GBP,0.8", "EUR,0.93"])?;
        let audit = AuditLog::open(&config.log_path)?;

        let err = run_from_document(PAGE, &config, &audit).unwrap_err();
        let etl = err.downcast_ref::<EtlError>().expect("typed error");
        assert!(matches!(etl, EtlError::SchemaMismatch(_)));

        // no sink was touched, no store connection was opened
        assert!(!config.output_csv_path.exists());
        assert!(!config.database_path.exists());

        // the partial trail stops after extraction
        let trail = fs::read_to_string(&config.log_path)?;
        assert!(trail.contains("Data extraction complete"));
        assert!(!trail.contains("Server Connection closed"));
        Ok(())
    }

    #[test]
    fn failed_store_load_leaves_csv_and_logs_closure() -> Result<()> {
        let dir = tempdir()?;
        let config = test_config(&dir)?;
        // garbage at the database path: the connection opens, the first
        // statement fails, and the release path must still run
        fs::write(&config.database_path, "this is not a database")?;
        let audit = AuditLog::open(&config.log_path)?;

        let err = run_from_document(PAGE, &config, &audit).unwrap_err();
        let etl = err.downcast_ref::<EtlError>().expect("typed error");
        assert!(matches!(etl, EtlError::SinkUnwritable(_)));

        // no rollback of the already-written CSV
        assert!(config.output_csv_path.exists());

        // the trail records the attempted store session and the closure
        let trail = fs::read_to_string(&config.log_path)?;
        assert!(trail.contains("SQL Connection initiated"));
        assert!(trail.trim_end().ends_with("Server Connection closed"));
        assert!(!trail.contains("Executing queries"));
        Ok(())
    }

    #[test]
    fn fixed_queries_target_the_configured_table() {
        let queries = fixed_queries("Largest_banks");
        assert_eq!(queries[0], "SELECT * FROM \"Largest_banks\"");
        assert!(queries[1].starts_with("SELECT AVG(MC_GBP_Billion)"));
        assert!(queries[2].ends_with("LIMIT 5"));
    }

    #[test]
    fn scenario_single_row_conversion() -> Result<()> {
        // rate map {GBP:0.8, EUR:0.93, INR:82.1}, one 100-billion row
        let dir = tempdir()?;
        let config = test_config(&dir)?;
        let audit = AuditLog::open(&config.log_path)?;

        run_from_document(PAGE, &config, &audit)?;

        let conn = Connection::open(&config.database_path)?;
        let result = crate::query::run_query(
            &conn,
            "SELECT MC_GBP_Billion, MC_EUR_Billion, MC_INR_Billion \
             FROM Largest_banks WHERE \"Bank name\" = 'JPMorgan Chase'",
            &audit,
        )?;
        assert_eq!(
            result.rows()[0],
            [
                Value::Number(80.0),
                Value::Number(93.0),
                Value::Number(8210.0)
            ]
        );
        Ok(())
    }
}
