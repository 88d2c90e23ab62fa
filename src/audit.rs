// src/audit.rs

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::error;

const TIMESTAMP_FORMAT: &str = "%Y-%b-%d-%H:%M:%S";

/// Append-only audit trail of pipeline progress, one timestamped line per
/// stage boundary. One instance per run; the trail is write-only and never
/// read back by the pipeline.
pub struct AuditLog {
    sink: Mutex<File>,
}

impl AuditLog {
    /// Open (or create) the audit sink in append mode. Failure here is
    /// fatal for the whole run; there is no in-memory fallback.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening audit log `{}`", path.display()))?;
        Ok(AuditLog {
            sink: Mutex::new(file),
        })
    }

    /// Record one event as `<timestamp>:<message>`. A write failure is
    /// reported on the operational log and never fails the calling stage.
    pub fn log(&self, message: &str) {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let line = format!("{timestamp}:{message}\n");
        let mut sink = self.sink.lock().unwrap();
        if let Err(e) = sink.write_all(line.as_bytes()) {
            error!(error = %e, message, "audit log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn appends_timestamped_lines() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("code_log.txt");

        let audit = AuditLog::open(&path)?;
        audit.log("Preliminaries complete. Initiating ETL process");
        audit.log("Data extraction complete. Initiating Transformation process");

        let contents = fs::read_to_string(&path)?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let pattern = Regex::new(r"^\d{4}-[A-Za-z]{3}-\d{2}-\d{2}:\d{2}:\d{2}:.+$")?;
        for line in &lines {
            assert!(pattern.is_match(line), "unexpected line: {line}");
        }
        assert!(lines[1].ends_with("Initiating Transformation process"));
        Ok(())
    }

    #[test]
    fn reopening_preserves_existing_lines() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("code_log.txt");

        AuditLog::open(&path)?.log("first run");
        AuditLog::open(&path)?.log("second run");

        let contents = fs::read_to_string(&path)?;
        assert_eq!(contents.lines().count(), 2);
        Ok(())
    }
}
