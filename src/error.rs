// src/error.rs

use thiserror::Error;

/// Failure taxonomy for the pipeline. Every stage is fail-fast: these are
/// raised inside `anyhow` chains and propagate to the driver, which halts
/// forward transitions without rolling back completed stages.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Document, rate file, or store could not be reached.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// An expected column or currency code is absent.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The flat-file or store sink rejected the write.
    #[error("sink unwritable: {0}")]
    SinkUnwritable(String),

    /// The store rejected a query; surfaced to the caller, never retried.
    #[error("query `{sql}` failed")]
    Query {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },
}
