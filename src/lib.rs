//! Four-stage ETL over the largest-banks-by-market-capitalization table:
//! extract the table from an archived wiki page, derive per-currency
//! market-cap columns from an exchange-rate file, load the result into a
//! CSV file and a SQLite table, then answer a fixed set of read-only
//! queries. Every stage boundary is recorded on an append-only audit log.

pub mod audit;
pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod query;
pub mod table;
pub mod transform;

pub use error::EtlError;
pub use table::{Table, Value};
