// src/extract.rs

use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html};
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::audit::AuditLog;
use crate::error::EtlError;
use crate::table::{Table, Value};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

/// Trailing wiki-style footnote markers, e.g. `432.92[5]` or `Name[a][b]`.
static FOOTNOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\[[0-9A-Za-z ]+\])+$").expect("footnote regex should parse"));

async fn get_text(client: &Client, url: &Url) -> Result<String> {
    debug!("fetching {}", url);
    Ok(client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("non-success status from {}", url))?
        .text()
        .await
        .with_context(|| format!("reading body from {}", url))?)
}

/// Fetch the raw markup of a document, retrying transient transport errors
/// with exponential backoff. Exhausted retries surface as SourceUnavailable.
pub async fn fetch_document(client: &Client, url: &Url) -> Result<String> {
    let mut attempts = 0;
    loop {
        match get_text(client, url).await {
            Ok(text) => return Ok(text),
            Err(e) if attempts < MAX_RETRIES => {
                attempts += 1;
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempts - 1);
                warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "retrying fetch");
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                return Err(EtlError::SourceUnavailable(format!("{url}: {e:#}")).into());
            }
        }
    }
}

/// Locate the first `<table>` that follows, in document order, the first
/// element whose own text equals `marker`, and materialize it.
///
/// The table's first row supplies the column names; cells are cleaned
/// (whitespace collapsed, footnote markers stripped) and parsed as numbers
/// where unambiguous, with empty or dash cells becoming Null.
pub fn find_table_after(html: &str, marker: &str) -> Result<Table> {
    let document = Html::parse_document(html);
    let mut seen_marker = false;

    for node in document.root_element().descendants() {
        let element = match ElementRef::wrap(node) {
            Some(e) => e,
            None => continue,
        };
        if !seen_marker {
            if clean_text(&element.text().collect::<String>()) == marker {
                seen_marker = true;
            }
            continue;
        }
        if element.value().name() == "table" {
            return materialize_table(element);
        }
    }

    let detail = if seen_marker {
        format!("no table follows marker `{marker}`")
    } else {
        format!("marker `{marker}` not found in document")
    };
    Err(EtlError::SchemaMismatch(detail).into())
}

/// Run the full extraction stage against markup already in hand.
pub fn extract_from_document(html: &str, marker: &str, audit: &AuditLog) -> Result<Table> {
    let table = find_table_after(html, marker)?;
    debug!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "extracted table"
    );
    audit.log("Data extraction complete. Initiating Transformation process");
    Ok(table)
}

fn materialize_table(table: ElementRef) -> Result<Table> {
    let rows = table_rows(table);
    let mut rows = rows.into_iter();

    let header_row = rows
        .next()
        .ok_or_else(|| EtlError::SchemaMismatch("table has no rows".to_string()))?;
    let header: Vec<String> = row_cells(header_row)
        .into_iter()
        .map(|cell| clean_text(&cell.text().collect::<String>()))
        .collect();

    let mut out = Table::new(header)?;
    for row in rows {
        let values: Vec<Value> = row_cells(row)
            .into_iter()
            .map(|cell| parse_cell(&cell.text().collect::<String>()))
            .collect();
        out.push_row(values)?;
    }
    Ok(out)
}

/// Direct rows of one table, skipping rows of any nested table.
fn table_rows(table: ElementRef) -> Vec<ElementRef> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn row_cells(row: ElementRef) -> Vec<ElementRef> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "th" | "td"))
        .collect()
}

/// Collapse whitespace (including non-breaking spaces) and strip trailing
/// footnote markers.
fn clean_text(raw: &str) -> String {
    let collapsed = raw
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    FOOTNOTES.replace(&collapsed, "").trim().to_string()
}

fn parse_cell(raw: &str) -> Value {
    let cleaned = clean_text(raw);
    if cleaned.is_empty() || cleaned == "-" || cleaned == "\u{2014}" || cleaned == "\u{2013}" {
        return Value::Null;
    }
    match cleaned.replace(',', "").parse::<f64>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::Text(cleaned),
    }
}
