// src/table.rs

use std::fmt;

use crate::error::EtlError;

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Null,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Rendering used for both terminal display and the CSV sink.
    pub fn render(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(v) => format!("{v}"),
            Value::Null => String::new(),
        }
    }
}

/// Ordered rows sharing one ordered header. Every row has exactly one cell
/// per header column; row order is preserved end-to-end.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table. Column names must be unique.
    pub fn new(header: Vec<String>) -> Result<Self, EtlError> {
        for (i, name) in header.iter().enumerate() {
            if header[..i].contains(name) {
                return Err(EtlError::SchemaMismatch(format!(
                    "duplicate column name `{name}`"
                )));
            }
        }
        Ok(Table {
            header,
            rows: Vec::new(),
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.header.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|c| c == name)
    }

    /// Append one row. The row width must match the header.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), EtlError> {
        if row.len() != self.header.len() {
            return Err(EtlError::SchemaMismatch(format!(
                "row {} has {} cells, expected {}",
                self.rows.len(),
                row.len(),
                self.header.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append a new column on the right, one value per existing row.
    pub fn push_column(&mut self, name: String, values: Vec<Value>) -> Result<(), EtlError> {
        if self.column_index(&name).is_some() {
            return Err(EtlError::SchemaMismatch(format!(
                "duplicate column name `{name}`"
            )));
        }
        if values.len() != self.rows.len() {
            return Err(EtlError::SchemaMismatch(format!(
                "column `{name}` has {} values, expected {}",
                values.len(),
                self.rows.len()
            )));
        }
        self.header.push(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // column widths over header + rendered cells, plus a row-index gutter
        let index_width = self.rows.len().saturating_sub(1).to_string().len();
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.render().len());
            }
        }

        write!(f, "{:index_width$}", "")?;
        for (name, &width) in self.header.iter().zip(&widths) {
            write!(f, "  {name:width$}")?;
        }
        writeln!(f)?;

        for (i, row) in self.rows.iter().enumerate() {
            write!(f, "{i:index_width$}")?;
            for (cell, &width) in row.iter().zip(&widths) {
                write!(f, "  {:width$}", cell.render())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
