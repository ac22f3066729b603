//! Rebuild per-side tables from a record pair file.
//!
//! Column-type inference needs every value of a column at once, so the
//! whole file is materialized: one table for the left records, one for the
//! right records, and the labels.

use std::path::Path;

use tracing::debug;

use super::types::InjectionError;
use crate::record::{SerializedPair, SerializedRecord};
use crate::services::column_type::ColumnSample;

/// Rows of one side of a pair file. The first row fixes the column set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SideTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a record, aligned to this table's columns.
    ///
    /// Columns the record lacks become empty cells; columns the table lacks
    /// are dropped.
    pub fn push(&mut self, record: &SerializedRecord, line: usize) {
        if self.rows.is_empty() {
            self.columns = record.columns().map(String::from).collect();
        }

        let row = self
            .columns
            .iter()
            .map(|col| match record.value(col) {
                Some(value) => value.to_string(),
                None => {
                    debug!("line {}: column {:?} missing, using empty value", line, col);
                    String::new()
                }
            })
            .collect();

        if let Some(extra) = record.columns().find(|c| !self.columns.iter().any(|k| k == c)) {
            debug!("line {}: column {:?} not in the first row, dropped", line, extra);
        }

        self.rows.push(row);
    }

    /// One sample per column, values in row order.
    pub fn column_samples(&self) -> Vec<ColumnSample> {
        self.columns
            .iter()
            .enumerate()
            .map(|(c, name)| ColumnSample {
                name: name.clone(),
                values: self.rows.iter().map(|row| row[c].clone()).collect(),
            })
            .collect()
    }
}

/// Left table, right table and labels of a pair file, row-aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairTables {
    pub left: SideTable,
    pub right: SideTable,
    pub labels: Vec<i64>,
}

impl PairTables {
    /// Strictly parse every line. Any malformed line aborts with its
    /// 1-based line number.
    pub fn from_text(text: &str) -> Result<Self, InjectionError> {
        let mut tables = PairTables::default();

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let pair = SerializedPair::parse(line).map_err(|source| {
                InjectionError::MalformedLine {
                    line: line_no,
                    source,
                }
            })?;
            tables.left.push(&pair.left, line_no);
            tables.right.push(&pair.right, line_no);
            tables.labels.push(pair.label);
        }

        Ok(tables)
    }

    pub async fn read(path: &Path) -> Result<Self, InjectionError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(InjectionError::io(path))?;
        Self::from_text(&text)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
