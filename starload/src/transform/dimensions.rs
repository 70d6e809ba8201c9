//! Dimension extraction.
//!
//! Each dimension column of the unified table becomes a [`DimensionTable`]:
//! its distinct non-null values in first-seen order. A value's position is its
//! surrogate key, so identical input in identical file order always yields
//! identical keys.
//!
//! ```text
//! Unified table                 Dimension "gender"
//! ┌────────┬────────┐           ┌────┬────────┐
//! │ Gender │ Amount │           │ id │ gender │
//! ├────────┼────────┤           ├────┼────────┤
//! │ Male   │ 120    │    →      │ 0  │ Male   │
//! │ (null) │ 80     │           │ 1  │ Female │
//! │ Female │ 95     │           └────┴────────┘
//! │ Male   │ 60     │
//! └────────┴────────┘
//! ```

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::error::{SchemaError, SchemaResult};
use crate::logs::{log_info, log_info_indent, log_success};
use crate::models::{CellValue, Table};

/// Distinct values of one source column, keyed by position.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionTable {
    column: String,
    values: Vec<CellValue>,
    keys: HashMap<CellValue, i64>,
}

impl DimensionTable {
    /// Build from a column's cells. Nulls are dropped, repeats keep their first position.
    pub fn from_values<'a, I>(column: impl Into<String>, cells: I) -> Self
    where
        I: IntoIterator<Item = &'a CellValue>,
    {
        let mut values = Vec::new();
        let mut keys = HashMap::new();

        for cell in cells {
            if cell.is_null() || keys.contains_key(cell) {
                continue;
            }
            keys.insert(cell.clone(), values.len() as i64);
            values.push(cell.clone());
        }

        Self {
            column: column.into(),
            values,
            keys,
        }
    }

    /// Source column name, as configured.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Destination table name: the lower-cased column name.
    pub fn name(&self) -> String {
        self.column.to_lowercase()
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Surrogate key of an exact value.
    pub fn key_of(&self, value: &CellValue) -> Option<i64> {
        self.keys.get(value).copied()
    }

    /// Value behind a surrogate key.
    pub fn value_of(&self, key: i64) -> Option<&CellValue> {
        usize::try_from(key).ok().and_then(|i| self.values.get(i))
    }

    /// `(key, value)` pairs in key order.
    pub fn entries(&self) -> impl Iterator<Item = (i64, &CellValue)> {
        self.values.iter().enumerate().map(|(i, v)| (i as i64, v))
    }

    pub fn to_json(&self) -> Value {
        let entries: Vec<Value> = self
            .entries()
            .map(|(id, value)| json!({ "id": id, "value": value.to_json() }))
            .collect();

        json!({
            "table": self.name(),
            "column": self.column,
            "values": entries,
        })
    }
}

/// Dimension tables in configured column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dimensions {
    tables: Vec<DimensionTable>,
}

impl Dimensions {
    pub fn new(tables: Vec<DimensionTable>) -> Self {
        Self { tables }
    }

    /// Dimension table for a source column.
    pub fn get(&self, column: &str) -> Option<&DimensionTable> {
        self.tables.iter().find(|t| t.column == column)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DimensionTable> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl<'a> IntoIterator for &'a Dimensions {
    type Item = &'a DimensionTable;
    type IntoIter = std::slice::Iter<'a, DimensionTable>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}

/// Extract one dimension table per configured column.
///
/// Fails with [`SchemaError::MissingColumn`] if a column is not in `unified`.
pub fn extract_dimensions(unified: &Table, columns: &[String]) -> SchemaResult<Dimensions> {
    log_info(format!("🧩 Extracting {} dimension(s)...", columns.len()));

    let mut tables = Vec::with_capacity(columns.len());
    for column in columns {
        let index = unified
            .column_index(column)
            .ok_or_else(|| SchemaError::MissingColumn(column.clone()))?;

        let table = DimensionTable::from_values(column.as_str(), unified.column_values(index));
        log_info_indent(format!("{} → {} value(s)", column, table.len()), 1);
        tables.push(table);
    }

    log_success(format!("{} dimension table(s) ready", tables.len()));
    Ok(Dimensions::new(tables))
}
