//! Domain models shared by every pipeline stage.
//!
//! - [`CellValue`] - A single scalar cell (null, integer, float or text)
//! - [`ColumnKind`] / [`Schema`] - Column types, decided once per column
//! - [`Table`] - Ordered columns plus ordered rows of cells
//!
//! Files are read as raw text. Types are inferred afterwards, one column at a
//! time over every row of every file, so a column is either entirely numeric
//! or keeps every cell exactly as written.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

// =============================================================================
// Cell Value
// =============================================================================

/// Raw strings read as null.
const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Plain decimal notation: no sign prefix other than `-`, no leading zeros, no exponent.
static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?$").expect("decimal regex is valid")
});

/// A scalar cell.
///
/// Floats compare and hash by bit pattern, so a `CellValue` can be used as a
/// lookup key. Missing markers never become `Float(NaN)`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Untyped cell for a raw field: null for a missing marker, text otherwise.
    pub fn raw(field: &str) -> Self {
        let field = field.trim();
        if MISSING_MARKERS.contains(&field) {
            Self::Null
        } else {
            Self::Text(field.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// JSON form used by the CLI printers.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

// =============================================================================
// Column Types
// =============================================================================

/// `i64` whose rendering is exactly `raw`.
fn exact_int(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|i| i.to_string() == raw)
}

/// `f64` that renders back to `raw`, ignoring trailing fraction zeros.
fn exact_float(raw: &str) -> Option<f64> {
    if !DECIMAL_RE.is_match(raw) {
        return None;
    }
    let value = raw.parse::<f64>().ok().filter(|f| f.is_finite())?;

    let normalized = if raw.contains('.') {
        raw.trim_end_matches('0').trim_end_matches('.')
    } else {
        raw
    };
    (value.to_string() == normalized).then_some(value)
}

/// Type shared by every cell of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    /// Narrowest kind that keeps every distinct raw value distinct and intact.
    ///
    /// A column is numeric only when every non-null cell is a number written
    /// in plain form, and no two different spellings land on the same number
    /// (`1` next to `1.0`). Anything else, leading zeros included, is text.
    /// A column with no non-null cells is text.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a CellValue>) -> Self {
        let raws: Vec<Cow<'a, str>> = cells
            .into_iter()
            .filter(|c| !c.is_null())
            .map(|c| match c {
                CellValue::Text(s) => Cow::Borrowed(s.as_str()),
                other => Cow::Owned(other.to_string()),
            })
            .collect();

        if raws.is_empty() {
            return Self::Text;
        }
        if raws.iter().all(|r| exact_int(r).is_some()) {
            return Self::Integer;
        }

        let mut spellings: HashMap<u64, &str> = HashMap::new();
        for raw in &raws {
            let Some(value) = exact_float(raw) else {
                return Self::Text;
            };
            match spellings.insert(value.to_bits(), raw.as_ref()) {
                Some(previous) if previous != raw.as_ref() => return Self::Text,
                _ => {}
            }
        }
        Self::Float
    }

    /// Convert a raw text cell to this kind, in place.
    pub fn apply(self, cell: &mut CellValue) {
        let typed = match (self, &*cell) {
            (Self::Integer, CellValue::Text(s)) => s.parse().ok().map(CellValue::Int),
            (Self::Float, CellValue::Text(s)) => s.parse().ok().map(CellValue::Float),
            _ => None,
        };
        if let Some(typed) = typed {
            *cell = typed;
        }
    }
}

/// Column kinds by column name, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    kinds: Vec<(String, ColumnKind)>,
}

impl Schema {
    /// Infer a kind for every column of a raw table.
    pub fn infer(table: &Table) -> Self {
        let kinds = table
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), ColumnKind::infer(table.column_values(i))))
            .collect();
        Self { kinds }
    }

    pub fn kind_of(&self, column: &str) -> Option<ColumnKind> {
        self.kinds
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, kind)| *kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnKind)> {
        self.kinds.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Type the cells of `table`. Columns unknown to the schema stay text.
    pub fn apply(&self, table: &mut Table) {
        let kinds: Vec<Option<ColumnKind>> =
            table.columns.iter().map(|c| self.kind_of(c)).collect();

        for row in &mut table.rows {
            for (cell, kind) in row.iter_mut().zip(&kinds) {
                if let Some(kind) = kind {
                    kind.apply(cell);
                }
            }
        }
    }
}

// =============================================================================
// Table
// =============================================================================

/// An in-memory table: ordered columns and rows holding one cell per column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Create an empty table with the given header.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row. Short rows are padded with nulls, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Null);
        self.rows.push(row);
    }

    /// Cells of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &CellValue> {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Mutable cells of one column, top to bottom.
    pub fn column_values_mut(&mut self, index: usize) -> impl Iterator<Item = &mut CellValue> {
        self.rows.iter_mut().map(move |row| &mut row[index])
    }

    /// Concatenate tables row-wise.
    ///
    /// Columns are the union of all headers in first-seen order. A column
    /// missing from one table is null for that table's rows.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for col in &table.columns {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
        }

        let mut unified = Table::new(columns);
        for table in tables {
            let mapping: Vec<Option<usize>> = unified
                .columns
                .iter()
                .map(|c| table.column_index(c))
                .collect();

            for row in table.rows {
                let cells = mapping
                    .iter()
                    .map(|idx| idx.map(|i| row[i].clone()).unwrap_or(CellValue::Null))
                    .collect();
                unified.rows.push(cells);
            }
        }
        unified
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(col, cell)| (col.clone(), cell.to_json()))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
