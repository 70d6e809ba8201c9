//! Fact rewriting.
//!
//! Every source file is read on its own and becomes one [`FactTable`]. In each
//! column that has a dimension table, raw values are swapped in place for
//! their surrogate keys. Other columns pass through untouched.
//!
//! A value that has no entry in its dimension table is left as it was and
//! counted. That only happens when extraction saw different input than the
//! rewriter (for instance a subset of the files), and it leaves a cell that is
//! not a valid foreign key, so it is reported as a warning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use super::dimensions::Dimensions;
use super::naming::TableNaming;
use crate::error::{EtlResult, SchemaError};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::{CellValue, Schema, Table};
use crate::reader::{read_table, ReaderOptions};

/// One source file, rewritten to reference dimension keys.
#[derive(Debug, Clone, PartialEq)]
pub struct FactTable {
    /// Name derived from the source filename
    pub name: String,
    pub source: PathBuf,
    pub table: Table,
    /// Cells left unreplaced per dimension column
    pub unmatched: HashMap<String, usize>,
}

impl FactTable {
    /// Total cells left unreplaced across all dimension columns.
    pub fn unmatched_total(&self) -> usize {
        self.unmatched.values().sum()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "table": self.name.to_lowercase(),
            "source": self.source.display().to_string(),
            "rows": self.table.to_records(),
        })
    }
}

/// Replace dimension values with surrogate keys, in place.
///
/// Dimension columns missing from `table` are skipped. Nulls stay null.
/// Returns the number of non-null cells with no dimension entry, per column.
pub fn rewrite_table(table: &mut Table, dimensions: &Dimensions) -> HashMap<String, usize> {
    let mut unmatched = HashMap::new();

    for dimension in dimensions {
        let Some(index) = table.column_index(dimension.column()) else {
            continue;
        };

        let mut misses = 0;
        for cell in table.column_values_mut(index) {
            if cell.is_null() {
                continue;
            }
            match dimension.key_of(cell) {
                Some(key) => *cell = CellValue::Int(key),
                None => misses += 1,
            }
        }

        if misses > 0 {
            unmatched.insert(dimension.column().to_string(), misses);
        }
    }

    unmatched
}

/// Derive every fact table name up front, rejecting bad or colliding names.
///
/// Names collide when they are equal ignoring case, since destination table
/// names are lower-cased. That holds between two files, and between a file
/// and one of the `dim_columns`, whose dimension table shares the namespace.
pub fn plan_table_names(
    paths: &[PathBuf],
    naming: &TableNaming,
    dim_columns: &[String],
) -> EtlResult<Vec<String>> {
    let mut names = Vec::with_capacity(paths.len());
    let mut seen: HashMap<String, &Path> = HashMap::new();

    for path in paths {
        let name = naming.table_name(path)?;
        let key = name.to_lowercase();

        if let Some(column) = dim_columns.iter().find(|c| c.to_lowercase() == key) {
            return Err(SchemaError::TableNameClash {
                name,
                path: path.clone(),
                column: column.clone(),
            }
            .into());
        }
        if let Some(first) = seen.insert(key, path) {
            return Err(SchemaError::DuplicateTableName {
                name,
                first: first.to_path_buf(),
                second: path.clone(),
            }
            .into());
        }
        names.push(name);
    }

    Ok(names)
}

/// Read each file and rewrite it into a fact table, in file order.
///
/// Cells are typed with `schema`, the one inferred over the unified table, so
/// a value reads the same here as it did during extraction.
pub fn build_fact_tables(
    paths: &[PathBuf],
    dimensions: &Dimensions,
    schema: &Schema,
    naming: &TableNaming,
    options: &ReaderOptions,
) -> EtlResult<Vec<FactTable>> {
    let dim_columns: Vec<String> = dimensions.iter().map(|d| d.column().to_string()).collect();
    let names = plan_table_names(paths, naming, &dim_columns)?;
    log_info(format!("🔁 Rewriting {} fact table(s)...", paths.len()));

    let mut facts = Vec::with_capacity(paths.len());
    for (path, name) in paths.iter().zip(names) {
        let mut table = read_table(path, options)?;
        schema.apply(&mut table);
        let unmatched = rewrite_table(&mut table, dimensions);

        log_info_indent(format!("{} ← {} ({} rows)", name, path.display(), table.len()), 1);
        for (column, count) in &unmatched {
            log_warning(format!(
                "{}: {} value(s) in '{}' have no dimension key and were left as-is",
                name, count, column
            ));
        }

        facts.push(FactTable {
            name,
            source: path.clone(),
            table,
            unmatched,
        });
    }

    log_success(format!("{} fact table(s) ready", facts.len()));
    Ok(facts)
}
