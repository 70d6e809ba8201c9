//! Loader: append dimension and fact tables to a destination.
//!
//! Tables are converted to [`DestinationTable`]s, which always lead with an
//! explicit `id` column holding the row position (the surrogate key, for
//! dimension tables), and handed one by one to a [`TableSink`].
//!
//! Loading is append-only and has no cross-table transaction: when a table
//! fails, the tables written before it stay written.

pub mod memory;
pub mod postgres;

pub use memory::MemorySink;
pub use postgres::{ColumnType, PostgresSink};

use serde::Serialize;

use crate::error::LoadResult;
use crate::logs::{log_info, log_info_indent, log_success};
use crate::models::CellValue;
use crate::transform::{DimensionTable, FactTable};

/// Identity column carried by every destination table.
pub const ID_COLUMN: &str = "id";

/// A table as written to the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationTable {
    /// Lower-cased destination table name
    pub name: String,
    /// `id` first, then the data columns
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl DestinationTable {
    /// `id, <column>` rows, one per surrogate key.
    pub fn from_dimension(dimension: &DimensionTable) -> Self {
        let name = dimension.name();
        let rows = dimension
            .entries()
            .map(|(key, value)| vec![CellValue::Int(key), value.clone()])
            .collect();

        Self {
            columns: vec![ID_COLUMN.to_string(), name.clone()],
            name,
            rows,
        }
    }

    /// `id` plus the fact columns, `id` being the row position.
    pub fn from_fact(fact: &FactTable) -> Self {
        let mut columns = Vec::with_capacity(fact.table.columns().len() + 1);
        columns.push(ID_COLUMN.to_string());
        columns.extend(fact.table.columns().iter().cloned());

        let rows = fact
            .table
            .rows()
            .iter()
            .enumerate()
            .map(|(position, row)| {
                let mut out = Vec::with_capacity(row.len() + 1);
                out.push(CellValue::Int(position as i64));
                out.extend(row.iter().cloned());
                out
            })
            .collect();

        Self {
            name: fact.name.to_lowercase(),
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A destination that accepts appended tables.
#[allow(async_fn_in_trait)]
pub trait TableSink {
    /// Append every row of `table` to the destination table of the same name,
    /// creating it when absent. Returns the number of rows written.
    async fn append(&mut self, table: &DestinationTable) -> LoadResult<u64>;
}

/// Rows written for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoad {
    pub table: String,
    pub rows: u64,
}

/// Append tables in order, stopping at the first failure.
pub async fn load_tables<S: TableSink>(
    sink: &mut S,
    tables: &[DestinationTable],
) -> LoadResult<Vec<TableLoad>> {
    let mut loaded = Vec::with_capacity(tables.len());
    for table in tables {
        let rows = sink.append(table).await?;
        log_info_indent(format!("{}: {} row(s) appended", table.name, rows), 1);
        loaded.push(TableLoad {
            table: table.name.clone(),
            rows,
        });
    }
    Ok(loaded)
}

/// What a load wrote, per phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub dimensions: Vec<TableLoad>,
    pub facts: Vec<TableLoad>,
}

impl LoadReport {
    pub fn total_rows(&self) -> u64 {
        self.dimensions
            .iter()
            .chain(&self.facts)
            .map(|t| t.rows)
            .sum()
    }
}

/// Load dimension tables, then fact tables.
///
/// Fact tables are not attempted if any dimension table fails.
pub async fn load_star_schema<S: TableSink>(
    sink: &mut S,
    dimensions: &[DestinationTable],
    facts: &[DestinationTable],
) -> LoadResult<LoadReport> {
    log_info(format!("💾 Loading {} dimension table(s)...", dimensions.len()));
    let dimensions = load_tables(sink, dimensions).await?;

    log_info(format!("💾 Loading {} fact table(s)...", facts.len()));
    let facts = load_tables(sink, facts).await?;

    let report = LoadReport { dimensions, facts };
    log_success(format!("{} row(s) loaded", report.total_rows()));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use crate::models::Table;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn fact() -> FactTable {
        let mut table = Table::new(vec!["Gender".into(), "Amount".into()]);
        table.push_row(vec![CellValue::Int(1), CellValue::Int(95)]);
        table.push_row(vec![CellValue::Int(0), CellValue::Null]);
        FactTable {
            name: "Train".into(),
            source: PathBuf::from("loan-Train.csv"),
            table,
            unmatched: HashMap::new(),
        }
    }

    #[test]
    fn test_from_dimension() {
        let dim = DimensionTable::from_values("Gender", &[text("Male"), text("Female")]);
        let dest = DestinationTable::from_dimension(&dim);

        assert_eq!(dest.name, "gender");
        assert_eq!(dest.columns, vec!["id", "gender"]);
        assert_eq!(
            dest.rows,
            vec![
                vec![CellValue::Int(0), text("Male")],
                vec![CellValue::Int(1), text("Female")],
            ]
        );
    }

    #[test]
    fn test_from_fact_adds_position_id() {
        let dest = DestinationTable::from_fact(&fact());

        assert_eq!(dest.name, "train");
        assert_eq!(dest.columns, vec!["id", "Gender", "Amount"]);
        assert_eq!(dest.rows[0][0], CellValue::Int(0));
        assert_eq!(dest.rows[1][0], CellValue::Int(1));
        assert_eq!(dest.rows[1][1], CellValue::Int(0));
        assert_eq!(dest.rows[1][2], CellValue::Null);
    }

    #[tokio::test]
    async fn test_dimensions_loaded_before_facts() {
        let dim = DimensionTable::from_values("Gender", &[text("Male"), text("Female")]);
        let dims = vec![DestinationTable::from_dimension(&dim)];
        let facts = vec![DestinationTable::from_fact(&fact())];

        let mut sink = MemorySink::new();
        let report = load_star_schema(&mut sink, &dims, &facts).await.unwrap();

        assert_eq!(sink.append_order(), &["gender", "train"]);
        assert_eq!(report.total_rows(), 4);
        assert_eq!(report.facts[0], TableLoad { table: "train".into(), rows: 2 });
    }

    #[tokio::test]
    async fn test_failed_dimension_skips_facts() {
        let gender = DimensionTable::from_values("Gender", &[text("Male")]);
        let married = DimensionTable::from_values("Married", &[text("Yes")]);
        let dims = vec![
            DestinationTable::from_dimension(&gender),
            DestinationTable::from_dimension(&married),
        ];
        let facts = vec![DestinationTable::from_fact(&fact())];

        let mut sink = MemorySink::new().failing_on("married");
        let err = load_star_schema(&mut sink, &dims, &facts).await.unwrap_err();

        assert!(matches!(err, LoadError::Rejected { ref table, .. } if table == "married"));
        // no rollback of what was already written
        assert_eq!(sink.table("gender").unwrap().len(), 1);
        assert!(sink.table("train").is_none());
    }
}
