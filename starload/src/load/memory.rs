//! In-memory destination, used for dry runs and tests.

use std::collections::HashSet;

use super::{DestinationTable, TableSink};
use crate::error::{LoadError, LoadResult};

/// Keeps appended tables in memory.
///
/// Appending to an existing table requires identical columns, as a real
/// table would.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Vec<DestinationTable>,
    append_order: Vec<String>,
    fail_on: HashSet<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any append to `table`.
    pub fn failing_on(mut self, table: impl Into<String>) -> Self {
        self.fail_on.insert(table.into());
        self
    }

    pub fn table(&self, name: &str) -> Option<&DestinationTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Tables in creation order.
    pub fn tables(&self) -> &[DestinationTable] {
        &self.tables
    }

    /// Table names in the order appends happened, one entry per append.
    pub fn append_order(&self) -> &[String] {
        &self.append_order
    }
}

impl TableSink for MemorySink {
    async fn append(&mut self, table: &DestinationTable) -> LoadResult<u64> {
        if self.fail_on.contains(&table.name) {
            return Err(LoadError::Rejected {
                table: table.name.clone(),
                message: "configured to fail".to_string(),
            });
        }

        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) if existing.columns != table.columns => {
                return Err(LoadError::Rejected {
                    table: table.name.clone(),
                    message: format!(
                        "columns [{}] do not match existing [{}]",
                        table.columns.join(", "),
                        existing.columns.join(", ")
                    ),
                });
            }
            Some(existing) => existing.rows.extend(table.rows.iter().cloned()),
            None => self.tables.push(table.clone()),
        }

        self.append_order.push(table.name.clone());
        Ok(table.rows.len() as u64)
    }
}
