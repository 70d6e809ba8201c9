//! Postgres destination.
//!
//! One connection is opened per run and reused for every table. Each table is
//! appended inside its own transaction: the table is created when missing,
//! then rows are inserted with bound parameters in chunks that stay under the
//! protocol's bind limit.

use std::time::Duration;

use sqlx::postgres::{PgArguments, PgConnection};
use sqlx::query::Query;
use sqlx::{Connection as _, Postgres};

use super::{DestinationTable, TableSink};
use crate::config::ConnectionDescriptor;
use crate::error::{LoadError, LoadResult};
use crate::logs::log_info;
use crate::models::CellValue;

/// Postgres accepts at most this many bind parameters per statement.
const MAX_BIND_PARAMS: usize = 65_535;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// SQL type of a destination column, inferred from its cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Double,
    Text,
}

impl ColumnType {
    /// Narrowest type holding every non-null cell. All-null columns are text.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a CellValue>) -> Self {
        let mut seen_int = false;
        let mut seen_float = false;

        for cell in cells {
            match cell {
                CellValue::Null => {}
                CellValue::Int(_) => seen_int = true,
                CellValue::Float(_) => seen_float = true,
                CellValue::Text(_) => return Self::Text,
            }
        }

        match (seen_int, seen_float) {
            (_, true) => Self::Double,
            (true, false) => Self::BigInt,
            (false, false) => Self::Text,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::BigInt => "BIGINT",
            Self::Double => "DOUBLE PRECISION",
            Self::Text => "TEXT",
        }
    }
}

/// Column types of a destination table, in column order.
pub fn infer_column_types(table: &DestinationTable) -> Vec<ColumnType> {
    (0..table.columns.len())
        .map(|i| ColumnType::infer(table.rows.iter().map(|row| &row[i])))
        .collect()
}

/// Double-quote an identifier, keeping its case.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn create_table_sql(table: &DestinationTable, types: &[ColumnType]) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .zip(types)
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql()))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&table.name),
        columns.join(", ")
    )
}

/// `INSERT ... VALUES ($1, $2), ($3, $4), ...` for `rows` rows.
pub fn insert_sql(table: &str, columns: &[String], rows: usize) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();

    let mut param = 0;
    let tuples: Vec<String> = (0..rows)
        .map(|_| {
            let placeholders: Vec<String> = columns
                .iter()
                .map(|_| {
                    param += 1;
                    format!("${}", param)
                })
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        column_list.join(", "),
        tuples.join(", ")
    )
}

/// Rows per INSERT so that rows × columns stays within the bind limit.
pub fn rows_per_statement(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).max(1)
}

/// A cell converted to the Rust type bound for its destination column.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    BigInt(Option<i64>),
    Double(Option<f64>),
    Text(Option<String>),
}

/// Convert a cell for a column of type `ty`. Cells that do not fit the
/// column type bind as NULL; inference keeps that to nulls in practice.
pub fn bound_value(cell: &CellValue, ty: ColumnType) -> BoundValue {
    match ty {
        ColumnType::BigInt => BoundValue::BigInt(match cell {
            CellValue::Int(i) => Some(*i),
            _ => None,
        }),
        ColumnType::Double => BoundValue::Double(match cell {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }),
        ColumnType::Text => BoundValue::Text(match cell {
            CellValue::Null => None,
            other => Some(other.to_string()),
        }),
    }
}

fn bind_cell<'q>(
    query: Query<'q, Postgres, PgArguments>,
    cell: &CellValue,
    ty: ColumnType,
) -> Query<'q, Postgres, PgArguments> {
    match bound_value(cell, ty) {
        BoundValue::BigInt(v) => query.bind(v),
        BoundValue::Double(v) => query.bind(v),
        BoundValue::Text(v) => query.bind(v),
    }
}

/// Appends tables to a Postgres database over a single connection.
pub struct PostgresSink {
    conn: PgConnection,
}

impl PostgresSink {
    pub async fn connect(descriptor: &ConnectionDescriptor) -> LoadResult<Self> {
        log_info(format!("🔌 Connecting to {}", descriptor));

        let conn = tokio::time::timeout(CONNECT_TIMEOUT, PgConnection::connect(descriptor.expose()))
            .await
            .map_err(|_| LoadError::Timeout(CONNECT_TIMEOUT))?
            .map_err(LoadError::Connect)?;

        Ok(Self { conn })
    }

    pub async fn close(self) -> LoadResult<()> {
        self.conn.close().await.map_err(LoadError::Connect)
    }
}

impl TableSink for PostgresSink {
    async fn append(&mut self, table: &DestinationTable) -> LoadResult<u64> {
        let write_err = |source| LoadError::Write {
            table: table.name.clone(),
            source,
        };

        let types = infer_column_types(table);
        let mut tx = self.conn.begin().await.map_err(write_err)?;

        sqlx::query::<Postgres>(&create_table_sql(table, &types))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;

        let mut written = 0;
        for chunk in table.rows.chunks(rows_per_statement(table.columns.len())) {
            let sql = insert_sql(&table.name, &table.columns, chunk.len());
            let mut query = sqlx::query::<Postgres>(&sql);
            for row in chunk {
                for (cell, ty) in row.iter().zip(&types) {
                    query = bind_cell(query, cell, *ty);
                }
            }
            written += query
                .execute(&mut *tx)
                .await
                .map_err(write_err)?
                .rows_affected();
        }

        tx.commit().await.map_err(write_err)?;
        Ok(written)
    }
}
