//! Star-schema transformation.
//!
//! - Dimensions: distinct values and surrogate keys per dimension column
//! - Facts: per-file tables rewritten to reference those keys
//! - Naming: fact table names from source filenames

pub mod dimensions;
pub mod facts;
pub mod naming;

pub use dimensions::{extract_dimensions, DimensionTable, Dimensions};
pub use facts::{build_fact_tables, plan_table_names, rewrite_table, FactTable};
pub use naming::{TableNaming, DEFAULT_TABLE_NAME_PATTERN};
