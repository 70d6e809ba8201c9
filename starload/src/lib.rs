//! # Starload - flat CSV files to a star schema
//!
//! Starload reads a set of delimited files that share a schema, pulls the
//! distinct values of chosen columns into dimension tables with integer
//! surrogate keys, rewrites each file into a fact table referencing those keys,
//! and appends everything to a relational store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV Files  │────▶│   Reader    │────▶│  Transform  │────▶│   Loader    │
//! │  (any enc)  │     │  (unified)  │     │ (dims/facts)│     │ (Postgres)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use starload::{run, EtlConfig, MemorySink};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = EtlConfig::new(
//!         vec!["data/loan-train.csv".into(), "data/loan-test.csv".into()],
//!         vec!["Gender".into(), "Married".into()],
//!     );
//!     let mut sink = MemorySink::new();
//!     let summary = run(&config, &mut sink).await.unwrap();
//!     println!("Loaded {} rows", summary.load.total_rows());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per stage
//! - [`config`] - Explicit run configuration
//! - [`acquire`] - Locating downloaded data files
//! - [`reader`] - CSV reading with encoding and delimiter detection
//! - [`models`] - Cells, column types and in-memory tables
//! - [`transform`] - Dimension extraction and fact rewriting
//! - [`load`] - Destination sinks
//! - [`pipeline`] - End-to-end runs
//! - [`logs`] - Progress log broadcasting

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod config;

// Input
pub mod acquire;
pub mod reader;

// Transformation
pub mod transform;

// Output
pub mod load;

// Orchestration
pub mod logs;
pub mod pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConfigResult, EtlError, EtlResult, InputError, InputResult, LoadError,
    LoadResult, SchemaError, SchemaResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{CellValue, ColumnKind, Schema, Table};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{parse_delimiter, ConfigOverrides, ConnectionDescriptor, EtlConfig};

// =============================================================================
// Re-exports - Reading
// =============================================================================

pub use acquire::resolve_datafiles;
pub use reader::{
    decode_content, detect_delimiter, detect_encoding, parse_table, read_table, read_unified,
    ReaderOptions,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    build_fact_tables, extract_dimensions, plan_table_names, rewrite_table, DimensionTable,
    Dimensions, FactTable, TableNaming,
};

// =============================================================================
// Re-exports - Load
// =============================================================================

pub use load::{
    load_star_schema, DestinationTable, LoadReport, MemorySink, PostgresSink, TableLoad,
    TableSink,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{run, run_to_database, transform, RunSummary, Transformed};
