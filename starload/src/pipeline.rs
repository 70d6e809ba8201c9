//! High-level pipeline API: files in, star schema out.
//!
//! ```text
//! files ─▶ read_unified ─▶ extract_dimensions ─▶ build_fact_tables ─▶ load
//!                               │                      ▲
//!                               └──── dimensions ──────┘
//! ```
//!
//! Every step runs to completion before the next starts, and the first error
//! aborts the run. Nothing already written to the destination is undone.
//!
//! # Example
//!
//! ```rust,ignore
//! use starload::{run_to_database, EtlConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EtlConfig::from_env()?;
//!     let summary = run_to_database(&config).await?;
//!     println!("Loaded {} rows", summary.load.total_rows());
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::EtlConfig;
use crate::error::{EtlError, EtlResult};
use crate::load::{load_star_schema, DestinationTable, LoadReport, PostgresSink, TableSink};
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::models::Schema;
use crate::reader::read_unified;
use crate::transform::{
    build_fact_tables, extract_dimensions, plan_table_names, Dimensions, FactTable,
};

/// Output of the transform phase.
#[derive(Debug, Clone)]
pub struct Transformed {
    /// Column kinds inferred over every input file
    pub schema: Schema,
    pub dimensions: Dimensions,
    pub facts: Vec<FactTable>,
}

impl Transformed {
    pub fn dimension_tables(&self) -> Vec<DestinationTable> {
        self.dimensions
            .iter()
            .map(DestinationTable::from_dimension)
            .collect()
    }

    pub fn fact_tables(&self) -> Vec<DestinationTable> {
        self.facts.iter().map(DestinationTable::from_fact).collect()
    }

    /// Fact cells that kept their raw value for lack of a dimension key.
    pub fn unmatched_cells(&self) -> usize {
        self.facts.iter().map(FactTable::unmatched_total).sum()
    }
}

/// What a run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: usize,
    pub unmatched_cells: usize,
    pub load: LoadReport,
}

fn report_failure(run_id: Uuid) -> impl Fn(EtlError) -> EtlError {
    move |err| {
        log_error(format!("Run {} failed: {}", run_id, err));
        err
    }
}

/// Read, extract dimensions and rewrite facts. No destination involved.
///
/// Destination table names are checked before any file is read.
pub fn transform(config: &EtlConfig) -> EtlResult<Transformed> {
    config.validate()?;
    let naming = config.table_naming()?;
    let options = config.reader_options();
    plan_table_names(&config.datafiles, &naming, &config.dim_columns)?;

    let mut unified = read_unified(&config.datafiles, &options)?;
    let schema = Schema::infer(&unified);
    schema.apply(&mut unified);

    let dimensions = extract_dimensions(&unified, &config.dim_columns)?;
    drop(unified);

    let facts = build_fact_tables(&config.datafiles, &dimensions, &schema, &naming, &options)?;

    Ok(Transformed {
        schema,
        dimensions,
        facts,
    })
}

/// Load a finished transform: dimension tables first, then fact tables.
pub async fn load<S: TableSink>(sink: &mut S, transformed: &Transformed) -> EtlResult<LoadReport> {
    let dimensions = transformed.dimension_tables();
    let facts = transformed.fact_tables();
    Ok(load_star_schema(sink, &dimensions, &facts).await?)
}

/// Transform and load into any sink.
pub async fn run<S: TableSink>(config: &EtlConfig, sink: &mut S) -> EtlResult<RunSummary> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    log_info(format!("🚀 Run {} over {} file(s)", run_id, config.datafiles.len()));

    let transformed = transform(config).map_err(report_failure(run_id))?;
    let unmatched_cells = transformed.unmatched_cells();
    if unmatched_cells > 0 {
        log_warning(format!(
            "{} fact cell(s) have no dimension key; their foreign keys will not resolve",
            unmatched_cells
        ));
    }

    let report = load(sink, &transformed)
        .await
        .map_err(report_failure(run_id))?;

    let summary = RunSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        files: config.datafiles.len(),
        unmatched_cells,
        load: report,
    };
    log_success(format!("✨ Run {} done", run_id));
    Ok(summary)
}

/// Transform and load into the configured Postgres destination.
///
/// The destination must be configured; that is checked before any file is read.
/// The connection is opened once, after the transform succeeds.
pub async fn run_to_database(config: &EtlConfig) -> EtlResult<RunSummary> {
    config.validate()?;
    let destination = config.destination()?;

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    log_info(format!("🚀 Run {} over {} file(s)", run_id, config.datafiles.len()));

    let transformed = transform(config).map_err(report_failure(run_id))?;

    let mut sink = PostgresSink::connect(destination)
        .await
        .map_err(|e| report_failure(run_id)(e.into()))?;
    let report = load(&mut sink, &transformed)
        .await
        .map_err(report_failure(run_id))?;
    sink.close().await?;
    log_success(format!("✨ Run {} done", run_id));

    Ok(RunSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        files: config.datafiles.len(),
        unmatched_cells: transformed.unmatched_cells(),
        load: report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, EtlError, InputError, SchemaError};
    use crate::load::MemorySink;
    use crate::models::CellValue;
    use std::collections::HashSet;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::{tempdir, TempDir};

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Two parts of one fact stream; `Male` is seen before `Female`.
    fn two_parts() -> (TempDir, Vec<PathBuf>) {
        let dir = tempdir().unwrap();
        let part1 = write(
            dir.path(),
            "1-part1.csv",
            "Gender,Married,Amount\nMale,Yes,120\n,No,80\nFemale,Yes,95\n",
        );
        let part2 = write(
            dir.path(),
            "2-part2.csv",
            "Gender,Married,Amount\nFemale,No,60\nMale,,70.5\n",
        );
        (dir, vec![part1, part2])
    }

    fn config(files: Vec<PathBuf>, dims: &[&str]) -> EtlConfig {
        EtlConfig::new(files, dims.iter().map(|d| d.to_string()).collect())
    }

    #[test]
    fn test_gender_scenario() {
        let (_dir, files) = two_parts();
        let transformed = transform(&config(files, &["Gender"])).unwrap();

        let gender = transformed.dimensions.get("Gender").unwrap();
        assert_eq!(gender.name(), "gender");
        assert_eq!(gender.values(), &[text("Male"), text("Female")]);

        let part1 = &transformed.facts[0];
        assert_eq!(part1.name, "part1");
        let genders: Vec<&CellValue> = part1.table.column_values(0).collect();
        assert_eq!(
            genders,
            vec![&CellValue::Int(0), &CellValue::Null, &CellValue::Int(1)]
        );
        // Amount untouched, typed as a float column across both files
        let amounts: Vec<&CellValue> = transformed.facts[1].table.column_values(2).collect();
        assert_eq!(amounts, vec![&CellValue::Float(60.0), &CellValue::Float(70.5)]);
        // Married is not a dimension here
        assert_eq!(part1.table.rows()[0][1], text("Yes"));
    }

    #[test]
    fn test_fact_row_counts_match_sources() {
        let (_dir, files) = two_parts();
        let transformed = transform(&config(files, &["Gender", "Married"])).unwrap();

        assert_eq!(transformed.facts[0].table.len(), 3);
        assert_eq!(transformed.facts[1].table.len(), 2);
    }

    #[test]
    fn test_identical_runs_assign_identical_keys() {
        let (_dir, files) = two_parts();
        let cfg = config(files, &["Married", "Gender"]);

        let first = transform(&cfg).unwrap();
        let second = transform(&cfg).unwrap();

        assert_eq!(first.dimensions, second.dimensions);
        assert_eq!(first.facts, second.facts);
    }

    #[test]
    fn test_round_trip_covers_every_distinct_value() {
        let (_dir, files) = two_parts();
        let cfg = config(files.clone(), &["Gender", "Married"]);
        let transformed = transform(&cfg).unwrap();
        let mut unified = read_unified(&files, &cfg.reader_options()).unwrap();
        transformed.schema.apply(&mut unified);

        for dim in &transformed.dimensions {
            let idx = unified.column_index(dim.column()).unwrap();
            let expected: HashSet<&CellValue> =
                unified.column_values(idx).filter(|v| !v.is_null()).collect();

            let mut dereferenced = HashSet::new();
            for fact in &transformed.facts {
                let col = fact.table.column_index(dim.column()).unwrap();
                for cell in fact.table.column_values(col) {
                    if let CellValue::Int(key) = cell {
                        dereferenced.insert(dim.value_of(*key).unwrap());
                    }
                }
            }

            assert_eq!(expected, dereferenced);
        }
    }

    #[test]
    fn test_no_dimensions_leaves_facts_as_read() {
        let (_dir, files) = two_parts();
        let cfg = config(files.clone(), &[]);
        let transformed = transform(&cfg).unwrap();

        assert!(transformed.dimensions.is_empty());
        for (fact, path) in transformed.facts.iter().zip(&files) {
            let mut source = crate::reader::read_table(path, &cfg.reader_options()).unwrap();
            transformed.schema.apply(&mut source);
            assert_eq!(fact.table, source);
        }
    }

    #[test]
    fn test_value_outside_extraction_left_raw() {
        // extraction sees only part1; part2 has "Other"
        let dir = tempdir().unwrap();
        let part1 = write(dir.path(), "1-part1.csv", "Gender,Amount\nMale,1\n");
        let part2 = write(dir.path(), "2-part2.csv", "Gender,Amount\nOther,2\nMale,3\n");

        let opts = crate::reader::ReaderOptions::default();
        let unified = read_unified(&[part1.clone()], &opts).unwrap();
        let dims = extract_dimensions(&unified, &["Gender".to_string()]).unwrap();
        let facts = build_fact_tables(
            &[part1, part2],
            &dims,
            &Schema::infer(&unified),
            &crate::transform::TableNaming::default(),
            &opts,
        )
        .unwrap();

        assert_eq!(facts[1].table.rows()[0][0], text("Other"));
        assert_eq!(facts[1].table.rows()[1][0], CellValue::Int(0));
        assert_eq!(facts[1].unmatched.get("Gender"), Some(&1));
    }

    #[test]
    fn test_raw_spellings_survive_the_run() {
        let dir = tempdir().unwrap();
        let part = write(
            dir.path(),
            "1-codes.csv",
            "Code,Zip\n007,02134\n7,ABC\n1,x\n1.0,y\n",
        );
        let transformed = transform(&config(vec![part], &["Code"])).unwrap();

        // four spellings, four keys
        let code = transformed.dimensions.get("Code").unwrap();
        assert_eq!(
            code.values(),
            &[text("007"), text("7"), text("1"), text("1.0")]
        );
        let keys: Vec<&CellValue> = transformed.facts[0].table.column_values(0).collect();
        assert_eq!(
            keys,
            vec![
                &CellValue::Int(0),
                &CellValue::Int(1),
                &CellValue::Int(2),
                &CellValue::Int(3)
            ]
        );

        // pass-through column keeps its leading zero
        assert_eq!(transformed.facts[0].table.rows()[0][1], text("02134"));
    }

    #[tokio::test]
    async fn test_raw_spellings_reach_the_sink() {
        let dir = tempdir().unwrap();
        let part = write(dir.path(), "1-codes.csv", "Code,Zip\n007,02134\n7,ABC\n1,x\n1.0,y\n");
        let mut sink = MemorySink::new();

        run(&config(vec![part], &["Code"]), &mut sink).await.unwrap();

        let code = sink.table("code").unwrap();
        let stored: Vec<String> = code.rows.iter().map(|r| r[1].to_string()).collect();
        assert_eq!(stored, vec!["007", "7", "1", "1.0"]);

        let codes = sink.table("codes").unwrap();
        assert_eq!(codes.rows[0][2], text("02134"));
    }

    #[test]
    fn test_dimension_and_fact_name_clash_fails_before_io() {
        let files = vec![
            PathBuf::from("/nonexistent/1-loans.csv"),
            PathBuf::from("/nonexistent/x-gender.csv"),
        ];
        let err = transform(&config(files, &["Gender"])).unwrap_err();
        assert!(matches!(
            err,
            EtlError::Schema(SchemaError::TableNameClash { .. })
        ));
    }

    #[test]
    fn test_dimension_names_differing_by_case_fail_before_io() {
        let files = vec![PathBuf::from("/nonexistent/1-loans.csv")];
        let err = transform(&config(files, &["Gender", "gender"])).unwrap_err();
        assert!(matches!(
            err,
            EtlError::Config(ConfigError::DuplicateDimColumn(_))
        ));
    }

    #[test]
    fn test_missing_dimension_column_fails() {
        let (_dir, files) = two_parts();
        let err = transform(&config(files, &["Education"])).unwrap_err();
        assert!(matches!(err, EtlError::Schema(SchemaError::MissingColumn(_))));
    }

    #[test]
    fn test_unreadable_file_aborts_run() {
        let (_dir, mut files) = two_parts();
        files.push(PathBuf::from("/nonexistent/3-part3.csv"));
        let err = transform(&config(files, &["Gender"])).unwrap_err();
        assert!(matches!(err, EtlError::Input(InputError::Io { .. })));
    }

    #[test]
    fn test_empty_file_list_rejected_before_io() {
        let err = transform(&config(vec![], &["Gender"])).unwrap_err();
        assert!(matches!(err, EtlError::Config(ConfigError::Empty(_))));
    }

    #[tokio::test]
    async fn test_run_into_memory_sink() {
        let (_dir, files) = two_parts();
        let mut sink = MemorySink::new();

        let summary = run(&config(files, &["Gender", "Married"]), &mut sink)
            .await
            .unwrap();

        assert_eq!(
            sink.append_order(),
            &["gender", "married", "part1", "part2"]
        );
        assert_eq!(summary.files, 2);
        assert_eq!(summary.unmatched_cells, 0);
        assert_eq!(summary.load.total_rows(), 2 + 2 + 3 + 2);

        let gender = sink.table("gender").unwrap();
        assert_eq!(gender.columns, vec!["id", "gender"]);
        assert_eq!(gender.rows[1], vec![CellValue::Int(1), text("Female")]);

        let part2 = sink.table("part2").unwrap();
        assert_eq!(part2.columns, vec!["id", "Gender", "Married", "Amount"]);
        assert_eq!(
            part2.rows[0],
            vec![
                CellValue::Int(0),
                CellValue::Int(1),
                CellValue::Int(1),
                CellValue::Float(60.0)
            ]
        );
        assert_eq!(part2.rows[1][2], CellValue::Null);
    }

    #[tokio::test]
    async fn test_rerun_appends_duplicates() {
        let (_dir, files) = two_parts();
        let cfg = config(files, &["Gender"]);
        let mut sink = MemorySink::new();

        run(&cfg, &mut sink).await.unwrap();
        run(&cfg, &mut sink).await.unwrap();

        assert_eq!(sink.table("gender").unwrap().len(), 4);
        assert_eq!(sink.table("part1").unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_run_to_database_requires_destination() {
        let (_dir, files) = two_parts();
        let err = run_to_database(&config(files, &["Gender"])).await.unwrap_err();
        assert!(matches!(err, EtlError::Config(ConfigError::Missing(_))));
    }
}
