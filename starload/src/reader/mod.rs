//! Table Reader: delimited files to in-memory [`Table`]s.
//!
//! Each file is read whole, its encoding and delimiter detected unless
//! configured, then parsed with the `csv` crate. Several files can be
//! concatenated into one unified table.
//!
//! Cells come out untyped: missing markers are null, everything else is the
//! field's text. Column types are decided later by [`crate::models::Schema`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{InputError, InputResult};
use crate::logs::{log_info, log_success, log_warning};
use crate::models::{CellValue, Table};

/// Candidate delimiters, in tie-break order.
const DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// How to read source files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// Field delimiter. Detected from the header line when `None`.
    pub delimiter: Option<char>,
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes with the given encoding label.
///
/// Invalid UTF-8 falls back to Windows-1252, which maps every byte.
/// Returns `None` for an unknown label or undecodable bytes.
pub fn decode_content(bytes: &[u8], encoding: &str) -> Option<String> {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => {
            let (text, _, had_errors) = encoding_rs::UTF_8.decode(bytes);
            if had_errors {
                Some(encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned())
            } else {
                Some(text.into_owned())
            }
        }
        label => {
            let encoding = encoding_rs::Encoding::for_label(label.as_bytes())?;
            let (text, _, had_errors) = encoding.decode(bytes);
            (!had_errors).then(|| text.into_owned())
        }
    }
}

/// Detect the delimiter by counting candidates in the header line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best = ',';
    let mut best_count = 0;
    for sep in DELIMITERS {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best = sep;
        }
    }
    best
}

/// Parse decoded content into a table.
///
/// `path` is only used for error context.
pub fn parse_table(content: &str, delimiter: char, path: &Path) -> InputResult<Table> {
    let csv_err = |source| InputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(InputError::EmptyFile {
            path: path.to_path_buf(),
        });
    }

    let mut seen = HashSet::new();
    for header in &headers {
        if !seen.insert(header.as_str()) {
            return Err(InputError::DuplicateHeader {
                path: path.to_path_buf(),
                column: header.clone(),
            });
        }
    }

    let expected = headers.len();
    let mut table = Table::new(headers);

    for result in reader.records() {
        let record = result.map_err(csv_err)?;
        if record.len() > expected {
            return Err(InputError::RaggedRow {
                path: path.to_path_buf(),
                line: record.position().map(|p| p.line()).unwrap_or(0),
                expected,
                found: record.len(),
            });
        }
        table.push_row(record.iter().map(CellValue::raw).collect());
    }

    Ok(table)
}

/// Read one delimited file.
pub fn read_table(path: &Path, options: &ReaderOptions) -> InputResult<Table> {
    let bytes = std::fs::read(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let encoding = detect_encoding(&bytes);
    let content = decode_content(&bytes, &encoding).ok_or_else(|| InputError::Encoding {
        path: path.to_path_buf(),
        encoding: encoding.clone(),
    })?;

    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(&content));

    let table = parse_table(&content, delimiter, path)?;

    if table.is_empty() {
        log_warning(format!("{} has a header but no rows", path.display()));
    }

    Ok(table)
}

/// Read every file and concatenate them into one unified table.
pub fn read_unified(paths: &[PathBuf], options: &ReaderOptions) -> InputResult<Table> {
    log_info(format!("📖 Reading {} file(s)...", paths.len()));

    let mut tables = Vec::with_capacity(paths.len());
    for path in paths {
        let table = read_table(path, options)?;
        log_info(format!("{}: {} rows", path.display(), table.len()));
        tables.push(table);
    }

    let unified = Table::concat(tables);
    log_success(format!(
        "Unified table: {} rows, {} columns",
        unified.len(),
        unified.columns().len()
    ));
    Ok(unified)
}
