//! Acquisition boundary: locating downloaded data files.
//!
//! Downloading is someone else's job. This module only turns a download
//! directory into an ordered file list, and an unreadable or empty directory
//! is an [`InputError`] rather than an empty, "successful" run.

use std::path::{Path, PathBuf};

use crate::error::{InputError, InputResult};
use crate::logs::log_success;

/// Data file extensions picked up from a directory.
const DATA_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

/// List data files in `dir`, sorted by file name for a stable load order.
pub fn resolve_datafiles(dir: &Path) -> InputResult<Vec<PathBuf>> {
    let io_err = |source| InputError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_data = path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| DATA_EXTENSIONS.contains(&e.to_lowercase().as_str()));
        if is_data {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(InputError::NoDataFiles {
            dir: dir.to_path_buf(),
        });
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    log_success(format!("Found {} data file(s) in {}", files.len(), dir.display()));
    Ok(files)
}
