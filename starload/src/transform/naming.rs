//! Fact table naming from source filenames.
//!
//! A filename stem must match the naming pattern, and the pattern's `table`
//! capture becomes the fact table name. The default takes the component after
//! the first hyphen: `20240101-loans.csv` → `loans`.

use std::path::Path;

use regex::Regex;

use crate::error::{ConfigError, ConfigResult, SchemaError, SchemaResult};

/// Default filename pattern.
pub const DEFAULT_TABLE_NAME_PATTERN: &str = r"^[^-]+-(?P<table>[^-]+)";

/// Compiled filename naming convention.
#[derive(Debug, Clone)]
pub struct TableNaming {
    pattern: Regex,
}

impl TableNaming {
    /// Compile a pattern. It must contain a named capture `table`.
    pub fn new(pattern: &str) -> ConfigResult<Self> {
        let pattern =
            Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;

        if !pattern.capture_names().any(|name| name == Some("table")) {
            return Err(ConfigError::InvalidPattern(format!(
                "'{}' has no named capture 'table'",
                pattern.as_str()
            )));
        }

        Ok(Self { pattern })
    }

    /// Derive the fact table name for a source file.
    pub fn table_name(&self, path: &Path) -> SchemaResult<String> {
        let unparsable = || SchemaError::UnparsableTableName {
            path: path.to_path_buf(),
        };

        let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(unparsable)?;

        let name = self
            .pattern
            .captures(stem)
            .and_then(|caps| caps.name("table"))
            .map(|m| m.as_str().trim())
            .filter(|name| !name.is_empty())
            .ok_or_else(unparsable)?;

        Ok(name.to_string())
    }
}

impl Default for TableNaming {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_TABLE_NAME_PATTERN)
                .expect("default table name pattern is valid"),
        }
    }
}
