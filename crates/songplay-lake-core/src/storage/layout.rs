//! On-disk layout of a run's output.
//!
//! All functions return *relative* paths; callers join them with the run
//! root [`crate::storage::StorageLocation`]. A run root holds one directory
//! per table, Hive-style `column=value` partition directories below it, and
//! a `_staging/` area used while tables are being written.
//!
//! ```text
//! <output root>/2024-05-01/
//!   songs/year=2000/artist_id=A1/part-00000.snappy.parquet
//!   artists/part-00000.snappy.parquet
//!   _staging/            (only while a table is being replaced)
//! ```

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;

/// Directory under the run root where tables are written before promotion.
pub const STAGING_DIR_NAME: &str = "_staging";

/// Name of the single data file written per partition directory.
pub const PART_FILE_NAME: &str = "part-00000.snappy.parquet";

/// Directory value used for a null partition column.
pub const NULL_PARTITION_VALUE: &str = "__HIVE_DEFAULT_PARTITION__";

/// Format of the date-stamped run directory.
pub const RUN_DATE_FORMAT: &str = "%Y-%m-%d";

/// Value of one partition column for one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionValue {
    /// SQL null.
    Null,
    /// Integer column value.
    Int(i64),
    /// String column value.
    Text(String),
}

impl From<Option<i64>> for PartitionValue {
    fn from(v: Option<i64>) -> Self {
        v.map_or(PartitionValue::Null, PartitionValue::Int)
    }
}

impl From<Option<&str>> for PartitionValue {
    fn from(v: Option<&str>) -> Self {
        v.map_or(PartitionValue::Null, |s| PartitionValue::Text(s.to_string()))
    }
}

impl fmt::Display for PartitionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionValue::Null => f.write_str(NULL_PARTITION_VALUE),
            PartitionValue::Int(v) => write!(f, "{v}"),
            PartitionValue::Text(s) if s.is_empty() => f.write_str(NULL_PARTITION_VALUE),
            PartitionValue::Text(s) => f.write_str(&escape_partition_value(s)),
        }
    }
}

fn needs_escape(c: char) -> bool {
    matches!(
        c,
        '\u{01}'..='\u{1F}'
            | '"'
            | '#'
            | '%'
            | '\''
            | '*'
            | '/'
            | ':'
            | '='
            | '?'
            | '\\'
            | '\u{7F}'
            | '{'
            | '['
            | ']'
            | '^'
    )
}

/// Percent-escape characters that are unsafe inside a partition directory
/// name (`/`, `=`, `%`, `:` and friends).
pub fn escape_partition_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escape(c) {
            out.push_str(&format!("%{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Relative path: `YYYY-MM-DD/`
pub fn run_rel_dir(run_date: NaiveDate) -> PathBuf {
    PathBuf::from(run_date.format(RUN_DATE_FORMAT).to_string())
}

/// Relative path: `<table>/`
pub fn table_rel_dir(table: &str) -> PathBuf {
    PathBuf::from(table)
}

/// Relative path: `_staging/<table>/`
pub fn staging_rel_dir(table: &str) -> PathBuf {
    PathBuf::from(STAGING_DIR_NAME).join(table)
}

/// Relative path: `col1=v1/col2=v2/` (empty for unpartitioned tables).
pub fn partition_rel_dir(columns: &[&str], values: &[PartitionValue]) -> PathBuf {
    columns
        .iter()
        .zip(values)
        .map(|(col, value)| format!("{col}={value}"))
        .collect()
}

/// Relative path of the data file for one partition: `<partition>/part-00000.snappy.parquet`
pub fn part_file_rel_path(partition_dir: &std::path::Path) -> PathBuf {
    partition_dir.join(PART_FILE_NAME)
}
