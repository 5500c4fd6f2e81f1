//! JSON-lines ingestion of raw record files.
//!
//! Ingestion is three steps:
//! - resolve the family's glob pattern under the input root and sort the
//!   matches, so each file gets a stable partition ordinal;
//! - read every file through [`crate::storage`];
//! - parse the files in parallel on rayon, one JSON object per line, and
//!   concatenate the results in file order.
//!
//! Malformed lines either abort ingestion (the default) or are skipped and
//! counted, depending on [`MalformedRecordPolicy`].

use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::records::Sourced;
use crate::storage::{self, StorageError, StorageLocation};
use crate::transform::ids::MAX_PARTITION;

/// Which raw record family a file set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFamily {
    /// Catalog ("song") metadata records.
    Catalog,
    /// Activity ("log") event records.
    Activity,
}

impl fmt::Display for RecordFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFamily::Catalog => f.write_str("catalog"),
            RecordFamily::Activity => f.write_str("activity"),
        }
    }
}

/// What to do with a line that does not parse against the declared schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedRecordPolicy {
    /// Abort ingestion on the first malformed line.
    #[default]
    Fail,
    /// Log and drop malformed lines, counting them in the run report.
    Skip,
}

/// Errors raised while ingesting raw records.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum IngestError {
    /// Listing or reading input files failed.
    #[snafu(display("Storage error while reading {family} input: {source}"))]
    Storage {
        /// Record family being read.
        family: RecordFamily,
        /// Underlying storage error.
        source: StorageError,
    },

    /// The input pattern matched no files.
    #[snafu(display("No {family} input files match '{pattern}' under {root}"))]
    NoInputFiles {
        /// Record family being read.
        family: RecordFamily,
        /// Pattern relative to the input root.
        pattern: String,
        /// Input root.
        root: String,
    },

    /// More input files than the songplay id layout can number.
    #[snafu(display("{count} {family} input files exceed the supported maximum of {max}"))]
    TooManyFiles {
        /// Record family being read.
        family: RecordFamily,
        /// Number of matching files.
        count: usize,
        /// Largest supported file count.
        max: usize,
    },

    /// A line is not a valid record of the declared schema.
    #[snafu(display("Malformed {family} record at {}:{line}: {source}", path.display()))]
    MalformedRecord {
        /// Record family being read.
        family: RecordFamily,
        /// File, relative to the input root.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Convenience alias for ingestion results.
pub type IngestResult<T> = Result<T, IngestError>;

/// Records loaded for one family.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    /// Records in file order, tagged with their file ordinal.
    pub records: Vec<Sourced<T>>,
    /// Number of files read.
    pub files: usize,
    /// Malformed lines dropped under [`MalformedRecordPolicy::Skip`].
    pub skipped: usize,
}

struct ParsedFile<T> {
    records: Vec<T>,
    skipped: usize,
}

/// Parse one file's bytes as JSON lines.
///
/// Blank lines (including a trailing newline) are ignored; `\r\n` endings are
/// accepted.
fn parse_json_lines<T: DeserializeOwned>(
    family: RecordFamily,
    path: &Path,
    bytes: &[u8],
    policy: MalformedRecordPolicy,
) -> IngestResult<ParsedFile<T>> {
    let mut records = Vec::new();
    let mut skipped = 0;

    for (idx, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line = raw_line.trim_ascii();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_slice::<T>(line) {
            Ok(rec) => records.push(rec),
            Err(source) => match policy {
                MalformedRecordPolicy::Fail => {
                    return Err(source).context(MalformedRecordSnafu {
                        family,
                        path: path.to_path_buf(),
                        line: idx + 1,
                    });
                }
                MalformedRecordPolicy::Skip => {
                    warn!(
                        %family,
                        path = %path.display(),
                        line = idx + 1,
                        error = %source,
                        "skipping malformed record"
                    );
                    skipped += 1;
                }
            },
        }
    }

    Ok(ParsedFile { records, skipped })
}

/// Load every record of `family` matching `pattern` under `location`.
///
/// # Errors
/// - [`IngestError::NoInputFiles`] when the pattern matches nothing.
/// - [`IngestError::MalformedRecord`] under [`MalformedRecordPolicy::Fail`].
/// - [`IngestError::Storage`] for listing / read failures.
pub async fn load_records<T>(
    location: &StorageLocation,
    family: RecordFamily,
    pattern: &str,
    policy: MalformedRecordPolicy,
) -> IngestResult<Ingested<T>>
where
    T: DeserializeOwned + Send,
{
    let files = storage::list_matching(location, pattern)
        .await
        .context(StorageSnafu { family })?;

    ensure!(
        !files.is_empty(),
        NoInputFilesSnafu {
            family,
            pattern,
            root: location.display(),
        }
    );

    let max = MAX_PARTITION as usize + 1;
    ensure!(
        files.len() <= max,
        TooManyFilesSnafu {
            family,
            count: files.len(),
            max,
        }
    );

    let mut contents = Vec::with_capacity(files.len());
    for rel in files {
        let bytes = storage::read_all_bytes(location, &rel)
            .await
            .context(StorageSnafu { family })?;
        debug!(%family, path = %rel.display(), bytes = bytes.len(), "read input file");
        contents.push((rel, bytes));
    }

    let parsed = contents
        .par_iter()
        .map(|(rel, bytes)| parse_json_lines::<T>(family, rel, bytes, policy))
        .collect::<IngestResult<Vec<_>>>()?;

    let file_count = parsed.len();
    let mut records = Vec::new();
    let mut skipped = 0;
    for (ordinal, file) in parsed.into_iter().enumerate() {
        // Bounded by MAX_PARTITION above.
        let partition = ordinal as u32;
        skipped += file.skipped;
        records.extend(file.records.into_iter().map(|r| Sourced::new(partition, r)));
    }

    info!(
        %family,
        files = file_count,
        records = records.len(),
        skipped,
        "ingested raw records"
    );

    Ok(Ingested {
        records,
        files: file_count,
        skipped,
    })
}
