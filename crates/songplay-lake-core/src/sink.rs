//! Partitioned Parquet output for the star-schema tables.
//!
//! Every table is written as a Hive-style directory tree:
//! one Snappy-compressed Parquet file per distinct combination of partition
//! column values, under `<table>/<col>=<value>/...`. Partition columns are
//! carried only in the directory names.
//!
//! Writes go through a [`StagedTable`]: the whole table is produced under
//! `_staging/<table>` by [`stage_table`] and only replaces the previous
//! version when the resulting [`StagedWrite`] is promoted. Callers that
//! publish several tables together stage all of them first.

use std::collections::BTreeMap;

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::storage::layout::{self, PartitionValue};
use crate::storage::{StorageError, StorageLocation, open_output_sink};

pub mod staging;
mod tables;

pub use staging::StagedTable;

/// Errors raised while writing a table.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SinkError {
    /// Storage failure while staging, writing, or promoting files.
    #[snafu(display("Storage error while writing table {table}: {source}"))]
    Storage {
        /// Table being written.
        table: String,
        /// Underlying storage error.
        source: StorageError,
    },

    /// Rows could not be converted into an Arrow record batch.
    #[snafu(display("Arrow error while building table {table}: {source}"))]
    Arrow {
        /// Table being written.
        table: String,
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// The Parquet encoder rejected a batch.
    #[snafu(display("Parquet write error for table {table}: {source}"))]
    ParquetWrite {
        /// Table being written.
        table: String,
        /// Underlying Parquet error.
        source: ParquetError,
    },
}

/// Convenience alias for sink results.
pub type SinkResult<T> = Result<T, SinkError>;

/// A star-schema row type that can be written as a partitioned table.
pub trait StarTable: Sized {
    /// Table directory name.
    const NAME: &'static str;

    /// Partition columns, outermost first. Empty for unpartitioned tables.
    const PARTITION_COLUMNS: &'static [&'static str];

    /// Arrow schema of the columns stored inside the data files.
    fn data_schema() -> SchemaRef;

    /// Values of [`Self::PARTITION_COLUMNS`] for this row.
    fn partition_values(&self) -> Vec<PartitionValue>;

    /// Build a record batch of the data columns for `rows`.
    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError>;
}

/// Outcome of writing one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableWriteSummary {
    /// Rows written.
    pub rows: usize,
    /// Distinct partition directories (1 for an unpartitioned table).
    pub partitions: usize,
    /// Parquet files written.
    pub files: usize,
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

/// Group rows by partition values. `BTreeMap` keeps the file order stable.
fn group_by_partition<T: StarTable>(rows: &[T]) -> BTreeMap<Vec<PartitionValue>, Vec<&T>> {
    let mut groups: BTreeMap<Vec<PartitionValue>, Vec<&T>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.partition_values()).or_default().push(row);
    }
    groups
}

async fn write_partition<T: StarTable>(
    run_root: &StorageLocation,
    rel_path: &std::path::Path,
    rows: &[&T],
) -> SinkResult<()> {
    let batch = T::to_record_batch(rows).context(ArrowSnafu { table: T::NAME })?;

    let mut sink = open_output_sink(run_root, rel_path)
        .await
        .context(StorageSnafu { table: T::NAME })?;

    let mut writer = ArrowWriter::try_new(sink.writer(), batch.schema(), Some(writer_properties()))
        .context(ParquetWriteSnafu { table: T::NAME })?;
    writer
        .write(&batch)
        .context(ParquetWriteSnafu { table: T::NAME })?;
    writer
        .close()
        .context(ParquetWriteSnafu { table: T::NAME })?;

    let bytes = sink
        .finish()
        .await
        .context(StorageSnafu { table: T::NAME })?;

    debug!(
        table = T::NAME,
        path = %rel_path.display(),
        rows = rows.len(),
        bytes,
        "wrote partition file"
    );
    Ok(())
}

/// A fully written table waiting under `_staging` to be promoted.
///
/// Dropping it without calling [`StagedWrite::promote`] discards the staged
/// files and leaves the published table untouched.
#[derive(Debug)]
pub struct StagedWrite {
    table: &'static str,
    staged: StagedTable,
    summary: TableWriteSummary,
}

impl StagedWrite {
    /// Table this staged write belongs to.
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// What was written into the staging area.
    pub fn summary(&self) -> &TableWriteSummary {
        &self.summary
    }

    /// Move the staged files over the published table.
    pub async fn promote(self) -> SinkResult<TableWriteSummary> {
        let table = self.table;
        self.staged
            .promote()
            .await
            .context(StorageSnafu { table })?;

        info!(
            table,
            rows = self.summary.rows,
            partitions = self.summary.partitions,
            files = self.summary.files,
            "table written"
        );
        Ok(self.summary)
    }
}

/// Write `rows` as table `T::NAME` into the staging area under `run_root`.
///
/// Nothing outside `_staging/<table>` is touched until the returned
/// [`StagedWrite`] is promoted. An unpartitioned table always gets exactly
/// one file, even when `rows` is empty, so readers see its schema. A
/// partitioned table with no rows is an empty directory.
pub async fn stage_table<T: StarTable>(
    run_root: &StorageLocation,
    rows: &[T],
) -> SinkResult<StagedWrite> {
    let staged = StagedTable::begin(run_root, T::NAME)
        .await
        .context(StorageSnafu { table: T::NAME })?;

    let mut groups = group_by_partition(rows);
    if T::PARTITION_COLUMNS.is_empty() && groups.is_empty() {
        groups.insert(Vec::new(), Vec::new());
    }

    let mut summary = TableWriteSummary {
        rows: rows.len(),
        ..Default::default()
    };

    for (values, members) in &groups {
        let partition_dir = layout::partition_rel_dir(T::PARTITION_COLUMNS, values);
        let rel_path = staged
            .staged_rel_dir()
            .join(layout::part_file_rel_path(&partition_dir));
        write_partition::<T>(run_root, &rel_path, members).await?;
        summary.partitions += 1;
        summary.files += 1;
    }

    debug!(table = T::NAME, rows = summary.rows, "table staged");
    Ok(StagedWrite {
        table: T::NAME,
        staged,
        summary,
    })
}

/// Stage and immediately promote `rows` as table `T::NAME`, replacing any
/// previous version of the table.
pub async fn write_table<T: StarTable>(
    run_root: &StorageLocation,
    rows: &[T],
) -> SinkResult<TableWriteSummary> {
    stage_table(run_root, rows).await?.promote().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Artist, Track};
    use arrow::array::{Array, Float64Array, StringArray};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::path::Path;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn track(song_id: &str, artist_id: Option<&str>, year: Option<i64>) -> Track {
        Track {
            song_id: Some(song_id.to_string()),
            title: Some(format!("title {song_id}")),
            artist_id: artist_id.map(str::to_string),
            year,
            duration: Some(100.5),
        }
    }

    fn read_batches(path: &Path) -> Result<Vec<RecordBatch>, Box<dyn std::error::Error>> {
        let file = std::fs::File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        Ok(reader.collect::<Result<Vec<_>, _>>()?)
    }

    #[tokio::test]
    async fn partitioned_table_writes_one_file_per_partition() -> TestResult {
        let tmp = TempDir::new()?;
        let run_root = StorageLocation::local(tmp.path());
        let rows = vec![
            track("S1", Some("A1"), Some(2000)),
            track("S2", Some("A1"), Some(2000)),
            track("S3", Some("A2"), Some(0)),
            track("S4", None, None),
        ];

        let summary = write_table(&run_root, &rows).await?;
        assert_eq!(
            summary,
            TableWriteSummary {
                rows: 4,
                partitions: 3,
                files: 3
            }
        );

        let a1 = tmp
            .path()
            .join("songs/year=2000/artist_id=A1/part-00000.snappy.parquet");
        let batches = read_batches(&a1)?;
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 2);
        assert!(batch.schema().field_with_name("year").is_err());
        assert!(batch.schema().field_with_name("artist_id").is_err());
        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or("song_id is not Utf8")?;
        assert_eq!(ids.value(0), "S1");
        assert_eq!(ids.value(1), "S2");
        let durations = batch
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or("duration is not Float64")?;
        assert_eq!(durations.value(0), 100.5);

        assert!(tmp.path().join("songs/year=0/artist_id=A2").is_dir());
        assert!(tmp
            .path()
            .join("songs/year=__HIVE_DEFAULT_PARTITION__/artist_id=__HIVE_DEFAULT_PARTITION__")
            .is_dir());
        assert!(!tmp.path().join("_staging").exists());
        Ok(())
    }

    #[tokio::test]
    async fn rewriting_a_table_drops_stale_partitions() -> TestResult {
        let tmp = TempDir::new()?;
        let run_root = StorageLocation::local(tmp.path());

        write_table(&run_root, &[track("S1", Some("A1"), Some(1999))]).await?;
        write_table(&run_root, &[track("S2", Some("A2"), Some(2001))]).await?;

        assert!(!tmp.path().join("songs/year=1999").exists());
        assert!(tmp.path().join("songs/year=2001/artist_id=A2").is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn empty_unpartitioned_table_still_has_a_file() -> TestResult {
        let tmp = TempDir::new()?;
        let run_root = StorageLocation::local(tmp.path());

        let summary = write_table::<Artist>(&run_root, &[]).await?;
        assert_eq!(summary.files, 1);

        let batches = read_batches(&tmp.path().join("artists/part-00000.snappy.parquet"))?;
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 0);
        Ok(())
    }

    #[tokio::test]
    async fn empty_partitioned_table_is_an_empty_directory() -> TestResult {
        let tmp = TempDir::new()?;
        let run_root = StorageLocation::local(tmp.path());

        let summary = write_table::<Track>(&run_root, &[]).await?;
        assert_eq!(summary.files, 0);
        assert!(tmp.path().join("songs").is_dir());
        assert_eq!(std::fs::read_dir(tmp.path().join("songs"))?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn staged_table_is_invisible_until_promoted() -> TestResult {
        let tmp = TempDir::new()?;
        let run_root = StorageLocation::local(tmp.path());
        write_table(&run_root, &[track("S1", Some("A1"), Some(1999))]).await?;

        let staged = stage_table(&run_root, &[track("S2", Some("A2"), Some(2001))]).await?;
        assert_eq!(staged.table(), "songs");
        assert_eq!(staged.summary().rows, 1);
        assert!(tmp.path().join("songs/year=1999/artist_id=A1").is_dir());
        assert!(!tmp.path().join("songs/year=2001").exists());

        staged.promote().await?;
        assert!(!tmp.path().join("songs/year=1999").exists());
        assert!(tmp.path().join("songs/year=2001/artist_id=A2").is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn dropped_staged_write_keeps_published_table() -> TestResult {
        let tmp = TempDir::new()?;
        let run_root = StorageLocation::local(tmp.path());
        write_table(&run_root, &[track("S1", Some("A1"), Some(1999))]).await?;

        let staged = stage_table(&run_root, &[track("S2", Some("A2"), Some(2001))]).await?;
        drop(staged);

        assert!(tmp.path().join("songs/year=1999/artist_id=A1").is_dir());
        assert!(!tmp.path().join("_staging/songs").exists());
        Ok(())
    }

    #[test]
    fn files_are_snappy_compressed() {
        assert_eq!(
            writer_properties().compression(&parquet::schema::types::ColumnPath::from("x")),
            Compression::SNAPPY
        );
    }

    #[test]
    fn grouping_is_ordered_by_partition_values() {
        let rows = vec![
            track("S1", Some("B"), Some(2001)),
            track("S2", Some("A"), Some(2001)),
            track("S3", Some("Z"), Some(1990)),
        ];
        let keys: Vec<_> = group_by_partition(&rows).into_keys().collect();
        assert_eq!(
            keys,
            vec![
                vec![PartitionValue::Int(1990), PartitionValue::Text("Z".into())],
                vec![PartitionValue::Int(2001), PartitionValue::Text("A".into())],
                vec![PartitionValue::Int(2001), PartitionValue::Text("B".into())],
            ]
        );
    }
}
