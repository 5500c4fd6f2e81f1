//! Run orchestration: the execution context and the two pipelines.
//!
//! A run is sequenced as:
//!
//! 1. [`EtlContext::new`] validates the configuration and resolves the input
//!    location and the run output root.
//! 2. [`run_catalog_pipeline`] writes `songs` and `artists`.
//! 3. [`run_activity_pipeline`] writes `users`, `time` and `songplays`,
//!    joining against catalog rows handed in by the caller.
//! 4. [`EtlContext::close`] logs and returns the [`RunReport`].
//!
//! [`run_all`] does 2 and 3 with a single catalog load and publishes all
//! five tables together. Every run ingests and transforms first, then stages
//! each of its tables under `_staging`, and promotes only once everything is
//! staged. An ingestion, transform or write error therefore leaves the
//! previously published tables as they were.

use chrono::NaiveDate;
use snafu::prelude::*;
use tracing::info;

use crate::config::{ConfigError, EtlConfig};
use crate::ingest::{self, IngestError, Ingested, RecordFamily};
use crate::records::{Artist, PlayEvent, RawActivityRecord, RawCatalogRecord, TimeParts, Track, User};
use crate::sink::{self, SinkError, StagedWrite, StarTable, TableWriteSummary};
use crate::storage::{StorageError, StorageLocation, layout};
use crate::transform::{
    CatalogIndex, SongplayIdGenerator, TransformError, derive_time_rows, distinct,
    filter_playback, join_play_events, project_artists, project_tracks, project_users,
};

/// Errors raised by a pipeline run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    /// The configuration is unusable.
    #[snafu(display("Invalid configuration: {source}"))]
    Config {
        /// Underlying configuration error.
        source: ConfigError,
    },

    /// An input or output location could not be resolved.
    #[snafu(display("Invalid {which} location: {source}"))]
    Location {
        /// `input` or `output`.
        which: &'static str,
        /// Underlying storage error.
        source: StorageError,
    },

    /// Reading raw records failed.
    #[snafu(display("Ingestion failed: {source}"))]
    Ingest {
        /// Underlying ingestion error.
        #[snafu(source(from(IngestError, Box::new)))]
        source: Box<IngestError>,
    },

    /// A transform rejected its input.
    #[snafu(display("Transform failed: {source}"))]
    Transform {
        /// Underlying transform error.
        source: TransformError,
    },

    /// Writing a table failed.
    #[snafu(display("Output failed: {source}"))]
    Sink {
        /// Underlying sink error.
        #[snafu(source(from(SinkError, Box::new)))]
        source: Box<SinkError>,
    },
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// What was written for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    /// Table name.
    pub table: &'static str,
    /// Rows written.
    pub rows: usize,
    /// Partition directories written.
    pub partitions: usize,
    /// Parquet files written.
    pub files: usize,
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Root the tables were written under.
    pub run_root: String,
    /// Tables in the order they were written.
    pub tables: Vec<TableReport>,
    /// Catalog files read.
    pub catalog_files: usize,
    /// Activity files read.
    pub activity_files: usize,
    /// Malformed catalog lines skipped.
    pub catalog_skipped: usize,
    /// Malformed activity lines skipped.
    pub activity_skipped: usize,
    /// Songplays without a catalog match.
    pub unmatched_songplays: usize,
}

impl RunReport {
    /// Report for `table`, if it was written in this run.
    pub fn table(&self, table: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == table)
    }

    /// Total malformed lines skipped across both families.
    pub fn skipped(&self) -> usize {
        self.catalog_skipped + self.activity_skipped
    }
}

/// Explicit execution context for one run.
///
/// Built once, passed by `&mut` to each pipeline, and consumed by
/// [`EtlContext::close`].
#[derive(Debug)]
pub struct EtlContext {
    config: EtlConfig,
    run_date: NaiveDate,
    input: StorageLocation,
    run_root: StorageLocation,
    report: RunReport,
}

impl EtlContext {
    /// Validate `config` and resolve locations for a run started on `run_date`.
    pub fn new(config: EtlConfig, run_date: NaiveDate) -> PipelineResult<Self> {
        config.validate().context(ConfigSnafu)?;

        let input =
            StorageLocation::parse(&config.input.root).context(LocationSnafu { which: "input" })?;
        let output = StorageLocation::parse(&config.output.root)
            .context(LocationSnafu { which: "output" })?;
        let run_root = if config.output.date_stamped {
            output.child(layout::run_rel_dir(run_date))
        } else {
            output
        };

        info!(
            input = %input.display(),
            run_root = %run_root.display(),
            %run_date,
            "etl context created"
        );

        let report = RunReport {
            run_root: run_root.display(),
            ..Default::default()
        };

        Ok(Self {
            config,
            run_date,
            input,
            run_root,
            report,
        })
    }

    /// Configuration this context was built from.
    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Date the run is stamped with.
    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    /// Input root.
    pub fn input(&self) -> &StorageLocation {
        &self.input
    }

    /// Root that tables are written under.
    pub fn run_root(&self) -> &StorageLocation {
        &self.run_root
    }

    /// Report accumulated so far.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    fn record_table(&mut self, table: &'static str, summary: TableWriteSummary) {
        let entry = TableReport {
            table,
            rows: summary.rows,
            partitions: summary.partitions,
            files: summary.files,
        };
        match self.report.tables.iter_mut().find(|t| t.table == table) {
            Some(existing) => *existing = entry,
            None => self.report.tables.push(entry),
        }
    }

    async fn stage<T: StarTable>(&self, rows: &[T]) -> PipelineResult<StagedWrite> {
        sink::stage_table(&self.run_root, rows)
            .await
            .context(SinkSnafu)
    }

    /// Promote every staged table, in order.
    async fn publish(&mut self, staged: Vec<StagedWrite>) -> PipelineResult<()> {
        for write in staged {
            let table = write.table();
            let summary = write.promote().await.context(SinkSnafu)?;
            self.record_table(table, summary);
        }
        Ok(())
    }

    /// Tear down the context and return the final report.
    pub fn close(self) -> RunReport {
        for t in &self.report.tables {
            info!(
                table = t.table,
                rows = t.rows,
                partitions = t.partitions,
                files = t.files,
                "table summary"
            );
        }
        info!(
            run_root = %self.report.run_root,
            tables = self.report.tables.len(),
            skipped = self.report.skipped(),
            "etl run finished"
        );
        self.report
    }
}

/// Load and deduplicate the catalog records.
pub async fn load_catalog(ctx: &mut EtlContext) -> PipelineResult<Vec<RawCatalogRecord>> {
    let loaded: Ingested<RawCatalogRecord> = ingest::load_records(
        &ctx.input,
        RecordFamily::Catalog,
        &ctx.config.input.catalog_pattern,
        ctx.config.input.malformed_records,
    )
    .await
    .context(IngestSnafu)?;

    ctx.report.catalog_files = loaded.files;
    ctx.report.catalog_skipped = loaded.skipped;

    let records = distinct(loaded.records.into_iter().map(|s| s.record).collect());
    info!(records = records.len(), "catalog records deduplicated");
    Ok(records)
}

/// Rows of the catalog dimension tables.
struct CatalogTables {
    tracks: Vec<Track>,
    artists: Vec<Artist>,
}

impl CatalogTables {
    fn derive(catalog: &[RawCatalogRecord]) -> Self {
        let tracks = distinct(project_tracks(catalog));
        let artists = distinct(project_artists(catalog));
        info!(
            tracks = tracks.len(),
            artists = artists.len(),
            "catalog dimensions projected"
        );
        Self { tracks, artists }
    }

    async fn stage(&self, ctx: &EtlContext) -> PipelineResult<Vec<StagedWrite>> {
        Ok(vec![
            ctx.stage(&self.tracks).await?,
            ctx.stage(&self.artists).await?,
        ])
    }
}

/// Rows of the activity tables.
struct ActivityTables {
    users: Vec<User>,
    times: Vec<TimeParts>,
    songplays: Vec<PlayEvent>,
}

impl ActivityTables {
    /// Load activity records and derive `users`, `time` and `songplays`.
    async fn derive(ctx: &mut EtlContext, catalog: &[RawCatalogRecord]) -> PipelineResult<Self> {
        let loaded: Ingested<RawActivityRecord> = ingest::load_records(
            &ctx.input,
            RecordFamily::Activity,
            &ctx.config.input.activity_pattern,
            ctx.config.input.malformed_records,
        )
        .await
        .context(IngestSnafu)?;

        ctx.report.activity_files = loaded.files;
        ctx.report.activity_skipped = loaded.skipped;

        let total = loaded.records.len();
        let plays = distinct(filter_playback(
            loaded.records,
            &ctx.config.input.playback_page,
        ));
        info!(
            events = total,
            playback = plays.len(),
            page = %ctx.config.input.playback_page,
            "playback events selected"
        );

        let users = project_users(&plays);
        let times = derive_time_rows(&plays).context(TransformSnafu)?;

        let index = CatalogIndex::build(catalog);
        let mut ids = SongplayIdGenerator::new();
        let songplays = join_play_events(&plays, &index, ctx.config.duration_match(), &mut ids)
            .context(TransformSnafu)?;
        let unmatched = songplays.iter().filter(|p| p.song_id.is_none()).count();
        ctx.report.unmatched_songplays = unmatched;
        info!(
            users = users.len(),
            times = times.len(),
            songplays = songplays.len(),
            unmatched,
            indexed_titles = index.len(),
            "activity tables derived"
        );

        Ok(Self {
            users,
            times,
            songplays,
        })
    }

    async fn stage(&self, ctx: &EtlContext) -> PipelineResult<Vec<StagedWrite>> {
        Ok(vec![
            ctx.stage(&self.users).await?,
            ctx.stage(&self.times).await?,
            ctx.stage(&self.songplays).await?,
        ])
    }
}

/// Catalog pipeline: load, deduplicate, project, and write `songs` and
/// `artists`.
pub async fn run_catalog_pipeline(ctx: &mut EtlContext) -> PipelineResult<()> {
    let catalog = load_catalog(ctx).await?;
    let tables = CatalogTables::derive(&catalog);
    let staged = tables.stage(ctx).await?;
    ctx.publish(staged).await
}

/// Activity pipeline: load, filter to playback events, deduplicate, and
/// write `users`, `time`, and the `songplays` join against `catalog`.
pub async fn run_activity_pipeline(
    ctx: &mut EtlContext,
    catalog: &[RawCatalogRecord],
) -> PipelineResult<()> {
    let tables = ActivityTables::derive(ctx, catalog).await?;
    let staged = tables.stage(ctx).await?;
    ctx.publish(staged).await
}

/// Run both pipelines, loading the catalog once.
///
/// All five tables are derived and staged before the first one is promoted.
pub async fn run_all(ctx: &mut EtlContext) -> PipelineResult<()> {
    let catalog = load_catalog(ctx).await?;
    let catalog_tables = CatalogTables::derive(&catalog);
    let activity_tables = ActivityTables::derive(ctx, &catalog).await?;

    let mut staged = catalog_tables.stage(ctx).await?;
    staged.extend(activity_tables.stage(ctx).await?);
    ctx.publish(staged).await
}
