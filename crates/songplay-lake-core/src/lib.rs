//! Core engine for the songplay-lake star-schema ETL.
//!
//! This crate turns two families of raw JSON-lines records into five
//! partitioned Parquet tables:
//!
//! - Catalog ("song") records become the `songs` and `artists` dimensions.
//! - Activity ("log") records, filtered to playback events, become the
//!   `users` and `time` dimensions and, joined against the catalog, the
//!   `songplays` fact table.
//!
//! Modules are layered bottom-up:
//!
//! - [`records`]: declared raw schemas and star-schema row types.
//! - [`transform`]: pure, synchronous dedup / filter / projection / time
//!   decomposition / join operators.
//! - [`storage`]: backend-neutral file access (local filesystem in v0.1).
//! - [`ingest`]: glob resolution and JSON-lines parsing.
//! - [`sink`]: partitioned Parquet writing with staged overwrite.
//! - [`config`] and [`pipeline`]: run configuration, the explicit execution
//!   context, and the two pipelines that sequence everything above.
//!
//! The library never installs a tracing subscriber; binaries decide how
//! events are rendered.
#![deny(missing_docs)]

pub mod config;
pub mod ingest;
pub mod pipeline;
pub mod records;
pub mod sink;
pub mod storage;
pub mod transform;

pub use config::{ConfigError, EtlConfig, MalformedRecordPolicy};
pub use pipeline::{
    EtlContext, PipelineError, RunReport, TableReport, load_catalog, run_activity_pipeline,
    run_all, run_catalog_pipeline,
};
pub use transform::DurationMatch;
