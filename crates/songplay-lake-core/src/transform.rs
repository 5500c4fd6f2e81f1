//! Pure, synchronous set-oriented operators.
//!
//! Nothing in this module performs I/O or holds shared state. Each operator
//! consumes or borrows a row set and returns a new one, so the pipelines can
//! sequence them freely as long as filter -> dedup -> project precedes any
//! write.

use snafu::prelude::*;

pub mod dedup;
pub mod filter;
pub mod ids;
pub mod join;
pub mod projection;
pub mod time;

pub use dedup::distinct;
pub use filter::{PLAYBACK_PAGE, filter_playback};
pub use ids::SongplayIdGenerator;
pub use join::{CatalogIndex, DurationMatch, join_play_events};
pub use projection::{project_artists, project_tracks, project_users};
pub use time::derive_time_rows;

/// Errors raised by the transforms.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransformError {
    /// An epoch-millisecond timestamp outside the representable calendar range.
    #[snafu(display("Timestamp {ts} ms is outside the supported calendar range"))]
    TimestampOutOfRange {
        /// The offending raw `ts` value.
        ts: i64,
    },

    /// A single source partition produced more rows than the id layout allows.
    #[snafu(display(
        "Songplay id space exhausted for partition {partition} (more than {limit} rows)"
    ))]
    IdSpaceExhausted {
        /// Source partition whose offset overflowed.
        partition: u32,
        /// Maximum rows per partition.
        limit: u64,
    },

    /// A source partition ordinal too large to encode into an id.
    #[snafu(display("Source partition {partition} exceeds the id layout maximum of {max}"))]
    PartitionOutOfRange {
        /// Partition requested.
        partition: u32,
        /// Largest encodable partition.
        max: u32,
    },

    /// Ids were requested for a partition lower than one already issued.
    #[snafu(display(
        "Songplay ids must be generated in partition order: got {partition} after {current}"
    ))]
    PartitionRegressed {
        /// Partition requested.
        partition: u32,
        /// Partition most recently issued.
        current: u32,
    },
}

/// Convenience alias for transform results.
pub type TransformResult<T> = Result<T, TransformError>;
