//! Synthetic `songplay_id` assignment.
//!
//! Ids follow the layout `(partition << 33) + offset`, where `partition` is
//! the ordinal of the input file an event was read from and `offset` counts
//! events within that file. Ids strictly increase in generation order but
//! jump between files, and they change whenever the input file set does.
//! Callers must not treat them as durable identifiers.

use snafu::ensure;

use crate::transform::{
    IdSpaceExhaustedSnafu, PartitionOutOfRangeSnafu, PartitionRegressedSnafu, TransformResult,
};

/// Bits reserved for the per-partition offset.
pub const OFFSET_BITS: u32 = 33;

/// Rows a single partition can number before its id space runs out.
pub const MAX_ROWS_PER_PARTITION: u64 = 1 << OFFSET_BITS;

/// Largest partition ordinal that still yields a non-negative `i64` id.
pub const MAX_PARTITION: u32 = (1 << (63 - OFFSET_BITS)) - 1;

/// Stateful generator of monotonically increasing ids.
///
/// Partitions must be requested in non-decreasing order; within a partition
/// offsets count up from zero.
#[derive(Debug, Default)]
pub struct SongplayIdGenerator {
    current: Option<(u32, u64)>,
}

impl SongplayIdGenerator {
    /// Create a generator that has not issued any id yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next id for a row read from `partition`.
    pub fn next_id(&mut self, partition: u32) -> TransformResult<i64> {
        ensure!(
            partition <= MAX_PARTITION,
            PartitionOutOfRangeSnafu {
                partition,
                max: MAX_PARTITION
            }
        );

        let offset = match self.current {
            Some((current, next)) if current == partition => next,
            Some((current, _)) if partition < current => {
                return PartitionRegressedSnafu { partition, current }.fail();
            }
            _ => 0,
        };

        ensure!(
            offset < MAX_ROWS_PER_PARTITION,
            IdSpaceExhaustedSnafu {
                partition,
                limit: MAX_ROWS_PER_PARTITION
            }
        );

        self.current = Some((partition, offset + 1));
        Ok((i64::from(partition) << OFFSET_BITS) | offset as i64)
    }
}
