//! Full-row deduplication.

use std::collections::HashSet;

use crate::records::RowKey;

/// Remove rows that are identical across every column.
///
/// The first occurrence of each row survives and the relative order of
/// survivors is preserved. Rows that share a key column but differ anywhere
/// else (for example, same `song_id` with a different `title`) are distinct
/// and both pass through.
pub fn distinct<T: RowKey>(rows: Vec<T>) -> Vec<T> {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(rows.len());
        rows.iter().map(|row| seen.insert(row.row_key())).collect()
    };

    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect()
}
