//! All-fields row identity.
//!
//! `distinct` needs to hash whole rows, but `f64` is neither `Hash` nor `Eq`.
//! Rows therefore expose a borrowed key tuple in which floats are replaced by
//! a canonical bit pattern (see [`float_key`]).

use std::hash::Hash;

/// A row that can be compared for full-row equality via a hashable key.
pub trait RowKey {
    /// Borrowed key covering every column of the row.
    type Key<'a>: Hash + Eq
    where
        Self: 'a;

    /// Return the all-fields key for this row.
    fn row_key(&self) -> Self::Key<'_>;
}

/// Canonical bit pattern for an optional float column.
///
/// `-0.0` collapses onto `0.0` and every NaN onto a single NaN so that rows
/// which compare equal as values also hash equal.
pub fn float_key(value: Option<f64>) -> Option<u64> {
    value.map(|v| {
        if v.is_nan() {
            f64::NAN.to_bits()
        } else if v == 0.0 {
            0.0_f64.to_bits()
        } else {
            v.to_bits()
        }
    })
}
