//! Row types flowing through the ETL.
//!
//! - [`raw`]: the declared ingestion schemas for catalog and activity
//!   records. The serde field set *is* the schema; nothing is inferred.
//! - [`star`]: the five star-schema row types written to Parquet.
//! - [`key`]: hashable all-fields identity used by `distinct`.

pub mod key;
pub mod raw;
pub mod star;

pub use key::{RowKey, float_key};
pub use raw::{RawActivityRecord, RawCatalogRecord, Sourced};
pub use star::{Artist, PlayEvent, TimeParts, Track, User};
