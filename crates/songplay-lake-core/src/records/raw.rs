//! Declared ingestion schemas for the two raw record families.
//!
//! Every field is optional: a key that is missing from the JSON object, or
//! present with `null`, deserializes to `None`. Keys that are not declared
//! here are ignored, so upstream producers can add fields without breaking
//! ingestion.

use serde::{Deserialize, Deserializer, Serialize};

use crate::records::key::{RowKey, float_key};

/// One catalog ("song") record: a track and the artist who recorded it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCatalogRecord {
    /// Catalog identifier of the track.
    pub song_id: Option<String>,
    /// Track title; joined against the activity `song` field.
    pub title: Option<String>,
    /// Catalog identifier of the artist.
    pub artist_id: Option<String>,
    /// Artist display name; joined against the activity `artist` field.
    pub artist_name: Option<String>,
    /// Free-form artist location.
    pub artist_location: Option<String>,
    /// Artist latitude, when known.
    pub artist_latitude: Option<f64>,
    /// Artist longitude, when known.
    pub artist_longitude: Option<f64>,
    /// Release year. `0` means unknown upstream and is passed through as-is.
    pub year: Option<i64>,
    /// Track duration in seconds; joined against the activity `length`.
    pub duration: Option<f64>,
}

/// Key of a [`RawCatalogRecord`].
pub type CatalogKey<'a> = (
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
    Option<u64>,
    Option<u64>,
    Option<i64>,
    Option<u64>,
);

impl RowKey for RawCatalogRecord {
    type Key<'a> = CatalogKey<'a>;

    fn row_key(&self) -> Self::Key<'_> {
        (
            self.song_id.as_deref(),
            self.title.as_deref(),
            self.artist_id.as_deref(),
            self.artist_name.as_deref(),
            self.artist_location.as_deref(),
            float_key(self.artist_latitude),
            float_key(self.artist_longitude),
            self.year,
            float_key(self.duration),
        )
    }
}

/// One activity ("log") record: a single user-interaction event.
///
/// Only events whose `page` is the playback sentinel (`NextSong` by default)
/// carry meaningful song / artist / length values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivityRecord {
    /// User identifier. Accepts a JSON string or number.
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    /// User first name.
    pub first_name: Option<String>,
    /// User last name.
    pub last_name: Option<String>,
    /// User gender as logged.
    pub gender: Option<String>,
    /// Subscription level at the time of the event (`free` / `paid`).
    pub level: Option<String>,
    /// Page / event type.
    pub page: Option<String>,
    /// Event time in epoch milliseconds.
    pub ts: Option<i64>,
    /// Title of the track being played.
    pub song: Option<String>,
    /// Name of the artist being played.
    pub artist: Option<String>,
    /// Length of the track being played, in seconds.
    pub length: Option<f64>,
    /// Session identifier.
    pub session_id: Option<i64>,
    /// Free-form user location.
    pub location: Option<String>,
    /// Raw user agent string.
    pub user_agent: Option<String>,
}

/// Key of a [`RawActivityRecord`]; nested because std tuples stop at 12.
pub type ActivityKey<'a> = (
    (
        Option<&'a str>,
        Option<&'a str>,
        Option<&'a str>,
        Option<&'a str>,
        Option<&'a str>,
        Option<&'a str>,
    ),
    (
        Option<i64>,
        Option<&'a str>,
        Option<&'a str>,
        Option<u64>,
        Option<i64>,
        Option<&'a str>,
        Option<&'a str>,
    ),
);

impl RowKey for RawActivityRecord {
    type Key<'a> = ActivityKey<'a>;

    fn row_key(&self) -> Self::Key<'_> {
        (
            (
                self.user_id.as_deref(),
                self.first_name.as_deref(),
                self.last_name.as_deref(),
                self.gender.as_deref(),
                self.level.as_deref(),
                self.page.as_deref(),
            ),
            (
                self.ts,
                self.song.as_deref(),
                self.artist.as_deref(),
                float_key(self.length),
                self.session_id,
                self.location.as_deref(),
                self.user_agent.as_deref(),
            ),
        )
    }
}

/// A record tagged with the ordinal of the input file it was read from.
///
/// The ordinal is provenance, not content: two records from different files
/// with identical fields are duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    /// Position of the source file in the sorted input listing.
    pub partition: u32,
    /// The record itself.
    pub record: T,
}

impl<T> Sourced<T> {
    /// Tag `record` with the given source partition.
    pub fn new(partition: u32, record: T) -> Self {
        Self { partition, record }
    }
}

impl<T: RowKey> RowKey for Sourced<T> {
    type Key<'a>
        = T::Key<'a>
    where
        T: 'a;

    fn row_key(&self) -> Self::Key<'_> {
        self.record.row_key()
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(
        Option::<TextOrNumber>::deserialize(deserializer)?.map(|v| match v {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Int(i) => i.to_string(),
            TextOrNumber::Float(f) => f.to_string(),
        }),
    )
}
