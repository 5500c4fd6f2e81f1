//! Star-schema row types.
//!
//! Dimension rows (`Track`, `Artist`, `User`, `TimeParts`) are plain column
//! subsets or derivations of the raw records. `PlayEvent` is the fact row.
//! All of them are recomputed in full on every run.

use crate::records::key::{RowKey, float_key};

/// `songs` dimension row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    /// Track key.
    pub song_id: Option<String>,
    /// Track title.
    pub title: Option<String>,
    /// Artist key (also a partition column).
    pub artist_id: Option<String>,
    /// Release year (also a partition column).
    pub year: Option<i64>,
    /// Duration in seconds.
    pub duration: Option<f64>,
}

impl RowKey for Track {
    type Key<'a> = (
        Option<&'a str>,
        Option<&'a str>,
        Option<&'a str>,
        Option<i64>,
        Option<u64>,
    );

    fn row_key(&self) -> Self::Key<'_> {
        (
            self.song_id.as_deref(),
            self.title.as_deref(),
            self.artist_id.as_deref(),
            self.year,
            float_key(self.duration),
        )
    }
}

/// `artists` dimension row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artist {
    /// Artist key; repeats legitimately across an artist's tracks.
    pub artist_id: Option<String>,
    /// Display name.
    pub artist_name: Option<String>,
    /// Free-form location.
    pub artist_location: Option<String>,
    /// Latitude.
    pub artist_latitude: Option<f64>,
    /// Longitude.
    pub artist_longitude: Option<f64>,
}

impl RowKey for Artist {
    type Key<'a> = (
        Option<&'a str>,
        Option<&'a str>,
        Option<&'a str>,
        Option<u64>,
        Option<u64>,
    );

    fn row_key(&self) -> Self::Key<'_> {
        (
            self.artist_id.as_deref(),
            self.artist_name.as_deref(),
            self.artist_location.as_deref(),
            float_key(self.artist_latitude),
            float_key(self.artist_longitude),
        )
    }
}

/// `users` dimension row.
///
/// `level` changes over time, so one `user_id` may appear in several
/// snapshots; only fully identical rows are collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct User {
    /// User key (`userId`).
    pub user_id: Option<String>,
    /// `firstName`.
    pub first_name: Option<String>,
    /// `lastName`.
    pub last_name: Option<String>,
    /// `gender`.
    pub gender: Option<String>,
    /// Subscription level for this snapshot.
    pub level: Option<String>,
}

impl RowKey for User {
    type Key<'a> = &'a User;

    fn row_key(&self) -> Self::Key<'_> {
        self
    }
}

/// `time` dimension row: calendar features of one event instant.
///
/// Every field is derived from the same whole-second UTC instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeParts {
    /// `YYYY-MM-DD HH:MM:SS`, 24-hour clock.
    pub start_time: String,
    /// Hour of day, 0..=23.
    pub hour: u32,
    /// Day of month, 1..=31.
    pub day: u32,
    /// ISO-8601 week of year, 1..=53.
    pub week: u32,
    /// Month, 1..=12 (partition column).
    pub month: u32,
    /// Calendar year (partition column).
    pub year: i32,
    /// Abbreviated English weekday, `Mon`..`Sun`.
    pub weekday: String,
}

impl RowKey for TimeParts {
    type Key<'a> = &'a TimeParts;

    fn row_key(&self) -> Self::Key<'_> {
        self
    }
}

/// `songplays` fact row.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    /// Synthetic, monotonically increasing id; not stable across runs.
    pub songplay_id: i64,
    /// Formatted event instant, `None` when the activity had no `ts`.
    pub start_time: Option<String>,
    /// `(year, month)` of `start_time`, used only for partitioning.
    pub start_year_month: Option<(i32, u32)>,
    /// `userId`.
    pub user_id: Option<String>,
    /// Subscription level at the time of the event.
    pub level: Option<String>,
    /// Matched catalog track, `None` on a join miss.
    pub song_id: Option<String>,
    /// Matched catalog artist, `None` on a join miss.
    pub artist_id: Option<String>,
    /// `sessionId`.
    pub session_id: Option<i64>,
    /// `location`.
    pub location: Option<String>,
    /// `userAgent`.
    pub user_agent: Option<String>,
}
