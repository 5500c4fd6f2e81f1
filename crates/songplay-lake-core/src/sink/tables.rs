//! [`StarTable`] implementations for the five star-schema tables.
//!
//! Partition columns are listed in `PARTITION_COLUMNS` and left out of the
//! data schema: their values live only in the directory names.

use std::sync::{Arc, LazyLock};

use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;

use crate::records::{Artist, PlayEvent, TimeParts, Track, User};
use crate::sink::StarTable;
use crate::storage::layout::PartitionValue;

fn utf8(name: &str) -> Field {
    Field::new(name, DataType::Utf8, true)
}

fn strings<'a, T: 'a>(rows: &[&'a T], f: impl Fn(&'a T) -> Option<&'a str>) -> ArrayRef {
    Arc::new(rows.iter().map(|r| f(*r)).collect::<StringArray>())
}

fn floats<T>(rows: &[&T], f: impl Fn(&T) -> Option<f64>) -> ArrayRef {
    Arc::new(rows.iter().map(|r| f(*r)).collect::<Float64Array>())
}

static SONGS_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        utf8("song_id"),
        utf8("title"),
        Field::new("duration", DataType::Float64, true),
    ]))
});

impl StarTable for Track {
    const NAME: &'static str = "songs";
    const PARTITION_COLUMNS: &'static [&'static str] = &["year", "artist_id"];

    fn data_schema() -> SchemaRef {
        SONGS_SCHEMA.clone()
    }

    fn partition_values(&self) -> Vec<PartitionValue> {
        vec![
            PartitionValue::from(self.year),
            PartitionValue::from(self.artist_id.as_deref()),
        ]
    }

    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::data_schema(),
            vec![
                strings(rows, |r| r.song_id.as_deref()),
                strings(rows, |r| r.title.as_deref()),
                floats(rows, |r| r.duration),
            ],
        )
    }
}

static ARTISTS_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        utf8("artist_id"),
        utf8("artist_name"),
        utf8("artist_location"),
        Field::new("artist_latitude", DataType::Float64, true),
        Field::new("artist_longitude", DataType::Float64, true),
    ]))
});

impl StarTable for Artist {
    const NAME: &'static str = "artists";
    const PARTITION_COLUMNS: &'static [&'static str] = &[];

    fn data_schema() -> SchemaRef {
        ARTISTS_SCHEMA.clone()
    }

    fn partition_values(&self) -> Vec<PartitionValue> {
        Vec::new()
    }

    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::data_schema(),
            vec![
                strings(rows, |r| r.artist_id.as_deref()),
                strings(rows, |r| r.artist_name.as_deref()),
                strings(rows, |r| r.artist_location.as_deref()),
                floats(rows, |r| r.artist_latitude),
                floats(rows, |r| r.artist_longitude),
            ],
        )
    }
}

static USERS_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        utf8("userId"),
        utf8("firstName"),
        utf8("lastName"),
        utf8("gender"),
        utf8("level"),
    ]))
});

impl StarTable for User {
    const NAME: &'static str = "users";
    const PARTITION_COLUMNS: &'static [&'static str] = &[];

    fn data_schema() -> SchemaRef {
        USERS_SCHEMA.clone()
    }

    fn partition_values(&self) -> Vec<PartitionValue> {
        Vec::new()
    }

    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::data_schema(),
            vec![
                strings(rows, |r| r.user_id.as_deref()),
                strings(rows, |r| r.first_name.as_deref()),
                strings(rows, |r| r.last_name.as_deref()),
                strings(rows, |r| r.gender.as_deref()),
                strings(rows, |r| r.level.as_deref()),
            ],
        )
    }
}

static TIME_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("start_time", DataType::Utf8, false),
        Field::new("hour", DataType::Int32, false),
        Field::new("day", DataType::Int32, false),
        Field::new("week", DataType::Int32, false),
        Field::new("weekday", DataType::Utf8, false),
    ]))
});

// Calendar fields are bounded well below i32::MAX.
fn int32_col(rows: &[&TimeParts], f: impl Fn(&TimeParts) -> u32) -> ArrayRef {
    Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| f(*r) as i32)))
}

impl StarTable for TimeParts {
    const NAME: &'static str = "time";
    const PARTITION_COLUMNS: &'static [&'static str] = &["year", "month"];

    fn data_schema() -> SchemaRef {
        TIME_SCHEMA.clone()
    }

    fn partition_values(&self) -> Vec<PartitionValue> {
        vec![
            PartitionValue::Int(i64::from(self.year)),
            PartitionValue::Int(i64::from(self.month)),
        ]
    }

    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::data_schema(),
            vec![
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|r| r.start_time.as_str()),
                )) as ArrayRef,
                int32_col(rows, |r| r.hour),
                int32_col(rows, |r| r.day),
                int32_col(rows, |r| r.week),
                Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|r| r.weekday.as_str()),
                )) as ArrayRef,
            ],
        )
    }
}

static SONGPLAYS_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("songplay_id", DataType::Int64, false),
        utf8("start_time"),
        utf8("userId"),
        utf8("level"),
        utf8("song_id"),
        utf8("artist_id"),
        Field::new("sessionId", DataType::Int64, true),
        utf8("location"),
        utf8("userAgent"),
    ]))
});

impl StarTable for PlayEvent {
    const NAME: &'static str = "songplays";
    const PARTITION_COLUMNS: &'static [&'static str] = &["year", "month"];

    fn data_schema() -> SchemaRef {
        SONGPLAYS_SCHEMA.clone()
    }

    fn partition_values(&self) -> Vec<PartitionValue> {
        match self.start_year_month {
            Some((year, month)) => vec![
                PartitionValue::Int(i64::from(year)),
                PartitionValue::Int(i64::from(month)),
            ],
            None => vec![PartitionValue::Null, PartitionValue::Null],
        }
    }

    fn to_record_batch(rows: &[&Self]) -> Result<RecordBatch, ArrowError> {
        RecordBatch::try_new(
            Self::data_schema(),
            vec![
                Arc::new(Int64Array::from_iter_values(
                    rows.iter().map(|r| r.songplay_id),
                )) as ArrayRef,
                strings(rows, |r| r.start_time.as_deref()),
                strings(rows, |r| r.user_id.as_deref()),
                strings(rows, |r| r.level.as_deref()),
                strings(rows, |r| r.song_id.as_deref()),
                strings(rows, |r| r.artist_id.as_deref()),
                Arc::new(rows.iter().map(|r| r.session_id).collect::<Int64Array>()) as ArrayRef,
                strings(rows, |r| r.location.as_deref()),
                strings(rows, |r| r.user_agent.as_deref()),
            ],
        )
    }
}
