//! Timestamp decomposition into calendar features.
//!
//! Raw `ts` values are epoch milliseconds. They are floored to whole seconds
//! once, and every calendar field is read from that single UTC instant, so
//! `hour`, `day` and `weekday` always describe the same moment.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::records::{RawActivityRecord, Sourced, TimeParts};
use crate::transform::{TimestampOutOfRangeSnafu, TransformResult, distinct};

const MILLIS_PER_SECOND: i64 = 1_000;

/// Format of the `start_time` column.
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl TimeParts {
    /// Decompose an epoch-millisecond timestamp.
    ///
    /// # Errors
    /// [`TransformError::TimestampOutOfRange`](crate::transform::TransformError)
    /// when the instant is outside chrono's supported range.
    pub fn from_epoch_millis(ts: i64) -> TransformResult<Self> {
        let secs = ts.div_euclid(MILLIS_PER_SECOND);
        let instant = DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| TimestampOutOfRangeSnafu { ts }.build())?;
        Ok(Self::from_instant(instant))
    }

    fn from_instant(instant: DateTime<Utc>) -> Self {
        Self {
            start_time: instant.format(START_TIME_FORMAT).to_string(),
            hour: instant.hour(),
            day: instant.day(),
            week: instant.iso_week().week(),
            month: instant.month(),
            year: instant.year(),
            weekday: instant.format("%a").to_string(),
        }
    }
}

/// Derive the distinct `time` rows observed in `activity`.
///
/// Rows with a null `ts` contribute nothing.
pub fn derive_time_rows(activity: &[Sourced<RawActivityRecord>]) -> TransformResult<Vec<TimeParts>> {
    let rows = activity
        .iter()
        .filter_map(|row| row.record.ts)
        .map(TimeParts::from_epoch_millis)
        .collect::<TransformResult<Vec<_>>>()?;
    Ok(distinct(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformError;
    use chrono::{NaiveDate, Weekday};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn play_at(ts: Option<i64>) -> Sourced<RawActivityRecord> {
        Sourced::new(
            0,
            RawActivityRecord {
                ts,
                page: Some("NextSong".to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn decomposes_reference_timestamp() -> TestResult {
        let t = TimeParts::from_epoch_millis(1_541_121_934_796)?;
        assert_eq!(t.start_time, "2018-11-02 01:25:34");
        assert_eq!(t.hour, 1);
        assert_eq!(t.day, 2);
        assert_eq!(t.week, 44);
        assert_eq!(t.month, 11);
        assert_eq!(t.year, 2018);
        assert_eq!(t.weekday, "Fri");
        Ok(())
    }

    #[test]
    fn decomposition_is_deterministic() -> TestResult {
        let a = TimeParts::from_epoch_millis(1_542_837_407_796)?;
        let b = TimeParts::from_epoch_millis(1_542_837_407_796)?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn weekday_agrees_with_calendar_date() -> TestResult {
        for ts in [0_i64, 951_782_400_000, 1_541_121_934_796, 1_546_300_799_999] {
            let t = TimeParts::from_epoch_millis(ts)?;
            let date = NaiveDate::from_ymd_opt(t.year, t.month, t.day).ok_or("bad date")?;
            let expected: Weekday = date.weekday();
            assert_eq!(t.weekday, format!("{expected}"));
            assert_eq!(t.week, date.iso_week().week());
        }
        Ok(())
    }

    #[test]
    fn sub_second_values_floor_consistently() -> TestResult {
        // 1 ms before midnight must stay on the earlier day in every field.
        let t = TimeParts::from_epoch_millis(1_546_300_799_999)?;
        assert_eq!(t.start_time, "2018-12-31 23:59:59");
        assert_eq!((t.year, t.month, t.day, t.hour), (2018, 12, 31, 23));
        assert_eq!(t.weekday, "Mon");
        // ISO week 1 of 2019 starts on Monday 2018-12-31.
        assert_eq!(t.week, 1);

        let before_epoch = TimeParts::from_epoch_millis(-1)?;
        assert_eq!(before_epoch.start_time, "1969-12-31 23:59:59");
        Ok(())
    }

    #[test]
    fn out_of_range_timestamp_is_an_error() {
        let err = TimeParts::from_epoch_millis(i64::MAX).expect_err("expected range error");
        assert!(matches!(err, TransformError::TimestampOutOfRange { ts } if ts == i64::MAX));
    }

    #[test]
    fn time_rows_are_distinct_and_skip_null_ts() -> TestResult {
        let rows = vec![
            play_at(Some(1_541_121_934_796)),
            play_at(Some(1_541_121_934_100)),
            play_at(None),
            play_at(Some(1_541_122_000_000)),
        ];
        let out = derive_time_rows(&rows)?;
        // First two collapse onto the same second.
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].start_time, "2018-11-02 01:25:34");
        assert_eq!(out[1].start_time, "2018-11-02 01:26:40");
        Ok(())
    }
}
