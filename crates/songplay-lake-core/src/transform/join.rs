//! Catalog/activity left-outer join that builds the `songplays` fact rows.
//!
//! The predicate is `song == title AND artist == artist_name AND
//! length == duration`. A null on either side of any conjunct never matches.
//! Unmatched activity rows are kept with null `song_id` / `artist_id`, and
//! when several catalog rows match, the first one in catalog order wins, so
//! the output always has exactly one row per input activity row.

use std::collections::HashMap;

use crate::records::{
    PlayEvent, RawActivityRecord, RawCatalogRecord, Sourced, TimeParts, float_key,
};
use crate::transform::{SongplayIdGenerator, TransformResult};

/// How `activity.length` is compared with `catalog.duration`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DurationMatch {
    /// Exact value equality. `0.0 == -0.0` and `NaN == NaN`, matching the
    /// grouping semantics used by `distinct`.
    #[default]
    Exact,
    /// Absolute difference at most the given epsilon.
    Tolerance(f64),
}

impl DurationMatch {
    /// Build a rule from an optional tolerance; `None` or `0.0` means exact.
    pub fn from_tolerance(tolerance: Option<f64>) -> Self {
        match tolerance {
            Some(eps) if eps > 0.0 => DurationMatch::Tolerance(eps),
            _ => DurationMatch::Exact,
        }
    }

    /// Whether `length` and `duration` match under this rule.
    pub fn matches(self, length: f64, duration: f64) -> bool {
        match self {
            DurationMatch::Exact => float_key(Some(length)) == float_key(Some(duration)),
            DurationMatch::Tolerance(eps) => (length - duration).abs() <= eps,
        }
    }
}

/// Catalog rows indexed by `title`.
///
/// Rows missing a title, an artist name or a duration are left out since
/// they can never satisfy the join predicate.
#[derive(Debug, Default)]
pub struct CatalogIndex<'a> {
    by_title: HashMap<&'a str, Vec<&'a RawCatalogRecord>>,
}

impl<'a> CatalogIndex<'a> {
    /// Index `catalog`, preserving catalog order within each title.
    pub fn build(catalog: &'a [RawCatalogRecord]) -> Self {
        let mut by_title: HashMap<&'a str, Vec<&'a RawCatalogRecord>> = HashMap::new();
        for rec in catalog {
            if let (Some(title), Some(_), Some(_)) =
                (rec.title.as_deref(), rec.artist_name.as_ref(), rec.duration)
            {
                by_title.entry(title).or_default().push(rec);
            }
        }
        Self { by_title }
    }

    /// Number of distinct joinable titles.
    pub fn len(&self) -> usize {
        self.by_title.len()
    }

    /// True when no catalog row can ever match.
    pub fn is_empty(&self) -> bool {
        self.by_title.is_empty()
    }

    /// First catalog row matching the activity fields under `rule`.
    pub fn lookup(
        &self,
        song: &str,
        artist: &str,
        length: f64,
        rule: DurationMatch,
    ) -> Option<&'a RawCatalogRecord> {
        self.by_title
            .get(song)?
            .iter()
            .copied()
            .find(|rec| {
                rec.artist_name.as_deref() == Some(artist)
                    && rec.duration.is_some_and(|d| rule.matches(length, d))
            })
    }

    fn resolve(
        &self,
        activity: &RawActivityRecord,
        rule: DurationMatch,
    ) -> Option<&'a RawCatalogRecord> {
        let song = activity.song.as_deref()?;
        let artist = activity.artist.as_deref()?;
        let length = activity.length?;
        self.lookup(song, artist, length, rule)
    }
}

/// Left-outer join playback events against the catalog and assign ids.
///
/// Rows are processed in source-partition order (stable within a partition)
/// so that `ids` issues strictly increasing values in output order.
pub fn join_play_events(
    activity: &[Sourced<RawActivityRecord>],
    catalog: &CatalogIndex<'_>,
    rule: DurationMatch,
    ids: &mut SongplayIdGenerator,
) -> TransformResult<Vec<PlayEvent>> {
    let mut order: Vec<usize> = (0..activity.len()).collect();
    order.sort_by_key(|&i| activity[i].partition);

    let mut out = Vec::with_capacity(activity.len());
    for i in order {
        let Sourced { partition, record } = &activity[i];
        let matched = catalog.resolve(record, rule);

        let time = record.ts.map(TimeParts::from_epoch_millis).transpose()?;
        let start_year_month = time.as_ref().map(|t| (t.year, t.month));

        out.push(PlayEvent {
            songplay_id: ids.next_id(*partition)?,
            start_time: time.map(|t| t.start_time),
            start_year_month,
            user_id: record.user_id.clone(),
            level: record.level.clone(),
            song_id: matched.and_then(|m| m.song_id.clone()),
            artist_id: matched.and_then(|m| m.artist_id.clone()),
            session_id: record.session_id,
            location: record.location.clone(),
            user_agent: record.user_agent.clone(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn catalog_row(song_id: &str, title: &str, artist: &str, duration: f64) -> RawCatalogRecord {
        RawCatalogRecord {
            song_id: Some(song_id.to_string()),
            title: Some(title.to_string()),
            artist_id: Some(format!("A-{song_id}")),
            artist_name: Some(artist.to_string()),
            duration: Some(duration),
            year: Some(2000),
            ..Default::default()
        }
    }

    fn play(partition: u32, song: &str, artist: &str, length: f64) -> Sourced<RawActivityRecord> {
        Sourced::new(
            partition,
            RawActivityRecord {
                user_id: Some("U1".to_string()),
                level: Some("free".to_string()),
                page: Some("NextSong".to_string()),
                ts: Some(1_541_121_934_796),
                song: Some(song.to_string()),
                artist: Some(artist.to_string()),
                length: Some(length),
                session_id: Some(1),
                location: Some("NY".to_string()),
                user_agent: Some("x".to_string()),
                ..Default::default()
            },
        )
    }

    fn join(
        activity: &[Sourced<RawActivityRecord>],
        catalog: &[RawCatalogRecord],
        rule: DurationMatch,
    ) -> TransformResult<Vec<PlayEvent>> {
        let index = CatalogIndex::build(catalog);
        let mut ids = SongplayIdGenerator::new();
        join_play_events(activity, &index, rule, &mut ids)
    }

    #[test]
    fn reference_scenario_resolves_song_and_artist() -> TestResult {
        let catalog = vec![RawCatalogRecord {
            song_id: Some("S1".to_string()),
            title: Some("Test Song".to_string()),
            artist_id: Some("A1".to_string()),
            artist_name: Some("Test Artist".to_string()),
            duration: Some(200.0),
            year: Some(2000),
            ..Default::default()
        }];
        let activity = vec![play(0, "Test Song", "Test Artist", 200.0)];

        let out = join(&activity, &catalog, DurationMatch::Exact)?;
        assert_eq!(out.len(), 1);
        let row = &out[0];
        assert_eq!(row.song_id.as_deref(), Some("S1"));
        assert_eq!(row.artist_id.as_deref(), Some("A1"));
        assert_eq!(row.user_id.as_deref(), Some("U1"));
        assert_eq!(row.level.as_deref(), Some("free"));
        assert_eq!(row.start_time.as_deref(), Some("2018-11-02 01:25:34"));
        assert_eq!(row.start_year_month, Some((2018, 11)));
        assert_eq!(row.session_id, Some(1));
        Ok(())
    }

    #[test]
    fn misses_are_kept_with_null_catalog_fields() -> TestResult {
        let catalog = vec![catalog_row("S1", "Song", "Artist", 200.0)];
        let activity = vec![
            play(0, "Song", "Artist", 200.5),
            play(0, "Song", "Someone Else", 200.0),
            play(0, "Other", "Artist", 200.0),
        ];
        let out = join(&activity, &catalog, DurationMatch::Exact)?;
        assert_eq!(out.len(), activity.len());
        assert!(out.iter().all(|r| r.song_id.is_none() && r.artist_id.is_none()));
        Ok(())
    }

    #[test]
    fn null_join_columns_never_match() -> TestResult {
        let mut nameless = catalog_row("S1", "Song", "Artist", 200.0);
        nameless.artist_name = None;
        let catalog = vec![nameless];

        let mut no_length = play(0, "Song", "Artist", 200.0);
        no_length.record.length = None;
        let activity = vec![play(0, "Song", "Artist", 200.0), no_length];

        let out = join(&activity, &catalog, DurationMatch::Exact)?;
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.song_id.is_none()));
        Ok(())
    }

    #[test]
    fn first_catalog_match_wins_and_rows_are_not_multiplied() -> TestResult {
        let catalog = vec![
            catalog_row("S1", "Song", "Artist", 200.0),
            catalog_row("S2", "Song", "Artist", 200.0),
        ];
        let activity = vec![play(0, "Song", "Artist", 200.0)];
        let out = join(&activity, &catalog, DurationMatch::Exact)?;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].song_id.as_deref(), Some("S1"));
        Ok(())
    }

    #[test]
    fn tolerance_rule_accepts_near_durations() -> TestResult {
        let catalog = vec![catalog_row("S1", "Song", "Artist", 200.0)];
        let activity = vec![play(0, "Song", "Artist", 200.0004)];

        let exact = join(&activity, &catalog, DurationMatch::Exact)?;
        assert!(exact[0].song_id.is_none());

        let loose = join(&activity, &catalog, DurationMatch::Tolerance(1e-3))?;
        assert_eq!(loose[0].song_id.as_deref(), Some("S1"));
        Ok(())
    }

    #[test]
    fn ids_strictly_increase_in_output_order() -> TestResult {
        let catalog = vec![catalog_row("S1", "Song", "Artist", 200.0)];
        let activity = vec![
            play(1, "Song", "Artist", 200.0),
            play(0, "Song", "Artist", 200.0),
            play(1, "x", "y", 1.0),
            play(3, "Song", "Artist", 200.0),
        ];
        let out = join(&activity, &catalog, DurationMatch::Exact)?;
        assert_eq!(out.len(), 4);
        assert!(out.windows(2).all(|w| w[0].songplay_id < w[1].songplay_id));
        Ok(())
    }

    #[test]
    fn missing_ts_yields_null_start_time() -> TestResult {
        let mut row = play(0, "Song", "Artist", 200.0);
        row.record.ts = None;
        let out = join(&[row], &[], DurationMatch::Exact)?;
        assert_eq!(out[0].start_time, None);
        assert_eq!(out[0].start_year_month, None);
        Ok(())
    }

    #[test]
    fn duration_rule_from_tolerance() {
        assert_eq!(DurationMatch::from_tolerance(None), DurationMatch::Exact);
        assert_eq!(DurationMatch::from_tolerance(Some(0.0)), DurationMatch::Exact);
        assert_eq!(
            DurationMatch::from_tolerance(Some(0.01)),
            DurationMatch::Tolerance(0.01)
        );
        assert!(DurationMatch::Exact.matches(f64::NAN, f64::NAN));
        assert!(DurationMatch::Exact.matches(-0.0, 0.0));
    }
}
