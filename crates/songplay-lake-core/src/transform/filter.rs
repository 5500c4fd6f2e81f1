//! Event-type filter for activity records.

use crate::records::{RawActivityRecord, Sourced};

/// Page value that marks an actual playback event.
pub const PLAYBACK_PAGE: &str = "NextSong";

/// Keep only activity rows whose `page` equals `page`.
///
/// Rows with a null `page` are dropped. Filtering commutes with `distinct`,
/// but it must run before any projection because non-playback events carry
/// no meaningful song, artist or session fields.
pub fn filter_playback(
    rows: Vec<Sourced<RawActivityRecord>>,
    page: &str,
) -> Vec<Sourced<RawActivityRecord>> {
    rows.into_iter()
        .filter(|row| row.record.page.as_deref() == Some(page))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::distinct;

    fn event(page: Option<&str>, user: &str) -> Sourced<RawActivityRecord> {
        Sourced::new(
            0,
            RawActivityRecord {
                page: page.map(str::to_string),
                user_id: Some(user.to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn keeps_only_playback_events() {
        let rows = vec![
            event(Some("NextSong"), "1"),
            event(Some("Home"), "2"),
            event(None, "3"),
            event(Some("nextsong"), "4"),
            event(Some("NextSong"), "5"),
        ];
        let out = filter_playback(rows, PLAYBACK_PAGE);
        let users: Vec<_> = out
            .iter()
            .map(|r| r.record.user_id.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(users, vec!["1", "5"]);
    }

    #[test]
    fn custom_page_sentinel() {
        let rows = vec![event(Some("Play"), "1"), event(Some("NextSong"), "2")];
        let out = filter_playback(rows, "Play");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].record.user_id.as_deref(), Some("1"));
    }

    #[test]
    fn filter_and_distinct_commute() {
        let rows = vec![
            event(Some("NextSong"), "1"),
            event(Some("Home"), "1"),
            event(Some("NextSong"), "1"),
            event(Some("Logout"), "2"),
        ];
        let a = distinct(filter_playback(rows.clone(), PLAYBACK_PAGE));
        let b = filter_playback(distinct(rows), PLAYBACK_PAGE);
        assert_eq!(a, b);
    }
}
