//! Column-subset projections for the dimension tables.
//!
//! No renaming and no computation happens here. Values such as `year = 0`
//! pass through untouched.

use crate::records::{Artist, RawActivityRecord, RawCatalogRecord, Sourced, Track, User};
use crate::transform::distinct;

/// Project catalog rows onto the `songs` columns.
pub fn project_tracks(catalog: &[RawCatalogRecord]) -> Vec<Track> {
    catalog
        .iter()
        .map(|r| Track {
            song_id: r.song_id.clone(),
            title: r.title.clone(),
            artist_id: r.artist_id.clone(),
            year: r.year,
            duration: r.duration,
        })
        .collect()
}

/// Project catalog rows onto the `artists` columns.
///
/// An artist with many tracks yields many identical rows here; callers run
/// [`distinct`] over the result.
pub fn project_artists(catalog: &[RawCatalogRecord]) -> Vec<Artist> {
    catalog
        .iter()
        .map(|r| Artist {
            artist_id: r.artist_id.clone(),
            artist_name: r.artist_name.clone(),
            artist_location: r.artist_location.clone(),
            artist_latitude: r.artist_latitude,
            artist_longitude: r.artist_longitude,
        })
        .collect()
}

/// Project playback events onto the `users` columns and collapse identical
/// snapshots.
pub fn project_users(activity: &[Sourced<RawActivityRecord>]) -> Vec<User> {
    let users = activity
        .iter()
        .map(|row| {
            let r = &row.record;
            User {
                user_id: r.user_id.clone(),
                first_name: r.first_name.clone(),
                last_name: r.last_name.clone(),
                gender: r.gender.clone(),
                level: r.level.clone(),
            }
        })
        .collect();
    distinct(users)
}
