//! Duplicate detection by track identity and by primary artist.
//!
//! The first occurrence always survives and survivor order is preserved.

use std::collections::{HashMap, HashSet};

use crate::catalog::Track;

/// Same-name recordings closer than this in length count as one track.
pub const DURATION_TOLERANCE_MS: u64 = 2000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub original: Vec<Track>,
    pub duplicate: Vec<Track>,
}

/// Per-index duplicate flags: same id, or same `name:artist` key with a
/// duration within tolerance of an earlier survivor.
fn track_duplicates(tracks: &[Track]) -> Vec<bool> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut seen_keys: HashMap<String, Vec<u64>> = HashMap::new();

    tracks
        .iter()
        .map(|track| {
            let key = track.name_key();
            let same_name = key.as_ref().is_some_and(|key| {
                seen_keys.get(key).is_some_and(|durations| {
                    durations
                        .iter()
                        .any(|d| d.abs_diff(track.duration_ms) < DURATION_TOLERANCE_MS)
                })
            });
            if seen_ids.contains(track.id.as_str()) || same_name {
                return true;
            }
            seen_ids.insert(track.id.as_str());
            if let Some(key) = key {
                seen_keys.entry(key).or_default().push(track.duration_ms);
            }
            false
        })
        .collect()
}

/// Per-index flags for tracks whose primary artist id was seen earlier.
/// Tracks without a primary artist id are never duplicates.
fn artist_duplicates(tracks: &[Track]) -> Vec<bool> {
    let mut seen: HashSet<&str> = HashSet::new();
    tracks
        .iter()
        .map(|track| match track.primary_artist_id() {
            Some(id) => !seen.insert(id),
            None => false,
        })
        .collect()
}

fn retain_flagged(tracks: &mut Vec<Track>, duplicates: Vec<bool>) {
    let removed = duplicates.iter().filter(|d| **d).count();
    let mut flags = duplicates.into_iter();
    tracks.retain(|_| !flags.next().unwrap_or(false));
    if removed > 0 {
        log::debug!("Removed {} duplicate tracks", removed);
    }
}

pub fn dedup_tracks(tracks: &mut Vec<Track>) {
    let duplicates = track_duplicates(tracks);
    retain_flagged(tracks, duplicates);
}

pub fn dedup_artists(tracks: &mut Vec<Track>) {
    let duplicates = artist_duplicates(tracks);
    retain_flagged(tracks, duplicates);
}

/// Splits tracks into first-per-artist and repeat-artist groups, keeping
/// relative order within each.
pub fn separate_artists_duplicated(tracks: &[Track]) -> Partition {
    let mut partition = Partition::default();
    for (track, duplicate) in tracks.iter().zip(artist_duplicates(tracks)) {
        if duplicate {
            partition.duplicate.push(track.clone());
        } else {
            partition.original.push(track.clone());
        }
    }
    partition
}

/// Drops tracks matching `removed` by id or by `name:artist` key. With
/// `invert`, keeps only the matches instead.
pub fn remove_tracks(source: &mut Vec<Track>, removed: &[Track], invert: bool) {
    let ids: HashSet<&str> = removed.iter().map(|t| t.id.as_str()).collect();
    let keys: HashSet<String> = removed.iter().filter_map(Track::name_key).collect();
    source.retain(|track| {
        let listed = ids.contains(track.id.as_str())
            || track.name_key().is_some_and(|key| keys.contains(&key));
        listed == invert
    });
}

/// Drops tracks whose primary artist appears as a primary artist in
/// `removed`. With `invert`, keeps only those.
pub fn remove_artists(source: &mut Vec<Track>, removed: &[Track], invert: bool) {
    let ids: HashSet<&str> = removed.iter().filter_map(Track::primary_artist_id).collect();
    source.retain(|track| {
        let listed = track.primary_artist_id().is_some_and(|id| ids.contains(id));
        listed == invert
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Artist;
    use proptest::prelude::*;

    fn track(id: &str, name: &str, artist: &str, duration_ms: u64) -> Track {
        Track::new(id, name, duration_ms).with_artist(Artist::new(&artist.to_lowercase(), artist))
    }

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_fuzzy_name_match_within_tolerance() {
        let mut tracks = vec![
            track("x1", "Foo", "Bar", 200_000),
            track("x2", "foo", "bar", 201_000),
        ];
        dedup_tracks(&mut tracks);
        assert_eq!(ids(&tracks), vec!["x1"]);
    }

    #[test]
    fn test_same_name_different_length_kept() {
        let mut tracks = vec![
            track("x1", "Foo", "Bar", 200_000),
            track("x2", "Foo", "Bar", 202_000),
            track("x1", "Other", "Baz", 1),
        ];
        dedup_tracks(&mut tracks);
        assert_eq!(ids(&tracks), vec!["x1", "x2"]);
    }

    #[test]
    fn test_artistless_tracks_match_by_id_only() {
        let mut tracks = vec![
            Track::new("a", "Same", 1000),
            Track::new("b", "Same", 1000),
            Track::new("a", "Same", 1000),
        ];
        dedup_tracks(&mut tracks);
        assert_eq!(ids(&tracks), vec!["a", "b"]);
    }

    #[test]
    fn test_dedup_artists_first_wins() {
        let mut tracks = vec![
            track("1", "A", "One", 1),
            track("2", "B", "Two", 1),
            track("3", "C", "One", 1),
            Track::new("4", "D", 1),
            Track::new("5", "E", 1),
        ];
        dedup_artists(&mut tracks);
        assert_eq!(ids(&tracks), vec!["1", "2", "4", "5"]);
    }

    #[test]
    fn test_partition_keeps_order() {
        let tracks = vec![
            track("1", "A", "One", 1),
            track("2", "B", "One", 1),
            track("3", "C", "Two", 1),
            track("4", "D", "Two", 1),
        ];
        let partition = separate_artists_duplicated(&tracks);
        assert_eq!(ids(&partition.original), vec!["1", "3"]);
        assert_eq!(ids(&partition.duplicate), vec!["2", "4"]);
    }

    #[test]
    fn test_remove_tracks_and_invert() {
        let source = vec![
            track("1", "Song", "One", 1),
            track("2", "Other", "Two", 1),
            track("3", "song", "one", 1),
        ];
        let removed = vec![track("9", "Song", "One", 5)];

        let mut kept = source.clone();
        remove_tracks(&mut kept, &removed, false);
        assert_eq!(ids(&kept), vec!["2"]);

        let mut only = source.clone();
        remove_tracks(&mut only, &removed, true);
        assert_eq!(ids(&only), vec!["1", "3"]);
    }

    #[test]
    fn test_remove_artists() {
        let mut source = vec![
            track("1", "A", "One", 1),
            track("2", "B", "Two", 1),
            Track::new("3", "C", 1),
        ];
        remove_artists(&mut source, &[track("9", "Z", "One", 1)], false);
        assert_eq!(ids(&source), vec!["2", "3"]);
    }

    fn arb_track() -> impl Strategy<Value = Track> {
        (0u8..6, 0u8..3, 0u8..3, 0u64..6).prop_map(|(id, name, artist, len)| {
            track(
                &format!("t{}", id),
                &format!("Name{}", name),
                &format!("Artist{}", artist),
                len * 1500,
            )
        })
    }

    proptest! {
        #[test]
        fn dedup_tracks_is_idempotent(tracks in prop::collection::vec(arb_track(), 0..30)) {
            let mut once = tracks.clone();
            dedup_tracks(&mut once);
            let mut twice = once.clone();
            dedup_tracks(&mut twice);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn dedup_artists_leaves_unique_primary_artists(tracks in prop::collection::vec(arb_track(), 0..30)) {
            let mut deduped = tracks.clone();
            dedup_artists(&mut deduped);
            let mut seen = HashSet::new();
            for t in &deduped {
                prop_assert!(seen.insert(t.primary_artist_id().map(str::to_string)));
            }
        }
    }
}
