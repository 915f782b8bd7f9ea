use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::catalog::models::{compare_attr, parse_timestamp};
use crate::catalog::{AttrValue, Attributes, Track};
use crate::context::RunContext;
use crate::curation::dedup::{separate_artists_duplicated, Partition};
use crate::errors::CuratorError;
use crate::metadata::Requirements;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortGroup {
    Meta,
    Features,
    Artist,
    Album,
}

/// `group.attribute`, e.g. `artist.popularity` or `features.tempo`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SortKey {
    pub group: SortGroup,
    pub attribute: String,
}

impl FromStr for SortKey {
    type Err = CuratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (group, attribute) = s
            .split_once('.')
            .filter(|(_, attr)| !attr.is_empty())
            .ok_or_else(|| CuratorError::Config(format!("Sort key '{}' is not group.attribute", s)))?;
        let group = match group {
            "meta" => SortGroup::Meta,
            "features" => SortGroup::Features,
            "artist" => SortGroup::Artist,
            "album" => SortGroup::Album,
            other => {
                return Err(CuratorError::Config(format!("Unknown sort group '{}'", other)));
            }
        };
        Ok(Self {
            group,
            attribute: attribute.to_string(),
        })
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = match self.group {
            SortGroup::Meta => "meta",
            SortGroup::Features => "features",
            SortGroup::Artist => "artist",
            SortGroup::Album => "album",
        };
        write!(f, "{}.{}", group, self.attribute)
    }
}

pub fn shuffle<T>(items: &mut [T]) {
    items.shuffle(&mut rand::rng());
}

pub fn reverse<T>(items: &mut [T]) {
    items.reverse();
}

/// Release dates compare as instants, not strings of mixed precision.
fn sort_value(record: &dyn Attributes, attribute: &str) -> Option<AttrValue> {
    if attribute == "release_date" {
        let millis = parse_timestamp(record.release_date()?)?.timestamp_millis();
        return Some(AttrValue::Number(millis as f64));
    }
    record.attribute(attribute)
}

/// Stable sort on one attribute. Artist, album and feature groups are
/// enriched through the context first; `meta` reads the track itself.
/// Descending order reverses the comparator, so ties keep input order.
pub fn sort(ctx: &mut RunContext, tracks: &mut Vec<Track>, key: &SortKey, direction: Direction) {
    let requirements = Requirements {
        artist: key.group == SortGroup::Artist,
        album: key.group == SortGroup::Album,
        features: key.group == SortGroup::Features,
        ..Requirements::default()
    };
    ctx.ensure(tracks, requirements);

    let cache = &ctx.metadata;
    let mut keyed: Vec<(Option<AttrValue>, Track)> = tracks
        .drain(..)
        .map(|track| {
            let value = match key.group {
                SortGroup::Meta => sort_value(&track, &key.attribute),
                SortGroup::Features => cache
                    .features_of(&track)
                    .and_then(|f| sort_value(f, &key.attribute)),
                SortGroup::Artist => cache
                    .artist_of(&track)
                    .and_then(|a| sort_value(a, &key.attribute)),
                SortGroup::Album => cache
                    .album_of(&track)
                    .and_then(|a| sort_value(a, &key.attribute)),
            };
            (value, track)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = compare_attr(a.as_ref(), b.as_ref());
        match direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    });
    tracks.extend(keyed.into_iter().map(|(_, track)| track));
}

/// Descending by timestamp, ties in input order.
pub fn sort_by_timestamp_desc(tracks: &mut [Track]) {
    tracks.sort_by_key(|t| std::cmp::Reverse(t.timestamp_millis()));
}

/// Spreads out repeat artists: each repeat is reinserted at the earliest
/// position with no track by the same primary artist within `space`
/// positions on either side. When no position qualifies it goes last.
pub fn separate_artists(tracks: &mut Vec<Track>, space: usize, shuffle_first: bool) {
    if shuffle_first {
        shuffle(tracks);
    }
    let Partition {
        mut original,
        duplicate,
    } = separate_artists_duplicated(tracks);

    for item in duplicate {
        let artist = item.primary_artist_id();
        let slot = (0..=original.len()).find(|&index| {
            let start = index.saturating_sub(space).min(original.len());
            let end = index.saturating_add(space).saturating_add(1).min(original.len());
            original[start..end]
                .iter()
                .all(|other| other.primary_artist_id() != artist)
        });
        match slot {
            Some(index) => original.insert(index, item),
            None => {
                log::debug!("No spaced slot for track {}, appending", item.id);
                original.push(item);
            }
        }
    }

    *tracks = original;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Album, Artist};
    use crate::context::testing::{context, offline};
    use crate::fetch::testing::ScriptedTransport;
    use serde_json::json;

    fn by(id: &str, artist: &str) -> Track {
        Track::new(id, id, 1000).with_artist(Artist::new(artist, artist))
    }

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_sort_key_parsing() {
        let key: SortKey = "artist.popularity".parse().unwrap();
        assert_eq!(key.group, SortGroup::Artist);
        assert_eq!(key.to_string(), "artist.popularity");
        assert!("popularity".parse::<SortKey>().is_err());
        assert!("genre.name".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_meta_sort_stable_both_directions() {
        let mut ctx = offline();
        let mut tracks = vec![
            Track::new("a", "x", 300),
            Track::new("b", "y", 100),
            Track::new("c", "z", 300),
        ];
        let key: SortKey = "meta.duration_ms".parse().unwrap();

        sort(&mut ctx, &mut tracks, &key, Direction::Asc);
        assert_eq!(ids(&tracks), vec!["b", "a", "c"]);

        sort(&mut ctx, &mut tracks, &key, Direction::Desc);
        assert_eq!(ids(&tracks), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_meta_sort_by_played_at() {
        let mut ctx = offline();
        let mut tracks = vec![
            Track::new("late", "", 0).with_played_at("2024-02-01T00:00:00Z"),
            Track::new("none", "", 0),
            Track::new("early", "", 0).with_played_at("2023-02-01T00:00:00Z"),
        ];
        sort(&mut ctx, &mut tracks, &"meta.played_at".parse().unwrap(), Direction::Asc);
        assert_eq!(ids(&tracks), vec!["none", "early", "late"]);
    }

    #[test]
    fn test_artist_sort_uses_full_records() {
        let transport = ScriptedTransport::new();
        transport.push_json(
            "https://api.test/v1/artists?ids=p,q",
            json!({ "artists": [
                { "id": "p", "name": "P", "popularity": 80 },
                { "id": "q", "name": "Q", "popularity": 20 }
            ] }),
        );
        let mut ctx = context(&transport);
        let mut tracks = vec![by("1", "p"), by("2", "q")];

        sort(&mut ctx, &mut tracks, &"artist.popularity".parse().unwrap(), Direction::Asc);

        assert_eq!(ids(&tracks), vec!["2", "1"]);
    }

    #[test]
    fn test_album_release_date_sorts_as_date() {
        let mut ctx = offline();
        let full = |id: &str, date: &str| {
            let mut album = Album::new(id, id);
            album.popularity = Some(1);
            album.release_date = Some(date.to_string());
            Track::new(id, id, 0).with_album(album)
        };
        let mut tracks = vec![full("y", "2021"), full("m", "2020-06"), full("d", "2020-01-15")];

        sort(&mut ctx, &mut tracks, &"album.release_date".parse().unwrap(), Direction::Asc);

        assert_eq!(ids(&tracks), vec!["d", "m", "y"]);
    }

    #[test]
    fn test_separate_artists_spaces_repeats() {
        let mut tracks = vec![by("1", "a"), by("2", "a"), by("3", "b"), by("4", "c")];
        separate_artists(&mut tracks, 1, false);
        assert_eq!(ids(&tracks), vec!["1", "3", "2", "4"]);
    }

    #[test]
    fn test_separate_artists_falls_back_to_end() {
        let mut tracks = vec![by("1", "a"), by("2", "a"), by("3", "a")];
        separate_artists(&mut tracks, 2, false);
        assert_eq!(ids(&tracks), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_separate_artists_huge_space_appends() {
        let mut tracks = vec![by("1", "a"), by("2", "a"), by("3", "b")];
        separate_artists(&mut tracks, usize::MAX, false);
        assert_eq!(ids(&tracks), vec!["1", "3", "2"]);
    }

    #[test]
    fn test_sort_by_timestamp_desc_keeps_ties() {
        let mut tracks = vec![
            Track::new("a", "", 0).with_played_at("2024-01-01T00:00:00Z"),
            Track::new("b", "", 0).with_played_at("2024-01-02T00:00:00Z"),
            Track::new("c", "", 0).with_played_at("2024-01-01T00:00:00Z"),
        ];
        sort_by_timestamp_desc(&mut tracks);
        assert_eq!(ids(&tracks), vec!["b", "a", "c"]);
    }
}
