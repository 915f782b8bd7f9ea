//! Candidate track sources read from the catalog.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::{CatalogClient, MAX_PAGES};
use super::models::{Album, Track, SENTINEL_TIMESTAMP};
use crate::curation::select;

/// Saved-library pages can run long; cap well above a typical library.
const SAVED_TRACKS_MAX_PAGES: usize = 400;
// The top-tracks endpoint ignores offsets past the second page.
const TOP_TRACKS_MAX_PAGES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Short,
    #[default]
    Medium,
    Long,
}

impl TimeRange {
    pub fn as_str(&self) -> &str {
        match self {
            TimeRange::Short => "short_term",
            TimeRange::Medium => "medium_term",
            TimeRange::Long => "long_term",
        }
    }
}

/// Unwraps `{ track, played_at | added_at, is_local }` items into tracks.
///
/// The timestamp key is chosen from the first item. Local items, items
/// without a track, and tracks without artists are skipped.
pub fn extract_tracks(items: &[Value]) -> Vec<Track> {
    let Some(first) = items.first() else {
        return Vec::new();
    };
    let played = first.get("played_at").is_some_and(|v| !v.is_null());

    items
        .iter()
        .filter(|item| !item.get("is_local").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|item| {
            let track_value = item.get("track").filter(|t| t.is_object())?;
            let has_artists = track_value
                .get("artists")
                .and_then(Value::as_array)
                .is_some_and(|a| !a.is_empty());
            if !has_artists {
                return None;
            }

            let mut track: Track = serde_json::from_value(track_value.clone())
                .map_err(|e| log::debug!("Skipping unreadable track item: {}", e))
                .ok()?;
            let key = if played { "played_at" } else { "added_at" };
            let date = item
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(SENTINEL_TIMESTAMP)
                .to_string();
            if played {
                track.played_at = Some(date);
            } else {
                track.added_at = Some(date);
            }
            Some(track)
        })
        .collect()
}

/// Parses bare track objects, skipping local and malformed entries.
pub fn parse_tracks(values: &[Value]) -> Vec<Track> {
    values
        .iter()
        .filter(|v| !v.get("is_local").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|v| serde_json::from_value::<Track>(v.clone()).ok())
        .filter(|t| !t.artists.is_empty())
        .collect()
}

pub fn saved_tracks(client: &CatalogClient) -> Vec<Track> {
    let items = client.get_items_by_path("me/tracks?limit=50", SAVED_TRACKS_MAX_PAGES);
    extract_tracks(&items)
}

pub fn top_tracks(client: &CatalogClient, range: TimeRange) -> Vec<Track> {
    let path = format!("me/top/tracks?limit=45&time_range={}", range.as_str());
    parse_tracks(&client.get_items_by_path(&path, TOP_TRACKS_MAX_PAGES))
}

pub fn playlist_tracks(client: &CatalogClient, playlist_id: &str) -> Vec<Track> {
    let path = format!(
        "playlists/{}/tracks?limit=100",
        urlencoding::encode(playlist_id)
    );
    extract_tracks(&client.get_items_by_path(&path, MAX_PAGES))
}

/// Tracks of one album, optionally cut to a random `limit`, each carrying
/// the given album as its reference.
pub fn album_tracks(client: &CatalogClient, album: &Album, limit: usize) -> Vec<Track> {
    let Some(album_id) = album.id.as_deref() else {
        return Vec::new();
    };
    let path = format!("albums/{}/tracks?limit=50", urlencoding::encode(album_id));
    let mut tracks = parse_tracks(&client.get_items_by_path(&path, MAX_PAGES));
    select::keep_random(&mut tracks, limit);
    for track in tracks.iter_mut() {
        track.album = Some(album.clone());
    }
    tracks
}

/// Best catalog match for a free-text query.
pub fn search_track(client: &CatalogClient, query: &str) -> Option<Track> {
    let url = format!(
        "{}/search?q={}&type=track&limit=1",
        client.base_url(),
        urlencoding::encode(query)
    );
    let response = client.get(&url)?;
    let first = response.get("items")?.as_array()?.first()?.clone();
    serde_json::from_value(first).ok()
}
