//! Per-run cache of full catalog records.
//!
//! Tracks arrive with simplified artist and album records embedded. Filters
//! and sorts that need full attributes call [`MetadataCache::ensure`] first:
//!
//! ```text
//! [tracks] → [cached this run?] → [embedded record already full?] → batch fetch → merge
//! ```
//!
//! An id is requested at most once per cache, including ids the catalog
//! could not resolve.

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;

use crate::catalog::client::{
    ALBUMS_BATCH_SIZE, ARTISTS_BATCH_SIZE, AUDIO_FEATURES_BATCH_SIZE, TRACKS_BATCH_SIZE,
};
use crate::catalog::{Album, Artist, AudioFeatures, CatalogClient, Track};

/// Which record dimensions a caller needs full data for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    pub meta: bool,
    pub artist: bool,
    pub album: bool,
    pub features: bool,
}

impl Requirements {
    pub fn is_empty(&self) -> bool {
        !(self.meta || self.artist || self.album || self.features)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Dimension {
    Meta,
    Artist,
    Album,
    Features,
}

#[derive(Debug, Default)]
pub struct MetadataCache {
    tracks: HashMap<String, Track>,
    artists: HashMap<String, Artist>,
    albums: HashMap<String, Album>,
    features: HashMap<String, AudioFeatures>,
    requested: HashSet<(Dimension, String)>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure(&mut self, client: &CatalogClient, tracks: &[Track], requirements: Requirements) {
        if requirements.meta {
            let ids = self.pending(
                Dimension::Meta,
                tracks
                    .iter()
                    .filter(|t| t.is_simplified())
                    .map(|t| t.id.as_str()),
            );
            for track in fetch_records::<Track>(client, "tracks", &ids, TRACKS_BATCH_SIZE) {
                self.tracks.insert(track.id.clone(), track);
            }
        }

        if requirements.artist {
            let ids = self.pending(
                Dimension::Artist,
                tracks
                    .iter()
                    .filter_map(Track::primary_artist)
                    .filter(|a| a.is_simplified())
                    .filter_map(|a| a.id.as_deref()),
            );
            for artist in fetch_records::<Artist>(client, "artists", &ids, ARTISTS_BATCH_SIZE) {
                if let Some(id) = artist.id.clone() {
                    self.artists.insert(id, artist);
                }
            }
        }

        if requirements.album {
            let ids = self.pending(
                Dimension::Album,
                tracks
                    .iter()
                    .filter_map(|t| t.album.as_ref())
                    .filter(|a| a.is_simplified())
                    .filter_map(|a| a.id.as_deref()),
            );
            for album in fetch_records::<Album>(client, "albums", &ids, ALBUMS_BATCH_SIZE) {
                if let Some(id) = album.id.clone() {
                    self.albums.insert(id, album);
                }
            }
        }

        // Tracks never carry features inline.
        if requirements.features {
            let ids = self.pending(Dimension::Features, tracks.iter().map(|t| t.id.as_str()));
            for features in
                fetch_records::<AudioFeatures>(client, "audio-features", &ids, AUDIO_FEATURES_BATCH_SIZE)
            {
                self.features.insert(features.id.clone(), features);
            }
        }
    }

    /// Unique ids not yet requested for `dimension`, in first-seen order.
    /// The returned ids are marked as requested.
    fn pending<'a>(&mut self, dimension: Dimension, ids: impl Iterator<Item = &'a str>) -> Vec<String> {
        let mut pending = Vec::new();
        for id in ids {
            let key = (dimension, id.to_string());
            if self.is_cached(dimension, id) || self.requested.contains(&key) {
                continue;
            }
            self.requested.insert(key);
            pending.push(id.to_string());
        }
        pending
    }

    fn is_cached(&self, dimension: Dimension, id: &str) -> bool {
        match dimension {
            Dimension::Meta => self.tracks.contains_key(id),
            Dimension::Artist => self.artists.contains_key(id),
            Dimension::Album => self.albums.contains_key(id),
            Dimension::Features => self.features.contains_key(id),
        }
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn artist(&self, id: &str) -> Option<&Artist> {
        self.artists.get(id)
    }

    pub fn album(&self, id: &str) -> Option<&Album> {
        self.albums.get(id)
    }

    pub fn features(&self, id: &str) -> Option<&AudioFeatures> {
        self.features.get(id)
    }

    /// The cached full track, else the track itself.
    pub fn meta_of<'a>(&'a self, track: &'a Track) -> &'a Track {
        self.tracks.get(&track.id).unwrap_or(track)
    }

    /// The cached full primary artist, else the embedded one.
    pub fn artist_of<'a>(&'a self, track: &'a Track) -> Option<&'a Artist> {
        let embedded = track.primary_artist()?;
        embedded
            .id
            .as_deref()
            .and_then(|id| self.artists.get(id))
            .or(Some(embedded))
    }

    /// The cached full album, else the embedded one.
    pub fn album_of<'a>(&'a self, track: &'a Track) -> Option<&'a Album> {
        let embedded = track.album.as_ref()?;
        embedded
            .id
            .as_deref()
            .and_then(|id| self.albums.get(id))
            .or(Some(embedded))
    }

    pub fn features_of(&self, track: &Track) -> Option<&AudioFeatures> {
        self.features.get(&track.id)
    }
}

fn fetch_records<T: DeserializeOwned>(
    client: &CatalogClient,
    kind: &str,
    ids: &[String],
    batch_size: usize,
) -> Vec<T> {
    if ids.is_empty() {
        return Vec::new();
    }
    log::debug!("Fetching {} full {} records", ids.len(), kind);
    client
        .get_full_records_by_ids::<T>(kind, ids, batch_size)
        .into_iter()
        .flatten()
        .collect()
}
