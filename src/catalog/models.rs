use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Timestamp assumed for tracks that carry neither `played_at` nor `added_at`.
pub const SENTINEL_TIMESTAMP: &str = "2000-01-01T00:00:00.000Z";
const SENTINEL_EPOCH_SECS: i64 = 946_684_800;

const TRACK_STRIPPED_FIELDS: &[&str] = &[
    "uri",
    "type",
    "track_number",
    "is_local",
    "preview_url",
    "href",
    "external_urls",
    "external_ids",
    "disc_number",
    "available_markets",
    "track",
    "context",
];
const ALBUM_STRIPPED_FIELDS: &[&str] = &[
    "available_markets",
    "external_urls",
    "href",
    "images",
    "type",
    "uri",
];
const ARTIST_STRIPPED_FIELDS: &[&str] = &["href", "type", "uri", "external_urls", "images"];

/// A scalar read off a catalog record for filtering and sorting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AttrValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(AttrValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(AttrValue::Number),
            Value::String(s) => Some(AttrValue::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            AttrValue::Bool(_) => 0,
            AttrValue::Number(_) => 1,
            AttrValue::Text(_) => 2,
        }
    }

    /// Total order: numbers numerically, text ordinally, mixed kinds by kind.
    pub fn compare(&self, other: &AttrValue) -> Ordering {
        match (self, other) {
            (AttrValue::Number(a), AttrValue::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (AttrValue::Text(a), AttrValue::Text(b)) => a.cmp(b),
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Missing values order before present ones.
pub fn compare_attr(a: Option<&AttrValue>, b: Option<&AttrValue>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.compare(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Uniform attribute access over tracks, artists, albums and audio features.
pub trait Attributes {
    fn attribute(&self, key: &str) -> Option<AttrValue>;

    fn genres(&self) -> &[String] {
        &[]
    }

    fn release_date(&self) -> Option<&str> {
        None
    }
}

fn extra_attribute(extra: &Map<String, Value>, key: &str) -> Option<AttrValue> {
    extra.get(key).and_then(AttrValue::from_json)
}

// The catalog sends followers either as `{ "total": n }` or, in stored logs, as a bare count.
fn deserialize_followers<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Some(Value::Object(obj)) => obj.get("total").and_then(Value::as_u64),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u32>,
    #[serde(
        default,
        deserialize_with = "deserialize_followers",
        skip_serializing_if = "Option::is_none"
    )]
    pub followers: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Artist {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Embedded artists lack popularity; standalone fetches carry it.
    pub fn is_simplified(&self) -> bool {
        self.popularity.is_none()
    }

    pub fn compress(&mut self) {
        for key in ARTIST_STRIPPED_FIELDS {
            self.extra.remove(*key);
        }
    }
}

impl Attributes for Artist {
    fn attribute(&self, key: &str) -> Option<AttrValue> {
        match key {
            "id" => self.id.clone().map(AttrValue::Text),
            "name" => Some(AttrValue::Text(self.name.clone())),
            "popularity" => self.popularity.map(|p| AttrValue::Number(p as f64)),
            "followers" => self.followers.map(|f| AttrValue::Number(f as f64)),
            _ => extra_attribute(&self.extra, key),
        }
    }

    fn genres(&self) -> &[String] {
        &self.genres
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artists: Vec<Artist>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Album {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn is_simplified(&self) -> bool {
        self.popularity.is_none()
    }

    pub fn compress(&mut self) {
        for key in ALBUM_STRIPPED_FIELDS {
            self.extra.remove(*key);
        }
        self.artists.iter_mut().for_each(Artist::compress);
    }
}

impl Attributes for Album {
    fn attribute(&self, key: &str) -> Option<AttrValue> {
        match key {
            "id" => self.id.clone().map(AttrValue::Text),
            "name" => Some(AttrValue::Text(self.name.clone())),
            "popularity" => self.popularity.map(|p| AttrValue::Number(p as f64)),
            "release_date" => self.release_date.clone().map(AttrValue::Text),
            _ => extra_attribute(&self.extra, key),
        }
    }

    fn genres(&self) -> &[String] {
        &self.genres
    }

    fn release_date(&self) -> Option<&str> {
        self.release_date.as_deref()
    }
}

/// Audio analysis values for one track (tempo, energy, key, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl Attributes for AudioFeatures {
    fn attribute(&self, key: &str) -> Option<AttrValue> {
        match key {
            "id" => Some(AttrValue::Text(self.id.clone())),
            _ => extra_attribute(&self.values, key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<Album>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub played_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Track {
    pub fn new(id: &str, name: &str, duration_ms: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            duration_ms,
            artists: Vec::new(),
            album: None,
            popularity: None,
            played_at: None,
            added_at: None,
            extra: Map::new(),
        }
    }

    pub fn with_artist(mut self, artist: Artist) -> Self {
        self.artists.push(artist);
        self
    }

    pub fn with_album(mut self, album: Album) -> Self {
        self.album = Some(album);
        self
    }

    pub fn with_played_at(mut self, played_at: &str) -> Self {
        self.played_at = Some(played_at.to_string());
        self
    }

    pub fn primary_artist(&self) -> Option<&Artist> {
        self.artists.first()
    }

    pub fn primary_artist_id(&self) -> Option<&str> {
        self.primary_artist().and_then(|a| a.id.as_deref())
    }

    pub fn album_id(&self) -> Option<&str> {
        self.album.as_ref().and_then(|a| a.id.as_deref())
    }

    pub fn is_simplified(&self) -> bool {
        self.popularity.is_none()
    }

    /// The populated timestamp field as stored, or the sentinel.
    pub fn timestamp_raw(&self) -> &str {
        self.played_at
            .as_deref()
            .or(self.added_at.as_deref())
            .unwrap_or(SENTINEL_TIMESTAMP)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        parse_timestamp(self.timestamp_raw()).unwrap_or_else(sentinel)
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp().timestamp_millis()
    }

    /// Lowercase `name:primary artist` key used for fuzzy duplicate detection.
    pub fn name_key(&self) -> Option<String> {
        let artist = self.primary_artist()?;
        Some(format!("{}:{}", self.name, artist.name).to_lowercase())
    }

    /// Drops fields the history logs never read.
    pub fn compress(&mut self) {
        for key in TRACK_STRIPPED_FIELDS {
            self.extra.remove(*key);
        }
        if let Some(album) = self.album.as_mut() {
            album.compress();
        }
        self.artists.iter_mut().for_each(Artist::compress);
    }
}

impl Attributes for Track {
    fn attribute(&self, key: &str) -> Option<AttrValue> {
        match key {
            "id" => Some(AttrValue::Text(self.id.clone())),
            "name" => Some(AttrValue::Text(self.name.clone())),
            "duration_ms" => Some(AttrValue::Number(self.duration_ms as f64)),
            "popularity" => self.popularity.map(|p| AttrValue::Number(p as f64)),
            "played_at" | "added_at" => {
                let raw = if key == "played_at" {
                    self.played_at.as_deref()
                } else {
                    self.added_at.as_deref()
                };
                let time = raw
                    .and_then(parse_timestamp)
                    .unwrap_or_else(sentinel);
                Some(AttrValue::Number(time.timestamp_millis() as f64))
            }
            _ => extra_attribute(&self.extra, key),
        }
    }
}

pub fn sentinel() -> DateTime<Utc> {
    DateTime::from_timestamp(SENTINEL_EPOCH_SECS, 0).unwrap_or_default()
}

/// Parses the timestamp shapes the catalog and history sources emit:
/// RFC 3339, naive ISO, "01 Jan 2024, 10:00", and release dates of
/// day, month or year precision.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%d %b %Y, %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    let date = match raw.len() {
        4 => raw
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        7 => NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok(),
    }?;
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_followers_normalized_from_object_or_count() {
        let from_object: Artist =
            serde_json::from_value(json!({ "id": "a", "name": "A", "followers": { "href": null, "total": 42 } }))
                .unwrap();
        let from_count: Artist =
            serde_json::from_value(json!({ "id": "a", "name": "A", "followers": 42 })).unwrap();

        assert_eq!(from_object.followers, Some(42));
        assert_eq!(from_object, from_count);
        assert_eq!(serde_json::to_value(&from_object).unwrap()["followers"], json!(42));
    }

    #[test]
    fn test_track_round_trips_unknown_fields() {
        let raw = json!({
            "id": "t1",
            "name": "Song",
            "duration_ms": 1000,
            "artists": [{ "id": "a1", "name": "Band", "uri": "spotify:artist:a1" }],
            "album": { "id": "al1", "name": "Record", "images": [], "release_date": "2020-05-01" },
            "explicit": true,
            "uri": "spotify:track:t1",
            "played_at": "2024-01-01T10:00:00.000Z"
        });
        let track: Track = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(track.attribute("explicit"), Some(AttrValue::Bool(true)));
        assert_eq!(serde_json::to_value(&track).unwrap(), raw);
    }

    #[test]
    fn test_compress_strips_declared_fields() {
        let mut track: Track = serde_json::from_value(json!({
            "id": "t1",
            "name": "Song",
            "artists": [{ "id": "a1", "name": "Band", "href": "x", "genres": ["rock"] }],
            "album": { "id": "al1", "name": "Record", "images": [1], "album_type": "album" },
            "uri": "spotify:track:t1",
            "explicit": false
        }))
        .unwrap();

        track.compress();

        let value = serde_json::to_value(&track).unwrap();
        assert!(value.get("uri").is_none());
        assert_eq!(value["explicit"], json!(false));
        assert!(value["album"].get("images").is_none());
        assert_eq!(value["album"]["album_type"], json!("album"));
        assert!(value["artists"][0].get("href").is_none());
        assert_eq!(value["artists"][0]["genres"], json!(["rock"]));
    }

    #[test]
    fn test_null_id_rejected() {
        let parsed = serde_json::from_value::<Track>(json!({ "id": null, "name": "Local file" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_timestamp_defaults_to_sentinel() {
        let track = Track::new("t", "n", 0);
        assert_eq!(track.timestamp_raw(), SENTINEL_TIMESTAMP);
        assert_eq!(track.timestamp(), sentinel());
        assert_eq!(sentinel().to_rfc3339(), "2000-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let full = parse_timestamp("2024-03-05T10:20:30.500Z").unwrap();
        assert_eq!(full.timestamp_millis() % 1000, 500);
        assert!(parse_timestamp("05 Mar 2024, 10:20").is_some());
        assert_eq!(
            parse_timestamp("2024").unwrap(),
            parse_timestamp("2024-01-01").unwrap()
        );
        assert_eq!(
            parse_timestamp("2024-03").unwrap(),
            parse_timestamp("2024-03-01T00:00:00Z").unwrap()
        );
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn test_attr_compare() {
        assert_eq!(
            AttrValue::Text("B".into()).compare(&AttrValue::Text("a".into())),
            Ordering::Less
        );
        assert_eq!(
            AttrValue::Number(2.0).compare(&AttrValue::Number(10.0)),
            Ordering::Less
        );
        assert_eq!(compare_attr(None, Some(&AttrValue::Number(0.0))), Ordering::Less);
    }

    #[test]
    fn test_name_key_requires_artist() {
        let bare = Track::new("t", "Song", 0);
        assert_eq!(bare.name_key(), None);
        let full = bare.with_artist(Artist::new("a", "Band"));
        assert_eq!(full.name_key().as_deref(), Some("song:band"));
    }
}
