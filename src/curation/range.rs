//! Attribute filtering over tracks and their enriched records.
//!
//! Rules come in four optional groups (track meta, audio features, primary
//! artist, album). An absent group matches everything. Within a group every
//! constraint must hold. Rules are plain JSON:
//!
//! ```json
//! {
//!   "meta": [{ "kind": "range", "key": "popularity", "min": 30, "max": 80 }],
//!   "artist": [
//!     { "kind": "genre_allow", "terms": ["rock"] },
//!     { "kind": "genre_ban", "terms": ["metal"] }
//!   ],
//!   "album": [{ "kind": "date_window", "since_days": 30 }]
//! }
//! ```

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::models::parse_timestamp;
use crate::catalog::{AttrValue, Attributes, Track};
use crate::context::RunContext;
use crate::errors::CuratorError;
use crate::metadata::{MetadataCache, Requirements};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateWindow {
    /// Whole days back from today: from the start of the day `since_days`
    /// ago to the end of the day `before_days` ago.
    Relative {
        since_days: u32,
        #[serde(default)]
        before_days: u32,
    },
    Absolute { start: String, end: String },
}

/// Start of the day `since_days` ago through the end of the day
/// `before_days` ago, in `now`'s timezone.
pub fn relative_bounds<Tz: TimeZone>(
    now: &DateTime<Tz>,
    since_days: u32,
    before_days: u32,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let at = |days: u32, time: NaiveTime| {
        let day = (now.clone() - Duration::days(days as i64)).date_naive();
        day.and_time(time)
            .and_local_timezone(now.timezone())
            .earliest()
            .map(|t| t.with_timezone(&Utc))
    };
    let start = at(since_days, NaiveTime::from_hms_opt(0, 0, 0)?)?;
    let end = at(before_days, NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?)?;
    Some((start, end))
}

impl DateWindow {
    pub fn bounds_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<(DateTime<Utc>, DateTime<Utc>), CuratorError> {
        let (start, end) = match self {
            DateWindow::Relative {
                since_days,
                before_days,
            } => relative_bounds(now, *since_days, *before_days)
                .ok_or_else(|| CuratorError::Config("Relative window out of range".to_string()))?,
            DateWindow::Absolute { start, end } => {
                let parse = |raw: &str| {
                    parse_timestamp(raw)
                        .ok_or_else(|| CuratorError::Config(format!("Unreadable date '{}'", raw)))
                };
                (parse(start)?, parse(end)?)
            }
        };
        if start >= end {
            return Err(CuratorError::Config(format!(
                "Window start {} is not before end {}",
                start, end
            )));
        }
        Ok((start, end))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Inclusive on both ends; a missing bound is open.
    #[serde(rename = "range")]
    NumericRange {
        key: String,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    Equals {
        key: String,
        value: AttrValue,
    },
    GenreAllow {
        terms: Vec<String>,
    },
    GenreBan {
        terms: Vec<String>,
    },
    DateWindow(DateWindow),
}

impl Constraint {
    fn validate(&self) -> Result<(), CuratorError> {
        match self {
            Constraint::NumericRange { key, min: Some(min), max: Some(max) } if min > max => {
                Err(CuratorError::Config(format!(
                    "Range for '{}' has min {} above max {}",
                    key, min, max
                )))
            }
            Constraint::DateWindow(window) => window.bounds_at(&Local::now()).map(|_| ()),
            _ => Ok(()),
        }
    }

    fn holds<Tz: TimeZone>(&self, record: &dyn Attributes, now: &DateTime<Tz>) -> bool {
        match self {
            Constraint::NumericRange { key, min, max } => match record.attribute(key) {
                Some(AttrValue::Number(value)) => {
                    !(min.is_some_and(|min| value < min) || max.is_some_and(|max| value > max))
                }
                // Missing or non-numeric values do not exclude.
                _ => true,
            },
            Constraint::Equals { key, value } => match record.attribute(key) {
                Some(AttrValue::Bool(false)) => true,
                Some(actual) => actual == *value,
                None => false,
            },
            Constraint::GenreAllow { terms } => {
                terms.is_empty() || any_genre_contains(record.genres(), terms)
            }
            Constraint::GenreBan { terms } => !any_genre_contains(record.genres(), terms),
            Constraint::DateWindow(window) => {
                let Some(released) = record.release_date().and_then(parse_timestamp) else {
                    return true;
                };
                match window.bounds_at(now) {
                    Ok((start, end)) => released >= start && released <= end,
                    Err(_) => true,
                }
            }
        }
    }
}

fn any_genre_contains(genres: &[String], terms: &[String]) -> bool {
    terms
        .iter()
        .any(|term| genres.iter().any(|genre| genre.contains(term.as_str())))
}

/// A boolean `false` on the record never fails a constraint.
fn matches_all<Tz: TimeZone>(record: &dyn Attributes, constraints: &[Constraint], now: &DateTime<Tz>) -> bool {
    constraints.iter().all(|constraint| {
        let skipped = match constraint {
            Constraint::NumericRange { key, .. } | Constraint::Equals { key, .. } => {
                record.attribute(key) == Some(AttrValue::Bool(false))
            }
            _ => false,
        };
        skipped || constraint.holds(record, now)
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<Constraint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<Constraint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<Vec<Constraint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<Vec<Constraint>>,
}

impl RangeRules {
    pub fn validate(&self) -> Result<(), CuratorError> {
        [&self.meta, &self.features, &self.artist, &self.album]
            .into_iter()
            .flatten()
            .flatten()
            .try_for_each(Constraint::validate)
    }

    pub fn requirements(&self) -> Requirements {
        Requirements {
            meta: self.meta.is_some(),
            artist: self.artist.is_some(),
            album: self.album.is_some(),
            features: self.features.is_some(),
        }
    }

    /// Tracks lacking the record a group needs (no primary artist, no
    /// album, no audio features) fail that group.
    pub fn matches<Tz: TimeZone>(&self, cache: &MetadataCache, track: &Track, now: &DateTime<Tz>) -> bool {
        if let Some(rules) = &self.meta {
            if !matches_all(cache.meta_of(track), rules, now) {
                return false;
            }
        }
        if let Some(rules) = &self.features {
            match cache.features_of(track) {
                Some(features) if matches_all(features, rules, now) => {}
                _ => return false,
            }
        }
        if let Some(rules) = &self.artist {
            match cache.artist_of(track) {
                Some(artist) if matches_all(artist, rules, now) => {}
                _ => return false,
            }
        }
        if let Some(rules) = &self.album {
            match cache.album_of(track) {
                Some(album) if matches_all(album, rules, now) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Removes tracks that fail `rules`, returning them. The excluded set is
/// also kept on the context as `last_out_range`. Invalid rules are logged
/// and leave `tracks` untouched.
pub fn in_range(ctx: &mut RunContext, tracks: &mut Vec<Track>, rules: &RangeRules) -> Vec<Track> {
    in_range_at(ctx, tracks, rules, &Local::now())
}

pub fn in_range_at<Tz: TimeZone>(
    ctx: &mut RunContext,
    tracks: &mut Vec<Track>,
    rules: &RangeRules,
    now: &DateTime<Tz>,
) -> Vec<Track> {
    ctx.last_out_range.clear();
    if let Err(e) = rules.validate() {
        log::error!("Range filter skipped: {}", e);
        return Vec::new();
    }

    ctx.ensure(tracks, rules.requirements());
    let cache = &ctx.metadata;
    let (kept, excluded): (Vec<Track>, Vec<Track>) = tracks
        .drain(..)
        .partition(|track| rules.matches(cache, track, now));
    *tracks = kept;

    log::debug!("Range filter kept {}, excluded {}", tracks.len(), excluded.len());
    ctx.last_out_range = excluded.clone();
    excluded
}
