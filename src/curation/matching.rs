//! Name patterns and played/added date windows.

use chrono::{DateTime, Local, TimeZone, Utc};
use regex::RegexBuilder;

use crate::catalog::Track;
use crate::curation::range::relative_bounds;
use crate::errors::CuratorError;

pub const MIX_PATTERN: &str = "mix|club";
pub const CYRILLIC_PATTERN: &str = "^[а-яА-Я]+";
pub const LATIN_PATTERN: &str = "^[a-zA-Z0-9]+";
pub const NON_ORIGINAL_PATTERN: &str = "mix|club|radio|piano|acoustic|edit|live|version|cover";

/// Keeps tracks whose name or album name matches `pattern`, case-insensitive.
/// With `invert`, keeps the non-matching ones.
pub fn match_pattern(tracks: &mut Vec<Track>, pattern: &str, invert: bool) -> Result<(), CuratorError> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| CuratorError::Config(format!("Invalid pattern '{}': {}", pattern, e)))?;

    tracks.retain(|track| {
        let album_name = track.album.as_ref().map(|a| a.name.as_str()).unwrap_or_default();
        let matched = regex.is_match(&track.name) || regex.is_match(album_name);
        matched != invert
    });
    Ok(())
}

fn apply_builtin(tracks: &mut Vec<Track>, pattern: &str, invert: bool) {
    if let Err(e) = match_pattern(tracks, pattern, invert) {
        log::error!("{}", e);
    }
}

pub fn match_except(tracks: &mut Vec<Track>, pattern: &str) -> Result<(), CuratorError> {
    match_pattern(tracks, pattern, true)
}

/// Drops remixes and club edits.
pub fn match_except_mix(tracks: &mut Vec<Track>) {
    apply_builtin(tracks, MIX_PATTERN, true);
}

/// Drops tracks titled in Cyrillic.
pub fn match_except_ru(tracks: &mut Vec<Track>) {
    apply_builtin(tracks, CYRILLIC_PATTERN, true);
}

pub fn match_latin_only(tracks: &mut Vec<Track>) {
    apply_builtin(tracks, LATIN_PATTERN, false);
}

/// Drops alternate takes: remixes, radio and live versions, covers.
pub fn match_original_only(tracks: &mut Vec<Track>) {
    apply_builtin(tracks, NON_ORIGINAL_PATTERN, true);
}

/// Keeps tracks played (or added) between the start of the day
/// `since_days` ago and the end of the day `before_days` ago.
pub fn range_date_rel(tracks: &mut Vec<Track>, since_days: u32, before_days: u32) {
    range_date_rel_at(tracks, since_days, before_days, &Local::now());
}

pub fn range_date_rel_at<Tz: TimeZone>(tracks: &mut Vec<Track>, since_days: u32, before_days: u32, now: &DateTime<Tz>) {
    match relative_bounds(now, since_days, before_days) {
        Some((start, end)) => range_date_abs(tracks, start, end),
        None => log::error!("Day window {}..{} is out of range", since_days, before_days),
    }
}

/// Keeps tracks whose timestamp lies in `[start, end]`. Tracks without a
/// timestamp count as played at the sentinel date. A window whose start is
/// not before its end is a config error and leaves `tracks` as is.
pub fn range_date_abs(tracks: &mut Vec<Track>, start: DateTime<Utc>, end: DateTime<Utc>) {
    if start >= end {
        log::error!(
            "{}",
            CuratorError::Config(format!("Window start {} is not before end {}", start, end))
        );
        return;
    }
    tracks.retain(|track| {
        let at = track.timestamp();
        at >= start && at <= end
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Album;
    use chrono::TimeZone;

    fn named(id: &str, name: &str, album: &str) -> Track {
        Track::new(id, name, 0).with_album(Album::new(id, album))
    }

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_original_only_checks_track_and_album() {
        let mut tracks = vec![
            named("1", "Song", "Record"),
            named("2", "Song (Radio Edit)", "Record"),
            named("3", "Song", "Live at Wembley"),
            named("4", "Another", "Acoustic Sessions"),
        ];
        match_original_only(&mut tracks);
        assert_eq!(ids(&tracks), vec!["1"]);
    }

    #[test]
    fn test_script_filters() {
        let mut tracks = vec![
            named("ru", "Привет", "Альбом"),
            named("en", "Hello", "Album"),
            named("sym", "(intro)", "..."),
        ];
        let mut latin = tracks.clone();
        match_latin_only(&mut latin);
        assert_eq!(ids(&latin), vec!["en"]);

        match_except_ru(&mut tracks);
        assert_eq!(ids(&tracks), vec!["en", "sym"]);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let mut tracks = vec![named("1", "a", "b")];
        assert!(matches!(
            match_pattern(&mut tracks, "(", false),
            Err(CuratorError::Config(_))
        ));
        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn test_range_date_rel() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mut tracks = vec![
            Track::new("today", "", 0).with_played_at("2024-06-15T08:00:00Z"),
            Track::new("yesterday", "", 0).with_played_at("2024-06-14T23:59:59Z"),
            Track::new("week", "", 0).with_played_at("2024-06-08T00:00:00Z"),
            Track::new("never", "", 0),
        ];
        range_date_rel_at(&mut tracks, 7, 1, &now);
        assert_eq!(ids(&tracks), vec!["yesterday", "week"]);
    }

    #[test]
    fn test_range_date_abs_rejects_inverted_window() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut tracks = vec![Track::new("a", "", 0)];
        range_date_abs(&mut tracks, start, end);
        assert_eq!(tracks.len(), 1);

        range_date_abs(&mut tracks, end, start);
        assert!(tracks.is_empty());
    }
}
