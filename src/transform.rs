//! Record-to-row transformations.
//!
//! Everything here is pure: song/artist extraction, time decomposition and
//! the per-file dedup of time and user rows. Loading happens in
//! [`crate::pipeline`].

use chrono::{DateTime, Datelike, Timelike, Utc};
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::error::RecordError;
use crate::models::{Artist, PlayEvent, Song, SongRecord, TimeEntry, User};

/// Text layout of `start_time` in the `time` and `songplays` tables.
pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// ============================================================================
// Song Metadata
// ============================================================================

/// Split a song-metadata record into its song and artist rows.
pub fn song_and_artist(record: SongRecord) -> Result<(Song, Artist), RecordError> {
    let artist_id = record.artist_id.ok_or(RecordError::MissingField("artist_id"))?;

    let song = Song {
        song_id: record.song_id.ok_or(RecordError::MissingField("song_id"))?,
        title: record.title.ok_or(RecordError::MissingField("title"))?,
        artist_id: artist_id.clone(),
        year: coerce_year(record.year.as_ref())?,
        duration: record.duration.ok_or(RecordError::MissingField("duration"))?,
    };

    let artist = Artist {
        artist_id,
        name: record
            .artist_name
            .ok_or(RecordError::MissingField("artist_name"))?,
        location: record.artist_location,
        latitude: coordinate_text("artist_latitude", record.artist_latitude.as_ref())?,
        longitude: coordinate_text("artist_longitude", record.artist_longitude.as_ref())?,
    };

    Ok((song, artist))
}

/// `year` is usually an integer but shows up as a whole float or a numeric
/// string in some dumps.
fn coerce_year(value: Option<&Value>) -> Result<i32, RecordError> {
    let invalid = |reason: String| RecordError::InvalidField {
        field: "year",
        reason,
    };

    let year = match value {
        None | Some(Value::Null) => return Err(RecordError::MissingField("year")),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 => f as i64,
            _ => return Err(invalid(format!("{} is not a whole number", n))),
        },
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(format!("'{}' is not a number", s)))?,
        Some(other) => return Err(invalid(format!("unexpected value {}", other))),
    };

    i32::try_from(year).map_err(|_| invalid(format!("{} out of range", year)))
}

/// Coordinates are stored as text. Numbers keep their JSON rendering.
fn coordinate_text(
    field: &'static str,
    value: Option<&Value>,
) -> Result<Option<String>, RecordError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(RecordError::InvalidField {
            field,
            reason: format!("expected number or string, got {}", other),
        }),
    }
}

// ============================================================================
// Time Dimension
// ============================================================================

pub fn timestamp_from_millis(ts: i64) -> Result<DateTime<Utc>, RecordError> {
    DateTime::from_timestamp_millis(ts).ok_or_else(|| RecordError::InvalidField {
        field: "ts",
        reason: format!("{} is out of range", ts),
    })
}

/// Render a play timestamp the way it is stored.
pub fn format_start_time(t: &DateTime<Utc>) -> String {
    t.format(START_TIME_FORMAT).to_string()
}

/// Decompose a play timestamp into a time-dimension row.
pub fn time_entry(t: &DateTime<Utc>) -> TimeEntry {
    TimeEntry {
        start_time: format_start_time(t),
        hour: t.hour(),
        day: t.day(),
        week: t.iso_week().week(),
        month: t.month(),
        year: t.year(),
        weekday: t.format("%A").to_string(),
    }
}

/// One time row per distinct timestamp, in first-seen order.
pub fn time_entries(plays: &[PlayEvent]) -> Vec<TimeEntry> {
    let mut seen = FxHashSet::default();
    plays
        .iter()
        .filter(|play| seen.insert(play.start_time))
        .map(|play| time_entry(&play.start_time))
        .collect()
}

// ============================================================================
// User Dimension
// ============================================================================

/// One user row per distinct (user_id, first_name, last_name, gender, level)
/// tuple, in first-seen order.
pub fn unique_users(plays: &[PlayEvent]) -> Vec<User> {
    let mut seen: FxHashSet<&User> = FxHashSet::default();
    let mut rows = Vec::new();
    for play in plays {
        if seen.insert(&play.user) {
            rows.push(play.user.clone());
        }
    }
    rows
}
