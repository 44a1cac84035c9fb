//! Core data models for the Sparkify star schema.
//!
//! Raw input records are deserialized with serde and then mapped field by
//! field into the typed rows that get loaded. Nothing downstream indexes
//! rows by position.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

use crate::error::RecordError;
use crate::transform::timestamp_from_millis;

/// Action marker for log records that represent a song play.
pub const PLAY_ACTION: &str = "NextSong";

// ============================================================================
// Input Records
// ============================================================================

/// One song-metadata file (a single JSON object).
#[derive(Clone, Debug, Deserialize)]
pub struct SongRecord {
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<Value>,
    pub artist_longitude: Option<Value>,
    pub year: Option<Value>,
    pub duration: Option<f64>,
}

/// One line of an event log file. Only `page` is mandatory at this stage;
/// play records are validated further by [`PlayEvent::try_from`].
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub page: String,
    pub ts: Option<i64>,
    #[serde(default, deserialize_with = "lenient_user_id")]
    pub user_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub length: Option<f64>,
}

impl LogRecord {
    pub fn is_play(&self) -> bool {
        self.page == PLAY_ACTION
    }
}

/// `userId` arrives as a string in the logs ("39"), empty for logged-out
/// sessions. Numbers are accepted too.
fn lenient_user_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("userId {} is not an integer", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("userId '{}' is not an integer", s))),
        Some(other) => Err(de::Error::custom(format!("unexpected userId {}", other))),
    }
}

// ============================================================================
// Dimension Rows
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Song {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i32,
    pub duration: f64,
}

/// Latitude and longitude are kept as text, matching the `artists` schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artist {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// Users are deduplicated on the whole tuple, so a level change inside one
/// file yields two rows.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct User {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub level: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeEntry {
    /// `YYYY-MM-DD HH:MM:SS.fff`, UTC
    pub start_time: String,
    pub hour: u32,
    pub day: u32,
    /// ISO-8601 week number
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: String,
}

// ============================================================================
// Fact Rows
// ============================================================================

/// A validated play record.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayEvent {
    pub start_time: DateTime<Utc>,
    pub user: User,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub length: Option<f64>,
}

impl PlayEvent {
    /// Title, artist and duration used for catalog resolution, when all
    /// three are present.
    pub fn lookup_key(&self) -> Option<(&str, &str, f64)> {
        match (&self.song, &self.artist, self.length) {
            (Some(song), Some(artist), Some(length)) => {
                Some((song.as_str(), artist.as_str(), length))
            }
            _ => None,
        }
    }
}

impl TryFrom<LogRecord> for PlayEvent {
    type Error = RecordError;

    fn try_from(record: LogRecord) -> Result<Self, Self::Error> {
        Ok(PlayEvent {
            start_time: timestamp_from_millis(record.ts.ok_or(RecordError::MissingField("ts"))?)?,
            user: User {
                user_id: record.user_id.ok_or(RecordError::MissingField("userId"))?,
                first_name: record
                    .first_name
                    .ok_or(RecordError::MissingField("firstName"))?,
                last_name: record.last_name.ok_or(RecordError::MissingField("lastName"))?,
                gender: record.gender.ok_or(RecordError::MissingField("gender"))?,
                level: record.level.ok_or(RecordError::MissingField("level"))?,
            },
            session_id: record
                .session_id
                .ok_or(RecordError::MissingField("sessionId"))?,
            location: record.location,
            user_agent: record.user_agent,
            song: record.song,
            artist: record.artist,
            length: record.length,
        })
    }
}

/// Fact row. `songplay_id` is assigned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct SongPlay {
    pub start_time: String,
    pub user_id: i64,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> LogRecord {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_user_id_from_string() {
        let record = parse(r#"{"page":"NextSong","userId":"39"}"#);
        assert_eq!(record.user_id, Some(39));
    }

    #[test]
    fn test_user_id_blank_or_numeric() {
        assert_eq!(parse(r#"{"page":"Home","userId":""}"#).user_id, None);
        assert_eq!(parse(r#"{"page":"Home","userId":8}"#).user_id, Some(8));
        assert_eq!(parse(r#"{"page":"Home"}"#).user_id, None);
    }

    #[test]
    fn test_user_id_garbage_rejected() {
        let result: Result<LogRecord, _> =
            serde_json::from_str(r#"{"page":"NextSong","userId":"abc"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_page_rejected() {
        let result: Result<LogRecord, _> = serde_json::from_str(r#"{"userId":"1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_play_event_requires_session() {
        let record = parse(
            r#"{"page":"NextSong","ts":1,"userId":"1","firstName":"A","lastName":"B","gender":"F","level":"free"}"#,
        );
        let err = PlayEvent::try_from(record).unwrap_err();
        assert!(matches!(err, RecordError::MissingField("sessionId")));
    }

    #[test]
    fn test_play_event_rejects_out_of_range_ts() {
        let record = parse(
            r#"{"page":"NextSong","ts":9223372036854775807,"userId":"1","firstName":"A","lastName":"B","gender":"F","level":"free","sessionId":3}"#,
        );
        let err = PlayEvent::try_from(record).unwrap_err();
        assert!(matches!(err, RecordError::InvalidField { field: "ts", .. }));
    }

    #[test]
    fn test_lookup_key_needs_all_parts() {
        let record = parse(
            r#"{"page":"NextSong","ts":1,"userId":"1","firstName":"A","lastName":"B","gender":"F","level":"free","sessionId":3,"song":"T","artist":"AR"}"#,
        );
        let event = PlayEvent::try_from(record).unwrap();
        assert!(event.lookup_key().is_none());
    }
}
