//! Per-file processors for the song and event pipelines.
//!
//! Both take the open [`FileWriter`] for the file's transaction. Bad records
//! and rejected rows are logged and counted; only an unreadable file is
//! returned as an error.

use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{EtlError, RecordError, Result};
use crate::models::{LogRecord, PlayEvent, SongPlay, SongRecord};
use crate::stats::{RunSummary, Target};
use crate::store::FileWriter;
use crate::transform::{self, format_start_time};

/// Raw bytes of a data file. Text decoding happens per record, so bad
/// encoding in one record does not fail the whole file.
fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| EtlError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn write_row(
    summary: &mut RunSummary,
    target: Target,
    path: &Path,
    result: rusqlite::Result<usize>,
) {
    match result {
        Ok(changed) => summary.record_write(target, changed),
        Err(e) => {
            warn!(
                file = %path.display(),
                table = target.table(),
                error = %e,
                "Unable to insert row"
            );
            summary.rows_failed += 1;
        }
    }
}

// ============================================================================
// Song Pipeline
// ============================================================================

/// First JSON object of a song file. Song files hold a single record.
fn parse_song_file(contents: &[u8]) -> std::result::Result<SongRecord, RecordError> {
    let mut records = serde_json::Deserializer::from_slice(contents).into_iter::<SongRecord>();
    match records.next() {
        Some(record) => Ok(record?),
        None => Err(RecordError::InvalidField {
            field: "record",
            reason: "file holds no JSON object".to_string(),
        }),
    }
}

/// Load the song and artist rows of one song-metadata file.
pub fn process_song_file(writer: &FileWriter<'_>, path: &Path, summary: &mut RunSummary) -> Result<()> {
    let contents = read_file(path)?;
    summary.records_read += 1;

    let rows = parse_song_file(&contents).and_then(transform::song_and_artist);
    let (song, artist) = match rows {
        Ok(rows) => rows,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Skipping song record");
            summary.records_skipped += 1;
            return Ok(());
        }
    };

    write_row(summary, Target::Song, path, writer.insert_song(&song));
    write_row(summary, Target::Artist, path, writer.insert_artist(&artist));
    Ok(())
}

// ============================================================================
// Event Pipeline
// ============================================================================

/// `Ok(None)` for valid records that are not plays. Invalid UTF-8 is a
/// JSON error like any other malformed line.
pub fn parse_log_line(line: &[u8]) -> std::result::Result<Option<PlayEvent>, RecordError> {
    let record: LogRecord = serde_json::from_slice(line)?;
    if !record.is_play() {
        return Ok(None);
    }
    PlayEvent::try_from(record).map(Some)
}

/// Resolve a play to its catalog (song_id, artist_id). Misses and lookup
/// failures both resolve to `None`.
pub fn resolve_song(
    writer: &FileWriter<'_>,
    play: &PlayEvent,
    summary: &mut RunSummary,
) -> Option<(String, String)> {
    let (title, artist, length) = play.lookup_key()?;
    summary.resolution_attempts += 1;

    match writer.find_song(title, artist, length) {
        Ok(Some(ids)) => {
            debug!(title, artist, song_id = %ids.0, artist_id = %ids.1, "Resolved play");
            summary.resolution_hits += 1;
            Some(ids)
        }
        Ok(None) => {
            debug!(title, artist, length, "No catalog match");
            None
        }
        Err(e) => {
            warn!(title, artist, error = %e, "Unable to look up song and artist ids");
            summary.lookup_failures += 1;
            None
        }
    }
}

pub fn songplay_row(play: &PlayEvent, resolved: Option<(String, String)>) -> SongPlay {
    let (song_id, artist_id) = resolved.unzip();
    SongPlay {
        start_time: format_start_time(&play.start_time),
        user_id: play.user.user_id,
        level: play.user.level.clone(),
        song_id,
        artist_id,
        session_id: play.session_id,
        location: play.location.clone(),
        user_agent: play.user_agent.clone(),
    }
}

/// Load time, user and songplay rows for one event log file.
pub fn process_log_file(writer: &FileWriter<'_>, path: &Path, summary: &mut RunSummary) -> Result<()> {
    let contents = read_file(path)?;

    let mut plays = Vec::new();
    for (index, line) in contents.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        summary.records_read += 1;
        match parse_log_line(line) {
            Ok(Some(play)) => plays.push(play),
            Ok(None) => {}
            Err(e) => {
                warn!(file = %path.display(), line = index + 1, error = %e, "Skipping log record");
                summary.records_skipped += 1;
            }
        }
    }

    for entry in transform::time_entries(&plays) {
        write_row(summary, Target::Time, path, writer.insert_time(&entry));
    }

    for user in transform::unique_users(&plays) {
        write_row(summary, Target::User, path, writer.upsert_user(&user));
    }

    for play in &plays {
        let resolved = resolve_song(writer, play, summary);
        let row = songplay_row(play, resolved);
        write_row(summary, Target::Songplay, path, writer.insert_songplay(&row));
    }

    Ok(())
}
