//! Per-run counters: rows landed, records skipped and the resolution hit rate.

use serde::Serialize;
use tracing::info;

use crate::progress::format_duration;

/// Destination table of a row write, for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Song,
    Artist,
    Time,
    User,
    Songplay,
}

impl Target {
    pub fn table(self) -> &'static str {
        match self {
            Target::Song => "songs",
            Target::Artist => "artists",
            Target::Time => "time",
            Target::User => "users",
            Target::Songplay => "songplays",
        }
    }
}

#[derive(Default, Debug, Clone, Serialize)]
pub struct RunSummary {
    // Files
    pub files_found: usize,
    pub files_processed: usize,

    // Input records (one per song file, one per log line)
    pub records_read: usize,
    pub records_skipped: usize,

    // Rows written
    pub songs_inserted: usize,
    pub artists_inserted: usize,
    pub time_rows_inserted: usize,
    pub users_upserted: usize,
    pub songplays_inserted: usize,
    /// Writes that hit an existing key and changed nothing
    pub duplicates_ignored: usize,
    /// Writes the store rejected
    pub rows_failed: usize,

    // Resolution
    pub resolution_attempts: usize,
    pub resolution_hits: usize,
    pub lookup_failures: usize,

    /// Conflict policy the songplay rows were written under
    pub songplay_conflict: &'static str,
    pub elapsed_seconds: f64,
}

impl RunSummary {
    /// Resolution hit rate as a percentage of attempted lookups
    pub fn resolution_hit_rate(&self) -> f64 {
        if self.resolution_attempts == 0 {
            0.0
        } else {
            100.0 * self.resolution_hits as f64 / self.resolution_attempts as f64
        }
    }

    /// Record the outcome of one successful write statement.
    pub fn record_write(&mut self, target: Target, changed: usize) {
        if changed == 0 {
            self.duplicates_ignored += 1;
            return;
        }
        let counter = match target {
            Target::Song => &mut self.songs_inserted,
            Target::Artist => &mut self.artists_inserted,
            Target::Time => &mut self.time_rows_inserted,
            Target::User => &mut self.users_upserted,
            Target::Songplay => &mut self.songplays_inserted,
        };
        *counter += changed;
    }

    pub fn log_summary(&self) {
        info!("{:=<60}", "");
        info!("Load complete");
        info!("  Files processed: {}/{}", self.files_processed, self.files_found);
        info!(
            "  Records read: {} ({} skipped)",
            self.records_read, self.records_skipped
        );
        info!(
            "  Inserted: {} songs, {} artists, {} time rows, {} users, {} songplays",
            self.songs_inserted,
            self.artists_inserted,
            self.time_rows_inserted,
            self.users_upserted,
            self.songplays_inserted
        );
        info!(
            "  Ignored duplicates: {}, failed rows: {}",
            self.duplicates_ignored, self.rows_failed
        );
        info!(
            "  Resolution: {}/{} ({:.1}%), lookup failures: {}",
            self.resolution_hits,
            self.resolution_attempts,
            self.resolution_hit_rate(),
            self.lookup_failures
        );
        info!("  Songplay conflict policy: {}", self.songplay_conflict);
        info!(
            "  Elapsed: {}",
            format_duration(std::time::Duration::from_secs_f64(self.elapsed_seconds))
        );
        info!("{:=<60}", "");
    }

    /// Write the summary as pretty JSON
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
