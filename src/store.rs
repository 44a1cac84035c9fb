//! Storage gateway over a single SQLite connection.
//!
//! [`Warehouse`] owns the connection and the [`QueryRegistry`]. Each input
//! file is loaded through a [`FileWriter`], which wraps one transaction and
//! is committed when the file is done.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{EtlError, Result};
use crate::models::{Artist, Song, SongPlay, TimeEntry, User};
use crate::queries::QueryRegistry;

pub struct Warehouse {
    conn: Connection,
    queries: QueryRegistry,
}

impl Warehouse {
    /// Create (or open) the database file at `path`.
    pub fn create(path: &Path, busy_timeout: Duration, queries: QueryRegistry) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| EtlError::Connection {
            path: path.to_path_buf(),
            source,
        })?;
        Self::configure(conn, path, busy_timeout, queries)
    }

    /// Open an existing database. A missing file is a connection error
    /// rather than a silently created empty database.
    pub fn open(path: &Path, busy_timeout: Duration, queries: QueryRegistry) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|source| {
            EtlError::Connection {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::configure(conn, path, busy_timeout, queries)
    }

    pub fn open_in_memory(queries: QueryRegistry) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| EtlError::Connection {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Ok(Self { conn, queries })
    }

    fn configure(
        conn: Connection,
        path: &Path,
        busy_timeout: Duration,
        queries: QueryRegistry,
    ) -> Result<Self> {
        let connection_error = |source: rusqlite::Error| EtlError::Connection {
            path: path.to_path_buf(),
            source,
        };
        conn.busy_timeout(busy_timeout).map_err(connection_error)?;
        conn.pragma_update(None, "encoding", "UTF-8")
            .map_err(connection_error)?;
        let journal_mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(connection_error)?;
        debug!(
            ?path,
            %journal_mode,
            songplay_conflict = queries.songplay_conflict.as_str(),
            "configured connection"
        );
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(connection_error)?;
        Ok(Self { conn, queries })
    }

    pub fn queries(&self) -> &QueryRegistry {
        &self.queries
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Drop every table of the star schema if present.
    pub fn drop_tables(&self) -> Result<()> {
        for name in self.queries.table_names() {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS {}", name))
                .map_err(|e| EtlError::Schema {
                    table: name.to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    pub fn create_tables(&self) -> Result<()> {
        for table in &self.queries.tables {
            self.conn
                .execute_batch(table.create)
                .map_err(|e| EtlError::Schema {
                    table: table.name.to_string(),
                    reason: e.to_string(),
                })?;
            debug!(table = table.name, "created table");
        }
        Ok(())
    }

    /// Fail fast when the schema has not been created.
    pub fn verify_tables(&self) -> Result<()> {
        for name in self.queries.table_names() {
            let present: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )?;
            if present == 0 {
                return Err(EtlError::Schema {
                    table: name.to_string(),
                    reason: "table is missing, run create-tables first".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn row_count(&self, table: &str) -> Result<i64> {
        if !self.queries.table_names().any(|name| name == table) {
            return Err(EtlError::Schema {
                table: table.to_string(),
                reason: "not part of the star schema".to_string(),
            });
        }
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }

    /// Start the unit of work for one input file.
    pub fn begin_file(&mut self) -> Result<FileWriter<'_>> {
        let tx = self.conn.transaction()?;
        Ok(FileWriter {
            tx,
            queries: &self.queries,
        })
    }
}

/// Row operations inside one file's transaction. A failed statement does
/// not poison the transaction, so rows that did succeed are still
/// committed.
pub struct FileWriter<'a> {
    tx: Transaction<'a>,
    queries: &'a QueryRegistry,
}

impl FileWriter<'_> {
    /// Returns the number of rows written (0 when the song already exists).
    pub fn insert_song(&self, song: &Song) -> rusqlite::Result<usize> {
        let mut stmt = self.tx.prepare_cached(self.queries.song_insert)?;
        stmt.execute(params![
            song.song_id,
            song.title,
            song.artist_id,
            song.year,
            song.duration,
        ])
    }

    pub fn insert_artist(&self, artist: &Artist) -> rusqlite::Result<usize> {
        let mut stmt = self.tx.prepare_cached(self.queries.artist_insert)?;
        stmt.execute(params![
            artist.artist_id,
            artist.name,
            artist.location,
            artist.latitude,
            artist.longitude,
        ])
    }

    pub fn insert_time(&self, entry: &TimeEntry) -> rusqlite::Result<usize> {
        let mut stmt = self.tx.prepare_cached(self.queries.time_insert)?;
        stmt.execute(params![
            entry.start_time,
            entry.hour,
            entry.day,
            entry.week,
            entry.month,
            entry.year,
            entry.weekday,
        ])
    }

    pub fn upsert_user(&self, user: &User) -> rusqlite::Result<usize> {
        let mut stmt = self.tx.prepare_cached(self.queries.user_upsert)?;
        stmt.execute(params![
            user.user_id,
            user.first_name,
            user.last_name,
            user.gender,
            user.level,
        ])
    }

    /// Exact-match catalog lookup. `Ok(None)` is a normal miss.
    pub fn find_song(
        &self,
        title: &str,
        artist_name: &str,
        duration: f64,
    ) -> rusqlite::Result<Option<(String, String)>> {
        let mut stmt = self.tx.prepare_cached(self.queries.song_select)?;
        stmt.query_row(params![title, artist_name, duration], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()
    }

    pub fn insert_songplay(&self, play: &SongPlay) -> rusqlite::Result<usize> {
        let mut stmt = self.tx.prepare_cached(self.queries.songplay_insert)?;
        stmt.execute(params![
            play.start_time,
            play.user_id,
            play.level,
            play.song_id,
            play.artist_id,
            play.session_id,
            play.location,
            play.user_agent,
        ])
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}
