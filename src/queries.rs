//! SQL for the star schema.
//!
//! All statements live in a [`QueryRegistry`] that is built once and handed
//! to [`crate::store::Warehouse`]. Column layouts follow the downstream
//! contract; `SERIAL` is spelled the SQLite way.

use clap::ValueEnum;
use serde::Deserialize;

/// How fact rows handle a play that was already loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SongplayConflict {
    /// Every play becomes a new row; re-running a file duplicates its facts.
    #[default]
    Append,
    /// Skip a play whose (start_time, user_id, session_id) is already stored.
    NaturalKey,
}

impl SongplayConflict {
    /// Name used on the command line and in the settings file.
    pub fn as_str(self) -> &'static str {
        match self {
            SongplayConflict::Append => "append",
            SongplayConflict::NaturalKey => "natural-key",
        }
    }
}

/// DDL for one table.
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: &'static str,
    pub create: &'static str,
}

pub const SONGPLAYS: TableDef = TableDef {
    name: "songplays",
    create: "CREATE TABLE IF NOT EXISTS songplays (
        songplay_id INTEGER PRIMARY KEY AUTOINCREMENT,
        start_time TIMESTAMP,
        user_id INT,
        level VARCHAR,
        song_id VARCHAR,
        artist_id VARCHAR,
        session_id INT,
        location VARCHAR,
        user_agent VARCHAR
    );
    CREATE INDEX IF NOT EXISTS songplays_natural_key
        ON songplays (start_time, user_id, session_id);",
};

pub const USERS: TableDef = TableDef {
    name: "users",
    create: "CREATE TABLE IF NOT EXISTS users (
        user_id INT PRIMARY KEY,
        first_name VARCHAR,
        last_name VARCHAR,
        gender VARCHAR,
        level VARCHAR
    );",
};

pub const SONGS: TableDef = TableDef {
    name: "songs",
    create: "CREATE TABLE IF NOT EXISTS songs (
        song_id VARCHAR PRIMARY KEY,
        title VARCHAR,
        artist_id VARCHAR,
        year INT,
        duration FLOAT
    );",
};

pub const ARTISTS: TableDef = TableDef {
    name: "artists",
    create: "CREATE TABLE IF NOT EXISTS artists (
        artist_id VARCHAR PRIMARY KEY,
        name VARCHAR,
        location VARCHAR,
        latitude VARCHAR,
        longitude VARCHAR
    );",
};

pub const TIME: TableDef = TableDef {
    name: "time",
    create: "CREATE TABLE IF NOT EXISTS time (
        start_time TIMESTAMP PRIMARY KEY,
        hour INT,
        day INT,
        week INT,
        month INT,
        year INT,
        weekday VARCHAR
    );",
};

/// Every statement the loader runs.
#[derive(Debug, Clone)]
pub struct QueryRegistry {
    pub tables: Vec<TableDef>,
    pub song_insert: &'static str,
    pub artist_insert: &'static str,
    pub time_insert: &'static str,
    pub user_upsert: &'static str,
    pub songplay_insert: &'static str,
    pub song_select: &'static str,
    pub songplay_conflict: SongplayConflict,
}

impl QueryRegistry {
    pub fn new(songplay_conflict: SongplayConflict) -> Self {
        let songplay_insert = match songplay_conflict {
            SongplayConflict::Append => {
                "INSERT INTO songplays
                    (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            }
            SongplayConflict::NaturalKey => {
                "INSERT INTO songplays
                    (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
                 SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
                 WHERE NOT EXISTS (
                    SELECT 1 FROM songplays
                    WHERE start_time = ?1 AND user_id = ?2 AND session_id = ?6
                 )"
            }
        };

        Self {
            tables: vec![SONGPLAYS, USERS, SONGS, ARTISTS, TIME],
            song_insert: "INSERT INTO songs (song_id, title, artist_id, year, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (song_id) DO NOTHING",
            artist_insert: "INSERT INTO artists (artist_id, name, location, latitude, longitude)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (artist_id) DO NOTHING",
            time_insert: "INSERT INTO time (start_time, hour, day, week, month, year, weekday)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (start_time) DO NOTHING",
            user_upsert: "INSERT INTO users (user_id, first_name, last_name, gender, level)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (user_id) DO UPDATE SET
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    gender = excluded.gender,
                    level = excluded.level",
            songplay_insert,
            song_select: "SELECT s.song_id, a.artist_id
                 FROM songs s
                 JOIN artists a ON s.artist_id = a.artist_id
                 WHERE s.title = ?1 AND a.name = ?2 AND s.duration = ?3
                 LIMIT 1",
            songplay_conflict,
        }
    }

    pub fn table_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.iter().map(|t| t.name)
    }
}

impl Default for QueryRegistry {
    fn default() -> Self {
        Self::new(SongplayConflict::default())
    }
}
