//! Settings resolution.
//!
//! Priority order for every setting:
//! 1. Command-line flag
//! 2. Environment variable (`SPARKIFY_*`, read by clap)
//! 3. TOML config file (`--config`, or `sparkify.toml` in the working directory)
//! 4. Compiled default

use clap::Args;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{EtlError, Result};
use crate::queries::SongplayConflict;

pub const DEFAULT_CONFIG_FILE: &str = "sparkify.toml";
pub const DEFAULT_DATABASE: &str = "sparkifydb.sqlite3";
pub const DEFAULT_SONG_DATA: &str = "data/song_data";
pub const DEFAULT_LOG_DATA: &str = "data/log_data";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Flags shared by both binaries.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// TOML settings file (defaults to ./sparkify.toml when present)
    #[arg(long, env = "SPARKIFY_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "SPARKIFY_DATABASE")]
    pub database: Option<PathBuf>,

    /// Root of the song metadata files
    #[arg(long, env = "SPARKIFY_SONG_DATA")]
    pub song_data: Option<PathBuf>,

    /// Root of the event log files
    #[arg(long, env = "SPARKIFY_LOG_DATA")]
    pub log_data: Option<PathBuf>,

    /// How long a statement waits on a locked database
    #[arg(long, env = "SPARKIFY_BUSY_TIMEOUT_MS")]
    pub busy_timeout_ms: Option<u64>,

    /// Conflict policy for songplay rows
    #[arg(long, value_enum, env = "SPARKIFY_SONGPLAY_CONFLICT")]
    pub songplay_conflict: Option<SongplayConflict>,
}

/// Contents of the TOML settings file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub database: Option<PathBuf>,
    pub song_data: Option<PathBuf>,
    pub log_data: Option<PathBuf>,
    pub busy_timeout_ms: Option<u64>,
    pub songplay_conflict: Option<SongplayConflict>,
}

impl FileSettings {
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| EtlError::Config(format!("invalid settings: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("cannot read config file {:?}: {}", path, e))
        })?;
        Self::parse(&contents)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database: PathBuf,
    pub song_data: PathBuf,
    pub log_data: PathBuf,
    pub busy_timeout: Duration,
    pub songplay_conflict: SongplayConflict,
}

impl Settings {
    /// Resolve settings from flags/env and the optional config file.
    pub fn resolve(args: &SettingsArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileSettings::load(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    FileSettings::load(default_path)?
                } else {
                    FileSettings::default()
                }
            }
        };
        Self::merge(args, file)
    }

    pub fn merge(args: &SettingsArgs, file: FileSettings) -> Result<Self> {
        let settings = Settings {
            database: args
                .database
                .clone()
                .or(file.database)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            song_data: args
                .song_data
                .clone()
                .or(file.song_data)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SONG_DATA)),
            log_data: args
                .log_data
                .clone()
                .or(file.log_data)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DATA)),
            busy_timeout: Duration::from_millis(
                args.busy_timeout_ms
                    .or(file.busy_timeout_ms)
                    .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            ),
            songplay_conflict: args
                .songplay_conflict
                .or(file.songplay_conflict)
                .unwrap_or_default(),
        };

        if settings.database.as_os_str().is_empty() {
            return Err(EtlError::Config("database path is empty".to_string()));
        }

        debug!(?settings, "Resolved settings");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::merge(&SettingsArgs::default(), FileSettings::default()).unwrap();
        assert_eq!(settings.database, PathBuf::from("sparkifydb.sqlite3"));
        assert_eq!(settings.song_data, PathBuf::from("data/song_data"));
        assert_eq!(settings.log_data, PathBuf::from("data/log_data"));
        assert_eq!(settings.busy_timeout, Duration::from_millis(5_000));
        assert_eq!(settings.songplay_conflict, SongplayConflict::Append);
    }

    #[test]
    fn test_flag_beats_file() {
        let file = FileSettings::parse(
            r#"
            database = "from_file.sqlite3"
            log_data = "logs"
            songplay_conflict = "natural-key"
            "#,
        )
        .unwrap();
        let args = SettingsArgs {
            database: Some(PathBuf::from("from_flag.db")),
            ..Default::default()
        };
        let settings = Settings::merge(&args, file).unwrap();
        assert_eq!(settings.database, PathBuf::from("from_flag.db"));
        assert_eq!(settings.log_data, PathBuf::from("logs"));
        assert_eq!(settings.songplay_conflict, SongplayConflict::NaturalKey);
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let err = FileSettings::parse("password = \"hunter2\"").unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_empty_database_rejected() {
        let args = SettingsArgs {
            database: Some(PathBuf::new()),
            ..Default::default()
        };
        assert!(matches!(
            Settings::merge(&args, FileSettings::default()),
            Err(EtlError::Config(_))
        ));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let args = SettingsArgs {
            config: Some(dir.path().join("missing.toml")),
            ..Default::default()
        };
        assert!(matches!(Settings::resolve(&args), Err(EtlError::Config(_))));
    }
}
