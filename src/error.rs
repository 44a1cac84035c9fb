//! Error types for the Sparkify loader.
//!
//! Two tiers: [`EtlError`] aborts the run (nothing useful can happen without
//! a config, a connection or a schema), while [`RecordError`] describes a
//! single bad record that is logged and skipped.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors. Any of these stops the run.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Settings could not be resolved
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database could not be opened or configured
    #[error("Cannot connect to database {path:?}: {source}")]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Table creation, drop or verification failed
    #[error("Schema error on table '{table}': {reason}")]
    Schema { table: String, reason: String },

    /// Statement preparation or transaction control failed
    #[error("Database error: {0}")]
    Statement(#[from] rusqlite::Error),

    /// Input root could not be walked
    #[error("Cannot enumerate {root:?}: {reason}")]
    Discover { root: PathBuf, reason: String },

    /// An input file could not be read
    #[error("Cannot read {path:?}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Row-level failures. The offending record is skipped.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, EtlError>;
