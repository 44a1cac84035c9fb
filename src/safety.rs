//! Safety utilities for the destructive database reset.
//!
//! `create-tables` deletes the target database before recreating it. These
//! checks keep that delete away from the input data and anything that does
//! not look like a database file.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const DATABASE_EXTENSIONS: [&str; 3] = ["sqlite3", "sqlite", "db"];

/// Side files SQLite keeps next to a WAL-mode database.
const SIDE_FILE_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

fn resolved(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Validates that a database path is safe to delete and recreate.
///
/// Checks:
/// - The path must carry a database extension (`.sqlite3`, `.sqlite`, `.db`)
/// - The path must not be a directory
/// - The path must not live inside any of the data roots
pub fn validate_database_path(database: &Path, data_roots: &[&Path]) -> Result<()> {
    let extension = database.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !DATABASE_EXTENSIONS.contains(&extension) {
        bail!(
            "Safety check failed: database '{}' must end in .sqlite3, .sqlite or .db",
            database.display()
        );
    }

    if database.is_dir() {
        bail!(
            "Safety check failed: database '{}' is a directory",
            database.display()
        );
    }

    let Some(file_name) = database.file_name() else {
        bail!(
            "Safety check failed: database '{}' has no file name",
            database.display()
        );
    };
    let parent = database
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let full_path = resolved(parent).join(file_name);

    for root in data_roots {
        if full_path.starts_with(resolved(root)) {
            bail!(
                "Safety check failed: database '{}' cannot live inside data directory '{}'",
                database.display(),
                root.display()
            );
        }
    }

    Ok(())
}

/// Delete a database file and its WAL side files, if present.
pub fn remove_database(database: &Path) -> Result<()> {
    if database.exists() {
        fs::remove_file(database)
            .with_context(|| format!("Failed to remove {}", database.display()))?;
    }
    for suffix in SIDE_FILE_SUFFIXES {
        let mut side = database.as_os_str().to_owned();
        side.push(suffix);
        let side = PathBuf::from(side);
        if side.exists() {
            fs::remove_file(&side)
                .with_context(|| format!("Failed to remove {}", side.display()))?;
        }
    }
    Ok(())
}
