//! Input file discovery.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{EtlError, Result};

const DATA_EXTENSION: &str = "json";

/// All `*.json` files under `root`, recursively, as absolute paths.
///
/// The list is sorted so repeated runs visit files in the same order.
pub fn json_files(root: &Path) -> Result<Vec<PathBuf>> {
    let discover_error = |reason: String| EtlError::Discover {
        root: root.to_path_buf(),
        reason,
    };

    if !root.is_dir() {
        return Err(discover_error("not a directory".to_string()));
    }
    let absolute = root
        .canonicalize()
        .map_err(|e| discover_error(e.to_string()))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(&absolute).follow_links(true) {
        let entry = entry.map_err(|e| discover_error(e.to_string()))?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(DATA_EXTENSION)
        {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_finds_nested_json_only() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("A").join("B");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("TRAAAAW128F429D538.json"), "{}").unwrap();
        fs::write(dir.path().join("2018-11-01-events.json"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(nested.join("data.JSON.bak"), "").unwrap();

        let files = json_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.is_absolute()));
        assert!(files.iter().all(|f| f.extension().unwrap() == "json"));
    }

    #[test]
    fn test_sorted_output() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.json", "a.json", "b.json"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let names: Vec<String> = json_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json", "c.json"]);
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = json_files(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, EtlError::Discover { .. }));
    }
}
