//! Schema versioning and store path layout: `base_dir/v{version}/{date}/`.

use std::fs;
use std::path::{Path, PathBuf};

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

pub fn store_path(base_dir: &Path, version: i32) -> PathBuf {
    base_dir.join(format!("v{version}"))
}

/// Sorted date-string partitions under `store_path` that contain
/// `{feature_type}.csv`.
pub fn list_available_dates(
    base_dir: &Path,
    feature_type: &str,
    version: i32,
) -> std::io::Result<Vec<String>> {
    let store = store_path(base_dir, version);
    if !store.is_dir() {
        return Ok(Vec::new());
    }
    let mut dates = Vec::new();
    for entry in fs::read_dir(&store)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path.join(format!("{feature_type}.csv")).exists() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                dates.push(name.to_string());
            }
        }
    }
    dates.sort();
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lists_only_dates_with_the_matching_feature_file() {
        let dir = tempdir().unwrap();
        let store = store_path(dir.path(), CURRENT_SCHEMA_VERSION);
        fs::create_dir_all(store.join("2024-01-02")).unwrap();
        fs::write(store.join("2024-01-02").join("trend_features.csv"), "").unwrap();
        fs::create_dir_all(store.join("2024-01-03")).unwrap();
        // no trend_features.csv here

        let dates = list_available_dates(dir.path(), "trend_features", CURRENT_SCHEMA_VERSION)
            .unwrap();
        assert_eq!(dates, vec!["2024-01-02".to_string()]);
    }

    #[test]
    fn missing_store_dir_returns_empty() {
        let dir = tempdir().unwrap();
        let dates = list_available_dates(dir.path(), "trend_features", 7).unwrap();
        assert!(dates.is_empty());
    }
}
