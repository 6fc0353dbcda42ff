//! Test utilities for Photosweep
//!
//! This module provides common test utilities including temporary directory
//! management, test file creation, and photo asset builders.

use crate::photos::PhotoAsset;
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Minimal valid configuration YAML with test credentials
pub fn test_config_yaml() -> String {
    r#"
icloud:
  username: user@example.com
  password: hunter2
"#
    .to_string()
}

/// Build an asset created at midnight UTC on `date` (`YYYY-MM-DD`)
pub fn dated_asset(id: &str, filename: &str, date: &str) -> PhotoAsset {
    let millis = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .expect("valid test date")
        .and_hms_opt(0, 0, 0)
        .expect("valid time")
        .and_utc()
        .timestamp_millis();
    PhotoAsset::new(id, filename, Some(json!(millis)))
}

/// Build an asset with no creation timestamp at all
pub fn undated_asset(id: &str, filename: &str) -> PhotoAsset {
    PhotoAsset::new(id, filename, None)
}
