use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// `photosweep` command with credential overrides cleared from the environment
#[allow(dead_code)]
pub fn photosweep() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("photosweep").expect("binary should build");
    cmd.env_remove("PHOTOSWEEP_CONFIG")
        .env_remove("PHOTOSWEEP_ICLOUD_USERNAME")
        .env_remove("PHOTOSWEEP_ICLOUD_PASSWORD")
        .env_remove("PHOTOSWEEP_PAGE_SIZE")
        .env_remove("RUST_LOG");
    cmd
}
