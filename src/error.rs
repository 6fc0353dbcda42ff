//! Error types for Photosweep
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Photosweep operations
///
/// Fatal variants (configuration, credentials, authentication, dates) end a
/// run at the top-level boundary in `main`. The per-item variants
/// (`CreationDate`, `Download`, `Delete`) are caught inside the pipeline loop
/// and only ever reported and counted.
#[derive(Error, Debug)]
pub enum PhotosweepError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Username and/or password missing from the configuration
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Operator-supplied date could not be parsed
    #[error("Invalid date '{0}'. Please provide a date in YYYY-MM-DD format")]
    InvalidDate(String),

    /// Authentication errors (bad password, rejected verification code)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Unexpected responses from the photo service
    #[error("Service error: {0}")]
    Service(String),

    /// A single item's creation date could not be read
    #[error("Creation date unavailable: {0}")]
    CreationDate(String),

    /// A single item failed to download
    #[error("Download failed: {0}")]
    Download(String),

    /// A single item failed to delete
    #[error("Delete failed: {0}")]
    Delete(String),

    /// Terminal input could not be read
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type alias for Photosweep operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = PhotosweepError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_missing_credentials_error_display() {
        let error = PhotosweepError::MissingCredentials("icloud.password".to_string());
        assert_eq!(error.to_string(), "Missing credentials: icloud.password");
    }

    #[test]
    fn test_invalid_date_error_display() {
        let error = PhotosweepError::InvalidDate("2022-13-01".to_string());
        let s = error.to_string();
        assert!(s.contains("2022-13-01"));
        assert!(s.contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_authentication_error_display() {
        let error = PhotosweepError::Authentication("code rejected".to_string());
        assert_eq!(error.to_string(), "Authentication error: code rejected");
    }

    #[test]
    fn test_per_item_error_display() {
        assert_eq!(
            PhotosweepError::Download("IMG_0001.JPG: 404".to_string()).to_string(),
            "Download failed: IMG_0001.JPG: 404"
        );
        assert_eq!(
            PhotosweepError::Delete("IMG_0001.JPG: conflict".to_string()).to_string(),
            "Delete failed: IMG_0001.JPG: conflict"
        );
        assert_eq!(
            PhotosweepError::CreationDate("field missing".to_string()).to_string(),
            "Creation date unavailable: field missing"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: PhotosweepError = io_error.into();
        assert!(matches!(error, PhotosweepError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: PhotosweepError = json_error.into();
        assert!(matches!(error, PhotosweepError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: PhotosweepError = yaml_error.into();
        assert!(matches!(error, PhotosweepError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PhotosweepError>();
    }
}
