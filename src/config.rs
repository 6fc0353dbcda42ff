//! Configuration management for Photosweep
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from the YAML file and environment variables.

use crate::error::{PhotosweepError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Photosweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// iCloud account and endpoint settings
    #[serde(default)]
    pub icloud: ICloudConfig,
}

/// iCloud account configuration
///
/// Only `username` and `password` are required; the endpoints exist so
/// tests can point the client at a mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ICloudConfig {
    /// Apple ID used to sign in
    #[serde(default)]
    pub username: Option<String>,

    /// Apple ID password
    #[serde(default)]
    pub password: Option<String>,

    /// Base URL of the Apple ID authentication service
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,

    /// Base URL of the iCloud setup service
    #[serde(default = "default_setup_endpoint")]
    pub setup_endpoint: String,

    /// Number of assets requested per library page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Timeout for individual HTTP requests (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Cache the session trust token in the system keyring
    #[serde(default = "default_remember_session")]
    pub remember_session: bool,
}

fn default_auth_endpoint() -> String {
    "https://idmsa.apple.com/appleauth/auth".to_string()
}

fn default_setup_endpoint() -> String {
    "https://setup.icloud.com/setup/ws/1".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_remember_session() -> bool {
    true
}

/// Upper bound on `page_size`; the records endpoint rejects larger limits.
const MAX_PAGE_SIZE: usize = 500;

impl Default for ICloudConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            auth_endpoint: default_auth_endpoint(),
            setup_endpoint: default_setup_endpoint(),
            page_size: default_page_size(),
            timeout_seconds: default_timeout_seconds(),
            remember_session: default_remember_session(),
        }
    }
}

impl ICloudConfig {
    /// Return the configured `(username, password)` pair
    ///
    /// # Errors
    ///
    /// Returns `PhotosweepError::MissingCredentials` if either value is
    /// absent or blank.
    ///
    /// # Examples
    ///
    /// ```
    /// use photosweep::config::ICloudConfig;
    ///
    /// let config = ICloudConfig {
    ///     username: Some("user@example.com".to_string()),
    ///     password: Some("secret".to_string()),
    ///     ..Default::default()
    /// };
    /// let (user, pass) = config.credentials().unwrap();
    /// assert_eq!(user, "user@example.com");
    /// assert_eq!(pass, "secret");
    /// ```
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let username = self
            .username
            .as_deref()
            .filter(|u| !u.trim().is_empty());
        let password = self.password.as_deref().filter(|p| !p.is_empty());
        match (username, password) {
            (Some(u), Some(p)) => Ok((u, p)),
            _ => Err(PhotosweepError::MissingCredentials(
                "Username and/or password not provided in the config file".to_string(),
            )
            .into()),
        }
    }
}

impl Config {
    /// Load configuration from file with environment overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, cannot be read, or cannot be parsed
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(PhotosweepError::Config(format!(
                "Config file not found at {}",
                path
            ))
            .into());
        }

        let mut config = Self::from_file(path)?;
        config.apply_env_vars();
        tracing::debug!(path = %path, "Loaded configuration");

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PhotosweepError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string
    ///
    /// An empty document is a parse error rather than an empty config, so a
    /// truncated file is reported as malformed.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str::<Option<Self>>(contents)
            .map_err(PhotosweepError::Yaml)
            .context(PhotosweepError::Config("Failed to parse config".to_string()))?
            .ok_or_else(|| PhotosweepError::Config("Config file is empty".to_string()).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(username) = std::env::var("PHOTOSWEEP_ICLOUD_USERNAME") {
            self.icloud.username = Some(username);
            tracing::debug!("Env override: PHOTOSWEEP_ICLOUD_USERNAME");
        }

        if let Ok(password) = std::env::var("PHOTOSWEEP_ICLOUD_PASSWORD") {
            self.icloud.password = Some(password);
            tracing::debug!("Env override: PHOTOSWEEP_ICLOUD_PASSWORD");
        }

        if let Ok(page_size) = std::env::var("PHOTOSWEEP_PAGE_SIZE") {
            match page_size.parse::<usize>() {
                Ok(v) => {
                    self.icloud.page_size = v;
                    tracing::debug!(page_size = v, "Env override: PHOTOSWEEP_PAGE_SIZE");
                }
                Err(_) => {
                    tracing::warn!("Invalid value for PHOTOSWEEP_PAGE_SIZE: {}", page_size);
                }
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` when the username or password is absent,
    /// and `Config` when a tuning value is out of range or an endpoint is not
    /// an HTTP(S) URL.
    pub fn validate(&self) -> Result<()> {
        self.icloud.credentials()?;

        if self.icloud.page_size == 0 {
            return Err(
                PhotosweepError::Config("icloud.page_size must be greater than 0".to_string())
                    .into(),
            );
        }

        if self.icloud.page_size > MAX_PAGE_SIZE {
            return Err(PhotosweepError::Config(format!(
                "icloud.page_size must be less than or equal to {}",
                MAX_PAGE_SIZE
            ))
            .into());
        }

        for (name, endpoint) in [
            ("icloud.auth_endpoint", &self.icloud.auth_endpoint),
            ("icloud.setup_endpoint", &self.icloud.setup_endpoint),
        ] {
            let parsed = url::Url::parse(endpoint).map_err(|e| {
                PhotosweepError::Config(format!("{} is not a valid URL: {}", name, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(PhotosweepError::Config(format!(
                    "{} must use http or https",
                    name
                ))
                .into());
            }
        }

        if self.icloud.timeout_seconds == 0 {
            return Err(PhotosweepError::Config(
                "icloud.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_file, temp_dir, test_config_yaml};
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.icloud.username.is_none());
        assert_eq!(config.icloud.page_size, 100);
        assert_eq!(config.icloud.timeout_seconds, 60);
        assert!(config.icloud.remember_session);
        assert!(config.icloud.auth_endpoint.starts_with("https://idmsa.apple.com"));
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config = Config::from_yaml(&test_config_yaml()).unwrap();
        assert_eq!(config.icloud.username.as_deref(), Some("user@example.com"));
        assert_eq!(config.icloud.password.as_deref(), Some("hunter2"));
        assert_eq!(config.icloud.page_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_malformed_yaml() {
        let result = Config::from_yaml("icloud: [unclosed");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
        assert!(err.chain().any(|cause| matches!(
            cause.downcast_ref::<PhotosweepError>(),
            Some(PhotosweepError::Yaml(_))
        )));
    }

    #[test]
    fn test_parse_empty_yaml_is_error() {
        assert!(Config::from_yaml("").is_err());
    }

    #[test]
    fn test_missing_password_fails_validation() {
        let config = Config::from_yaml("icloud:\n  username: user@example.com\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PhotosweepError>(),
            Some(PhotosweepError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_missing_icloud_section_fails_validation() {
        let config = Config::from_yaml("other: true\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_username_fails_validation() {
        let config = Config::from_yaml("icloud:\n  username: '  '\n  password: pw\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        let mut config = Config::from_yaml(&test_config_yaml()).unwrap();
        config.icloud.page_size = 0;
        assert!(config.validate().is_err());
        config.icloud.page_size = MAX_PAGE_SIZE + 1;
        assert!(config.validate().is_err());
        config.icloud.page_size = MAX_PAGE_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_fails_validation() {
        let mut config = Config::from_yaml(&test_config_yaml()).unwrap();
        config.icloud.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_endpoint_fails_validation() {
        let mut config = Config::from_yaml(&test_config_yaml()).unwrap();
        config.icloud.setup_endpoint = "not a url".to_string();
        assert!(config.validate().is_err());

        config.icloud.setup_endpoint = "ftp://setup.example.com".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must use http or https"));
    }

    #[test]
    #[serial]
    fn test_load_missing_file() {
        let dir = temp_dir();
        let path = dir.path().join("nope.yaml");
        let err = Config::load(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    #[serial]
    fn test_load_from_file_with_env_override() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "config.yaml", "icloud:\n  username: file@example.com\n");

        std::env::set_var("PHOTOSWEEP_ICLOUD_PASSWORD", "from-env");
        std::env::set_var("PHOTOSWEEP_PAGE_SIZE", "not-a-number");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        std::env::remove_var("PHOTOSWEEP_ICLOUD_PASSWORD");
        std::env::remove_var("PHOTOSWEEP_PAGE_SIZE");

        assert_eq!(config.icloud.username.as_deref(), Some("file@example.com"));
        assert_eq!(config.icloud.password.as_deref(), Some("from-env"));
        assert_eq!(config.icloud.page_size, 100);
        assert!(config.validate().is_ok());
    }
}
