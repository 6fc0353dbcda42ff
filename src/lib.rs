//! Photosweep - bulk download or delete iCloud photos by date
//!
//! This library provides the pieces behind the `photosweep` command: signing
//! in to iCloud, enumerating the photo library, and selecting every photo
//! taken on or before a cutoff date to download or delete.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: iCloud sign-in, 2FA/2SA challenges, and trust token caching
//! - `photos`: Photo library abstraction with iCloud and in-memory implementations
//! - `pipeline`: Date-filtered selection and the download/delete actions
//! - `prompt`: Operator input for verification codes and confirmations
//! - `commands`: Command handlers for the CLI
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use photosweep::photos::FakePhotoLibrary;
//! use photosweep::pipeline::{download_all, CutoffDate};
//! use photosweep::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     config.validate()?;
//!
//!     let library = FakePhotoLibrary::default();
//!     let cutoff = CutoffDate::new(chrono::NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
//!     let outcome = download_all(&library, cutoff, std::path::Path::new("downloads")).await?;
//!     println!("{} photos downloaded", outcome.succeeded);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod photos;
pub mod pipeline;
pub mod prompt;

// Re-export commonly used types
pub use config::Config;
pub use error::{PhotosweepError, Result};
pub use photos::{PhotoAsset, PhotoLibrary};
pub use pipeline::{CutoffDate, DeleteOutcome, RunOutcome, Selection};

#[cfg(test)]
pub mod test_utils;
