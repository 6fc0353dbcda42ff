//! Command-line interface definition for Photosweep
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the `download` and `delete` commands.

use crate::error::PhotosweepError;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Photosweep - bulk download or delete iCloud photos by date
///
/// Selects every photo taken on or before a given date, then downloads
/// the selection or deletes it after confirmation.
#[derive(Parser, Debug, Clone)]
#[command(name = "photosweep")]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Path to the YAML configuration file with iCloud credentials
    #[arg(short, long, env = "PHOTOSWEEP_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Photosweep
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Download all photos taken on or before a given date
    Download {
        /// The date (YYYY-MM-DD). Downloads photos taken on or before this date
        #[arg(long, value_parser = parse_cutoff_date)]
        date: NaiveDate,

        /// Directory to store downloaded photos
        #[arg(long, default_value = "downloads")]
        output_dir: PathBuf,
    },

    /// Delete all photos taken on or before a given date
    Delete {
        /// The date (YYYY-MM-DD). Deletes photos taken on or before this date
        #[arg(long, value_parser = parse_cutoff_date)]
        date: NaiveDate,
    },
}

/// Parse an operator-supplied `YYYY-MM-DD` date
///
/// Used as the clap value parser for `--date`, so a malformed date is
/// rejected before configuration is read or any login is attempted.
///
/// # Examples
///
/// ```
/// use photosweep::cli::parse_cutoff_date;
///
/// assert!(parse_cutoff_date("2022-01-01").is_ok());
/// assert!(parse_cutoff_date("01/01/2022").is_err());
/// ```
pub fn parse_cutoff_date(value: &str) -> std::result::Result<NaiveDate, PhotosweepError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| PhotosweepError::InvalidDate(value.to_string()))
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
