//! Photo library abstraction for Photosweep
//!
//! A [`PhotoLibrary`] enumerates [`PhotoAsset`]s lazily and performs the two
//! remote actions the pipeline needs: downloading an asset's original bytes
//! and deleting the asset. [`icloud::ICloudPhotoLibrary`] talks to the real
//! service; [`fake::FakePhotoLibrary`] is an in-memory library for tests.

use std::pin::Pin;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use futures::Stream;

use crate::error::{PhotosweepError, Result};

pub mod fake;
pub mod icloud;

pub use fake::FakePhotoLibrary;
pub use icloud::ICloudPhotoLibrary;

/// Lazily pulled sequence of assets in enumeration order
pub type AssetStream<'a> = Pin<Box<dyn Stream<Item = Result<PhotoAsset>> + Send + 'a>>;

/// Body of a downloaded asset, delivered in chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// One photo or video entry in the remote library
///
/// Assets are read-only views produced by a [`PhotoLibrary`]. The creation
/// timestamp is kept as the raw value the service returned so that a missing
/// or malformed value only surfaces when [`PhotoAsset::created_date`] is
/// called.
///
/// # Examples
///
/// ```
/// use photosweep::photos::PhotoAsset;
/// use serde_json::json;
///
/// // 2022-01-01T12:00:00Z in epoch milliseconds
/// let asset = PhotoAsset::new("A1", "IMG_0001.JPG", Some(json!(1_641_038_400_000i64)));
/// assert_eq!(asset.created_date().unwrap().to_string(), "2022-01-01");
///
/// let undated = PhotoAsset::new("A2", "IMG_0002.JPG", None);
/// assert!(undated.created_date().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoAsset {
    /// Service-side identifier of the asset record
    pub id: String,
    /// File name used for local storage and logging; not unique
    pub filename: String,
    /// Raw creation timestamp (epoch milliseconds or an RFC 3339 string)
    pub created: Option<serde_json::Value>,
    /// Location of the original-resolution file, when known
    pub download_url: Option<String>,
    /// Size of the original file in bytes, when known
    pub size: Option<u64>,
    /// Record type the service expects back on modification
    pub record_type: Option<String>,
    /// Optimistic-concurrency tag the service expects back on modification
    pub change_tag: Option<String>,
}

impl PhotoAsset {
    /// Create an asset with only the fields the pipeline reads
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        created: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            created,
            download_url: None,
            size: None,
            record_type: None,
            change_tag: None,
        }
    }

    /// Calendar date (UTC) on which the asset was created
    ///
    /// Numbers are read as epoch milliseconds and strings as RFC 3339
    /// timestamps.
    ///
    /// # Errors
    ///
    /// Returns `PhotosweepError::CreationDate` when the timestamp is missing,
    /// null, out of range, or of an unrecognised shape.
    pub fn created_date(&self) -> std::result::Result<NaiveDate, PhotosweepError> {
        let value = match &self.created {
            None | Some(serde_json::Value::Null) => {
                return Err(PhotosweepError::CreationDate(
                    "no creation timestamp".to_string(),
                ))
            }
            Some(value) => value,
        };

        match value {
            serde_json::Value::Number(n) => {
                let millis = n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                    .ok_or_else(|| {
                        PhotosweepError::CreationDate(format!("unparsable timestamp {}", n))
                    })?;
                DateTime::<Utc>::from_timestamp_millis(millis)
                    .map(|dt| dt.date_naive())
                    .ok_or_else(|| {
                        PhotosweepError::CreationDate(format!("timestamp {} out of range", millis))
                    })
            }
            serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc).date_naive())
                .map_err(|e| {
                    PhotosweepError::CreationDate(format!("unparsable timestamp '{}': {}", s, e))
                }),
            other => Err(PhotosweepError::CreationDate(format!(
                "unexpected timestamp value {}",
                other
            ))),
        }
    }
}

/// Source of assets and the remote actions performed on them
///
/// Implementations are used sequentially: the pipeline pulls one asset,
/// acts on it, and only then pulls the next.
#[async_trait::async_trait]
pub trait PhotoLibrary: Send + Sync {
    /// Enumerate every asset in the library
    ///
    /// The stream yields an error and should not be polled further if a page
    /// of results cannot be fetched.
    fn assets(&self) -> AssetStream<'_>;

    /// Fetch the original bytes of an asset
    ///
    /// # Errors
    ///
    /// Returns `PhotosweepError::Download` if the asset cannot be fetched.
    async fn download(&self, asset: &PhotoAsset) -> Result<ByteStream>;

    /// Delete an asset from the library
    ///
    /// # Errors
    ///
    /// Returns `PhotosweepError::Delete` if the service refuses the deletion.
    async fn delete(&self, asset: &PhotoAsset) -> Result<()>;
}
