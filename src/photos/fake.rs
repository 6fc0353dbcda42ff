//! In-memory photo library for unit and integration tests
//!
//! [`FakePhotoLibrary`] replaces the network-backed library in tests. It
//! serves a fixed list of assets in order, returns deterministic bytes for
//! downloads, and records every deletion. Individual assets can be marked to
//! fail on download or delete so partial-failure behaviour can be exercised.
//!
//! # Example
//!
//! ```
//! use photosweep::photos::{FakePhotoLibrary, PhotoAsset, PhotoLibrary};
//! use futures::TryStreamExt;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let library = FakePhotoLibrary::new(vec![PhotoAsset::new("A1", "IMG_0001.JPG", None)])
//!     .fail_delete("A1");
//!
//! let assets: Vec<PhotoAsset> = library.assets().try_collect().await.unwrap();
//! assert_eq!(assets.len(), 1);
//! assert!(library.delete(&assets[0]).await.is_err());
//! assert!(library.deleted().is_empty());
//! # }
//! ```

use std::collections::HashSet;
use std::sync::Mutex;

use bytes::Bytes;

use crate::error::{PhotosweepError, Result};
use crate::photos::{AssetStream, ByteStream, PhotoAsset, PhotoLibrary};

/// In-memory [`PhotoLibrary`] with injectable per-asset failures
#[derive(Debug, Default)]
pub struct FakePhotoLibrary {
    assets: Vec<PhotoAsset>,
    failing_downloads: HashSet<String>,
    failing_deletes: HashSet<String>,
    /// Error returned after all assets have been yielded, simulating a
    /// page request that fails part-way through enumeration.
    enumeration_error: Option<String>,
    deleted: Mutex<Vec<String>>,
    downloaded: Mutex<Vec<String>>,
}

impl FakePhotoLibrary {
    /// Create a library serving `assets` in the given order
    pub fn new(assets: Vec<PhotoAsset>) -> Self {
        Self {
            assets,
            ..Default::default()
        }
    }

    /// Make downloads of the asset with this id fail
    pub fn fail_download(mut self, id: &str) -> Self {
        self.failing_downloads.insert(id.to_string());
        self
    }

    /// Make deletion of the asset with this id fail
    pub fn fail_delete(mut self, id: &str) -> Self {
        self.failing_deletes.insert(id.to_string());
        self
    }

    /// End enumeration with an error after the configured assets
    pub fn fail_enumeration(mut self, message: &str) -> Self {
        self.enumeration_error = Some(message.to_string());
        self
    }

    /// Ids of successfully deleted assets, in deletion order
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Ids of assets whose download was requested, in request order
    pub fn downloaded(&self) -> Vec<String> {
        self.downloaded.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Bytes served for an asset: its id followed by its filename
    pub fn content_for(asset: &PhotoAsset) -> Vec<u8> {
        format!("{}:{}", asset.id, asset.filename).into_bytes()
    }
}

#[async_trait::async_trait]
impl PhotoLibrary for FakePhotoLibrary {
    fn assets(&self) -> AssetStream<'_> {
        let mut items: Vec<Result<PhotoAsset>> = self.assets.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.enumeration_error {
            items.push(Err(PhotosweepError::Service(message.clone()).into()));
        }
        Box::pin(futures::stream::iter(items))
    }

    async fn download(&self, asset: &PhotoAsset) -> Result<ByteStream> {
        if let Ok(mut downloaded) = self.downloaded.lock() {
            downloaded.push(asset.id.clone());
        }
        if self.failing_downloads.contains(&asset.id) {
            return Err(PhotosweepError::Download(format!("{} unavailable", asset.id)).into());
        }

        // Split the body in two chunks so writers see more than one chunk
        let content = Self::content_for(asset);
        let mid = content.len() / 2;
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(&content[..mid])),
            Ok(Bytes::copy_from_slice(&content[mid..])),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn delete(&self, asset: &PhotoAsset) -> Result<()> {
        if self.failing_deletes.contains(&asset.id) {
            return Err(PhotosweepError::Delete(format!("{} is locked", asset.id)).into());
        }
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(asset.id.clone());
        }
        Ok(())
    }
}
