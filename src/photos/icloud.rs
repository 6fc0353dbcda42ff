//! iCloud Photos implementation of [`PhotoLibrary`]
//!
//! Assets are listed through the CloudKit records API of the photos
//! database. Each page of results interleaves `CPLAsset` records (which carry
//! the creation date) with `CPLMaster` records (which carry the file name and
//! the original-resolution download URL); the two are joined on the asset's
//! `masterRef`.

use std::collections::{HashMap, VecDeque};

use base64::Engine as _;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{PhotosweepError, Result};
use crate::photos::{AssetStream, ByteStream, PhotoAsset, PhotoLibrary};

/// Path of the private photos database below the `ckdatabasews` service URL
const PHOTOS_DATABASE_PATH: &str = "database/1/com.apple.photos.cloud/production/private";

/// Query listing every visible asset together with its master record
const ALL_PHOTOS_RECORD_TYPE: &str = "CPLAssetAndMasterByAssetDateWithoutHiddenOrDeleted";

const ZONE_NAME: &str = "PrimarySync";

/// Record fields requested from the query endpoint
const DESIRED_KEYS: &[&str] = &[
    "resOriginalRes",
    "resOriginalFileType",
    "filenameEnc",
    "originalOrientation",
    "assetDate",
    "addedDate",
    "isDeleted",
    "isHidden",
    "masterRef",
    "recordName",
    "recordType",
    "recordChangeTag",
];

/// Response body of the `records/query` and `records/modify` endpoints
#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    #[serde(default)]
    record_name: String,
    #[serde(default)]
    record_type: String,
    #[serde(default)]
    record_change_tag: Option<String>,
    #[serde(default)]
    fields: HashMap<String, Field>,
    #[serde(default)]
    server_error_code: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Field {
    #[serde(default)]
    value: serde_json::Value,
    #[serde(rename = "type", default)]
    field_type: Option<String>,
}

impl Record {
    fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name).map(|f| &f.value)
    }

    fn master_ref(&self) -> Option<&str> {
        self.field("masterRef")
            .and_then(|v| v.get("recordName"))
            .and_then(|v| v.as_str())
    }

    /// Decode `filenameEnc`, stored either as a plain string or base64 bytes
    fn filename(&self) -> Option<String> {
        let field = self.fields.get("filenameEnc")?;
        let raw = field.value.as_str()?;
        if field.field_type.as_deref() == Some("STRING") {
            return Some(raw.to_string());
        }
        base64::engine::general_purpose::STANDARD
            .decode(raw)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }
}

/// One page of joined asset/master records
struct Page {
    assets: Vec<PhotoAsset>,
    /// Number of master records in the page; drives the next `startRank`
    master_count: usize,
}

/// Enumeration state carried between page requests
#[derive(Default)]
struct PageCursor {
    offset: usize,
    pending: VecDeque<PhotoAsset>,
    exhausted: bool,
}

/// Photo library backed by the iCloud Photos CloudKit service
///
/// Instances are obtained from an authenticated
/// [`ICloudSession`](crate::auth::ICloudSession); the HTTP client shares the
/// session's cookie store.
pub struct ICloudPhotoLibrary {
    client: Client,
    service_endpoint: String,
    params: Vec<(&'static str, String)>,
    page_size: usize,
}

impl ICloudPhotoLibrary {
    /// Create a library for the given `ckdatabasews` service URL
    ///
    /// # Arguments
    ///
    /// * `client` - Authenticated HTTP client
    /// * `ckdatabase_url` - Base URL of the CloudKit database web service
    /// * `params` - Session query parameters added to every request
    /// * `page_size` - Number of assets requested per page
    pub fn new(
        client: Client,
        ckdatabase_url: &str,
        mut params: Vec<(&'static str, String)>,
        page_size: usize,
    ) -> Self {
        params.push(("remapEnums", "true".to_string()));
        params.push(("getCurrentSyncToken", "true".to_string()));
        Self {
            client,
            service_endpoint: format!(
                "{}/{}",
                ckdatabase_url.trim_end_matches('/'),
                PHOTOS_DATABASE_PATH
            ),
            params,
            page_size: page_size.max(1),
        }
    }

    fn records_url(&self, operation: &str) -> String {
        format!("{}/records/{}", self.service_endpoint, operation)
    }

    async fn fetch_page(&self, offset: usize) -> Result<Page> {
        let body = json!({
            "query": {
                "filterBy": [
                    {
                        "fieldName": "startRank",
                        "fieldValue": {"type": "INT64", "value": offset},
                        "comparator": "EQUALS"
                    },
                    {
                        "fieldName": "direction",
                        "fieldValue": {"type": "STRING", "value": "ASCENDING"},
                        "comparator": "EQUALS"
                    }
                ],
                "recordType": ALL_PHOTOS_RECORD_TYPE
            },
            "resultsLimit": self.page_size * 2,
            "desiredKeys": DESIRED_KEYS,
            "zoneID": {"zoneName": ZONE_NAME}
        });

        let response = self
            .client
            .post(self.records_url("query"))
            .query(&self.params)
            .json(&body)
            .send()
            .await
            .map_err(|e| PhotosweepError::Service(format!("Photo list request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(PhotosweepError::Service(format!(
                "Photo list request returned {}: {}",
                status, text
            ))
            .into());
        }

        let page: RecordsResponse = response
            .json()
            .await
            .map_err(|e| PhotosweepError::Service(format!("Failed to parse photo list: {}", e)))?;

        tracing::debug!(offset, records = page.records.len(), "Fetched photo page");
        Ok(join_records(page.records))
    }

    async fn next_asset(&self, mut cursor: PageCursor) -> Result<Option<(PhotoAsset, PageCursor)>> {
        loop {
            if let Some(asset) = cursor.pending.pop_front() {
                return Ok(Some((asset, cursor)));
            }
            if cursor.exhausted {
                return Ok(None);
            }

            let page = self.fetch_page(cursor.offset).await?;
            if page.master_count == 0 {
                cursor.exhausted = true;
                continue;
            }
            cursor.offset += page.master_count;
            cursor.pending.extend(page.assets);
        }
    }
}

/// Pair each master with its asset record, keeping the masters' order
fn join_records(records: Vec<Record>) -> Page {
    let mut assets_by_master: HashMap<String, Record> = HashMap::new();
    let mut masters = Vec::new();

    for record in records {
        match record.record_type.as_str() {
            "CPLAsset" => {
                if let Some(master) = record.master_ref().map(str::to_string) {
                    assets_by_master.insert(master, record);
                }
            }
            "CPLMaster" => masters.push(record),
            other => tracing::trace!(record_type = other, "Ignoring record"),
        }
    }

    let master_count = masters.len();
    let assets = masters
        .into_iter()
        .filter_map(|master| match assets_by_master.remove(&master.record_name) {
            Some(asset) => Some(to_photo_asset(master, asset)),
            None => {
                tracing::warn!(master = %master.record_name, "Master record without asset; skipping");
                None
            }
        })
        .collect();

    Page {
        assets,
        master_count,
    }
}

fn to_photo_asset(master: Record, asset: Record) -> PhotoAsset {
    let filename = master.filename().unwrap_or_else(|| {
        tracing::warn!(master = %master.record_name, "Undecodable file name; using record name");
        master.record_name.clone()
    });
    let original = master.field("resOriginalRes");

    PhotoAsset {
        id: asset.record_name.clone(),
        filename,
        created: asset.field("assetDate").cloned(),
        download_url: original
            .and_then(|v| v.get("downloadURL"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        size: original.and_then(|v| v.get("size")).and_then(|v| v.as_u64()),
        record_type: Some(asset.record_type.clone()),
        change_tag: asset.record_change_tag.clone(),
    }
}

#[async_trait::async_trait]
impl PhotoLibrary for ICloudPhotoLibrary {
    fn assets(&self) -> AssetStream<'_> {
        Box::pin(futures::stream::try_unfold(
            PageCursor::default(),
            move |cursor| self.next_asset(cursor),
        ))
    }

    async fn download(&self, asset: &PhotoAsset) -> Result<ByteStream> {
        let url = asset.download_url.as_deref().ok_or_else(|| {
            PhotosweepError::Download(format!("{} has no download URL", asset.filename))
        })?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PhotosweepError::Download(format!("{}: {}", asset.filename, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PhotosweepError::Download(format!(
                "{}: server returned {}",
                asset.filename, status
            ))
            .into());
        }

        let filename = asset.filename.clone();
        Ok(Box::pin(response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| {
                anyhow::Error::from(PhotosweepError::Download(format!(
                    "{}: transfer interrupted: {}",
                    filename, e
                )))
            })
        })))
    }

    async fn delete(&self, asset: &PhotoAsset) -> Result<()> {
        let body = json!({
            "operations": [{
                "operationType": "update",
                "record": {
                    "recordName": asset.id,
                    "recordType": asset.record_type.as_deref().unwrap_or("CPLAsset"),
                    "recordChangeTag": asset.change_tag,
                    "fields": {"isDeleted": {"value": 1}}
                }
            }],
            "zoneID": {"zoneName": ZONE_NAME},
            "atomic": true
        });

        let response = self
            .client
            .post(self.records_url("modify"))
            .query(&self.params)
            .json(&body)
            .send()
            .await
            .map_err(|e| PhotosweepError::Delete(format!("{}: {}", asset.filename, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PhotosweepError::Delete(format!(
                "{}: server returned {}",
                asset.filename, status
            ))
            .into());
        }

        let result: RecordsResponse = response.json().await.map_err(|e| {
            PhotosweepError::Delete(format!("{}: unreadable response: {}", asset.filename, e))
        })?;

        if let Some(failed) = result.records.iter().find(|r| r.server_error_code.is_some()) {
            return Err(PhotosweepError::Delete(format!(
                "{}: {} {}",
                asset.filename,
                failed.server_error_code.as_deref().unwrap_or_default(),
                failed.reason.as_deref().unwrap_or_default()
            ))
            .into());
        }

        tracing::debug!(id = %asset.id, "Marked asset deleted");
        Ok(())
    }
}
