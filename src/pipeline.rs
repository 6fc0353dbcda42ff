//! Date-filtered selection and the download/delete actions
//!
//! Assets are matched when their creation date is on or before the cutoff.
//! Failures that concern a single asset (unreadable creation date, failed
//! download, failed delete) are reported, counted and skipped. Only a failure
//! of the enumeration itself ends a run early.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use futures::TryStreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::{PhotosweepError, Result};
use crate::photos::{AssetStream, PhotoAsset, PhotoLibrary};
use crate::prompt::Prompter;

/// Question asked once before a batch deletion
pub const DELETE_CONFIRMATION_PROMPT: &str =
    "Are you sure you want to delete these photos? This action cannot be undone. (yes/[no]): ";

/// Suffix of files still being written
const PARTIAL_SUFFIX: &str = ".part";

/// Inclusive upper bound on creation dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffDate(NaiveDate);

impl CutoffDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Whether an asset created on `created` is selected
    pub fn admits(&self, created: NaiveDate) -> bool {
        created <= self.0
    }
}

impl From<NaiveDate> for CutoffDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

/// Assets that passed the cutoff, in enumeration order
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub assets: Vec<PhotoAsset>,
    /// Assets pulled from the library
    pub considered: usize,
    /// Assets skipped because their creation date could not be read
    pub undated: usize,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Counters for one run of an action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub considered: usize,
    pub matched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub undated: usize,
}

/// Result of [`delete_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Deletion ran (possibly over zero assets)
    Completed(RunOutcome),
    /// The operator declined; nothing was deleted
    Canceled { matched: usize },
}

/// Whether a confirmation answer allows deletion
///
/// Only `yes`, in any letter case, counts. Surrounding whitespace is not
/// stripped.
pub fn is_affirmative(answer: &str) -> bool {
    answer.eq_ignore_ascii_case("yes")
}

/// Read an asset's creation date, reporting and returning `None` on failure
fn creation_date(asset: &PhotoAsset) -> Option<NaiveDate> {
    match asset.created_date() {
        Ok(date) => Some(date),
        Err(e) => {
            let reason = match &e {
                PhotosweepError::CreationDate(reason) => reason.clone(),
                other => other.to_string(),
            };
            eprintln!(
                "Could not determine creation date for {}: {}",
                asset.filename, reason
            );
            tracing::debug!(asset = %asset.id, "Skipping undated asset");
            None
        }
    }
}

/// Line announcing how many photos a delete run selected
pub fn delete_count_message(total: usize) -> String {
    format!("Found {} photos to delete.", total)
}

/// Collect every asset created on or before `cutoff`
///
/// # Errors
///
/// Returns the enumeration error if the library stream fails.
pub async fn select_matching(mut items: AssetStream<'_>, cutoff: CutoffDate) -> Result<Selection> {
    let mut selection = Selection::default();

    while let Some(asset) = items.try_next().await? {
        selection.considered += 1;
        match creation_date(&asset) {
            Some(created) if cutoff.admits(created) => selection.assets.push(asset),
            Some(_) => {}
            None => selection.undated += 1,
        }
    }

    tracing::debug!(
        considered = selection.considered,
        matched = selection.len(),
        undated = selection.undated,
        cutoff = %cutoff.date(),
        "Selection complete"
    );
    Ok(selection)
}

/// Reject names that are empty or would leave the output directory
fn safe_file_name(filename: &str) -> std::result::Result<&str, PhotosweepError> {
    let unsafe_name = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(PhotosweepError::Download(format!(
            "refusing unsafe file name '{}'",
            filename
        )));
    }
    Ok(filename)
}

/// Hidden per-write temporary name next to the target
///
/// Unique per call, so neither an operator's file nor another asset's
/// download can share it.
fn partial_path(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!(
        ".{}.{}{}",
        name,
        uuid::Uuid::new_v4().simple(),
        PARTIAL_SUFFIX
    ))
}

/// Stream one asset into `output_dir`, replacing any file of the same name
async fn save_asset(
    library: &dyn PhotoLibrary,
    asset: &PhotoAsset,
    output_dir: &Path,
) -> Result<PathBuf> {
    let name = safe_file_name(&asset.filename)?;
    let target = output_dir.join(name);
    let partial = partial_path(output_dir, name);

    let mut body = library.download(asset).await?;
    let written = async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&partial)
            .await
            .map_err(PhotosweepError::Io)?;
        let mut bytes = 0u64;
        while let Some(chunk) = body.try_next().await? {
            file.write_all(&chunk).await.map_err(PhotosweepError::Io)?;
            bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(PhotosweepError::Io)?;
        drop(file);
        tokio::fs::rename(&partial, &target)
            .await
            .map_err(PhotosweepError::Io)?;
        Ok::<u64, anyhow::Error>(bytes)
    }
    .await;

    match written {
        Ok(bytes) => {
            if let Some(expected) = asset.size.filter(|&size| size != bytes) {
                tracing::warn!(
                    path = %target.display(),
                    expected,
                    bytes,
                    "Downloaded size differs from the size reported by the library"
                );
            }
            tracing::debug!(path = %target.display(), bytes, "Saved asset");
            Ok(target)
        }
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                tracing::debug!("Could not remove {}: {}", partial.display(), cleanup);
            }
            Err(e)
        }
    }
}

/// Download every asset created on or before `cutoff` into `output_dir`
///
/// Assets are filtered and saved as they are enumerated. The directory is
/// created when missing; existing files are kept unless an asset with the
/// same name replaces them.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or enumeration fails.
/// Failures of single assets are counted in the returned [`RunOutcome`].
pub async fn download_all(
    library: &dyn PhotoLibrary,
    cutoff: CutoffDate,
    output_dir: &Path,
) -> Result<RunOutcome> {
    tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
        PhotosweepError::Config(format!(
            "Cannot create output directory {}: {}",
            output_dir.display(),
            e
        ))
    })?;

    let mut outcome = RunOutcome::default();
    let mut items = library.assets();

    while let Some(asset) = items.try_next().await? {
        outcome.considered += 1;
        let created = match creation_date(&asset) {
            Some(created) => created,
            None => {
                outcome.undated += 1;
                continue;
            }
        };
        if !cutoff.admits(created) {
            continue;
        }

        outcome.matched += 1;
        println!("Downloading {} taken on {} ...", asset.filename, created);
        match save_asset(library, &asset, output_dir).await {
            Ok(_) => outcome.succeeded += 1,
            Err(e) => {
                outcome.failed += 1;
                eprintln!("Failed to download {}: {:#}", asset.filename, e);
                tracing::warn!(asset = %asset.id, "Download failed: {:#}", e);
            }
        }
    }

    Ok(outcome)
}

/// Delete every selected asset after a single confirmation
///
/// An empty selection is reported without asking. Otherwise the operator is
/// asked exactly once; any answer other than `yes` cancels the whole batch.
///
/// # Errors
///
/// Returns an error only if the confirmation cannot be read. Failures of
/// single deletions are counted in the returned outcome.
pub async fn delete_all(
    library: &dyn PhotoLibrary,
    selection: Selection,
    prompter: &mut dyn Prompter,
) -> Result<DeleteOutcome> {
    let total = selection.len();
    let mut outcome = RunOutcome {
        considered: selection.considered,
        matched: total,
        undated: selection.undated,
        ..Default::default()
    };

    println!("{}", delete_count_message(total));
    if total == 0 {
        return Ok(DeleteOutcome::Completed(outcome));
    }

    let answer = prompter.ask(DELETE_CONFIRMATION_PROMPT)?;
    if !is_affirmative(&answer) {
        tracing::info!(matched = total, "Deletion declined");
        return Ok(DeleteOutcome::Canceled { matched: total });
    }

    for asset in &selection.assets {
        match library.delete(asset).await {
            Ok(()) => {
                outcome.succeeded += 1;
                println!("Deleted {}", asset.filename);
            }
            Err(e) => {
                outcome.failed += 1;
                eprintln!("Failed to delete {}: {:#}", asset.filename, e);
                tracing::warn!(asset = %asset.id, "Delete failed: {:#}", e);
            }
        }
    }

    Ok(DeleteOutcome::Completed(outcome))
}
