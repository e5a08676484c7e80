//! Bundle snapshots.
//!
//! Fetched bundles are written as
//! `{dir}/{athlete}/appearances.json` and `{dir}/{athlete}/bouts.json`.
//! A snapshot directory can be replayed through [`SnapshotSource`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::StorageError;
use crate::fetch::FetchError;
use crate::models::{AthleteId, Bundle};
use crate::sync::{AthleteSource, OnPercent};

pub const APPEARANCES: &str = "appearances";
pub const BOUTS: &str = "bouts";

/// Path of one stage's snapshot.
pub fn bundle_path(dir: &Path, athlete: &AthleteId, stage: &str) -> PathBuf {
    dir.join(athlete.as_str()).join(format!("{}.json", stage))
}

/// Write a bundle, replacing any earlier snapshot of the same stage.
pub async fn write_bundle(
    dir: &Path,
    athlete: &AthleteId,
    stage: &str,
    bundle: &Bundle,
) -> Result<PathBuf, StorageError> {
    let path = bundle_path(dir, athlete, stage);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_vec_pretty(bundle)?;
    tokio::fs::write(&path, json).await?;
    debug!("Snapshot {} written ({} records)", path.display(), bundle.primary.len());

    Ok(path)
}

/// Read a bundle snapshot.
pub async fn read_bundle(
    dir: &Path,
    athlete: &AthleteId,
    stage: &str,
) -> Result<Bundle, StorageError> {
    let path = bundle_path(dir, athlete, stage);
    if !tokio::fs::try_exists(&path).await? {
        return Err(StorageError::PathNotFound(path));
    }

    let bytes = tokio::fs::read(&path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Athletes with at least one snapshot under `dir`.
pub fn list_athletes(dir: &Path) -> Result<Vec<AthleteId>, StorageError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut athletes: Vec<AthleteId> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| AthleteId::parse(&entry.file_name().to_string_lossy()))
        .collect();
    athletes.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    Ok(athletes)
}

impl From<StorageError> for FetchError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => FetchError::Io(e),
            StorageError::Json(e) => FetchError::Json(e),
            StorageError::PathNotFound(path) => FetchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no snapshot at {}", path.display()),
            )),
        }
    }
}

/// Replays snapshots written by earlier loads.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    dir: PathBuf,
}

impl SnapshotSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    async fn read(
        &self,
        athlete: &AthleteId,
        stage: &str,
        on_progress: OnPercent<'_>,
    ) -> Result<Bundle, FetchError> {
        let bundle = read_bundle(&self.dir, athlete, stage).await?;
        on_progress(100.0);
        info!(
            "Replayed {} {} for {}",
            bundle.primary.len(),
            stage,
            athlete
        );
        Ok(bundle)
    }
}

#[async_trait]
impl AthleteSource for SnapshotSource {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn fetch_appearances(
        &self,
        athlete: &AthleteId,
        on_progress: OnPercent<'_>,
    ) -> Result<Bundle, FetchError> {
        self.read(athlete, APPEARANCES, on_progress).await
    }

    async fn fetch_bouts(
        &self,
        athlete: &AthleteId,
        on_progress: OnPercent<'_>,
    ) -> Result<Bundle, FetchError> {
        self.read(athlete, BOUTS, on_progress).await
    }
}
