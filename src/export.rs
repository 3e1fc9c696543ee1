// SPDX-License-Identifier: GPL-3.0-only

//! Handing captures to the user
//!
//! A share target passes the file to the platform (here: the system's default
//! handler). Whenever that is unavailable or fails, the file is written to the
//! downloads directory instead.

use crate::errors::PhotoError;
use crate::naming::gallery_filename;
use crate::storage::PhotoRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Platform hand-off for a finished file
pub trait ShareTarget: Send + Sync {
    fn name(&self) -> &'static str;

    fn share(&self, bytes: &[u8], filename: &str) -> Result<(), PhotoError>;
}

/// Writes into a staging directory and opens the file with the system handler
#[derive(Debug, Clone)]
pub struct SystemShare {
    staging_dir: PathBuf,
}

impl SystemShare {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    /// Staging under the system temp directory
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join(crate::constants::app_info::APP_DIR_NAME))
    }
}

impl ShareTarget for SystemShare {
    fn name(&self) -> &'static str {
        "system"
    }

    fn share(&self, bytes: &[u8], filename: &str) -> Result<(), PhotoError> {
        std::fs::create_dir_all(&self.staging_dir)
            .map_err(|e| PhotoError::ExportFailed(format!("staging directory: {}", e)))?;
        let path = self.staging_dir.join(filename);
        std::fs::write(&path, bytes)
            .map_err(|e| PhotoError::ExportFailed(format!("{}: {}", path.display(), e)))?;
        open::that(&path)
            .map_err(|e| PhotoError::ExportFailed(format!("no handler for {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Photo handed to system viewer");
        Ok(())
    }
}

/// Direct file download
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    dir: PathBuf,
}

impl DownloadTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` as `filename`, adding ` (n)` when the name is taken
    pub fn save(&self, bytes: &[u8], filename: &str) -> Result<PathBuf, PhotoError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| PhotoError::ExportFailed(format!("{}: {}", self.dir.display(), e)))?;
        let path = unique_path(&self.dir, filename);
        std::fs::write(&path, bytes)
            .map_err(|e| PhotoError::ExportFailed(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), size = bytes.len(), "Photo downloaded");
        Ok(path)
    }
}

fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, extension) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (filename, String::new()),
    };
    (1..)
        .map(|n| dir.join(format!("{} ({}){}", stem, n, extension)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// How an export ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Shared { target: &'static str },
    Downloaded { path: PathBuf },
}

/// Share with download fallback
#[derive(Clone)]
pub struct Exporter {
    share: Option<Arc<dyn ShareTarget>>,
    download: DownloadTarget,
}

impl Exporter {
    pub fn new(share: Option<Arc<dyn ShareTarget>>, download: DownloadTarget) -> Self {
        Self { share, download }
    }

    /// Download only
    pub fn download_only(download: DownloadTarget) -> Self {
        Self::new(None, download)
    }

    pub fn export(&self, bytes: &[u8], filename: &str) -> Result<ExportOutcome, PhotoError> {
        if let Some(share) = &self.share {
            match share.share(bytes, filename) {
                Ok(()) => {
                    return Ok(ExportOutcome::Shared {
                        target: share.name(),
                    });
                }
                Err(e) => {
                    warn!(share_target = share.name(), error = %e, "Share failed, downloading instead")
                }
            }
        }
        let path = self.download.save(bytes, filename)?;
        Ok(ExportOutcome::Downloaded { path })
    }

    /// Export a stored photo under its gallery name
    pub fn export_record(&self, record: &PhotoRecord) -> Result<ExportOutcome, PhotoError> {
        let summary = &record.summary;
        let filename = gallery_filename(
            summary.created_at,
            summary.metadata.aperture,
            summary.metadata.bpm,
        );
        self.export(&record.bytes, &filename)
    }
}
