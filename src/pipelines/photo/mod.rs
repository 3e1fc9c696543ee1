// SPDX-License-Identifier: GPL-3.0-only

//! Shutter pipeline
//!
//! ```text
//! FrameSource → exposure loop → PNG encode → export (share / download)
//!                                          → photo store
//!       ↓
//! preview keeps rendering into its own surface
//! ```
//!
//! A shot only fails as a whole when nothing could be encoded. Export and
//! storage problems after a successful encode are reported in the
//! [`ShotReport`] and never discard the artifact.

pub mod capture;
pub mod encoding;

pub use capture::CaptureOrchestrator;
pub use encoding::{CaptureMetadata, CapturedArtifact, PhotoEncoder, PngEncoder, StillEncoder};

use crate::backends::camera::FrameSource;
use crate::config::Config;
use crate::errors::PhotoError;
use crate::export::{DownloadTarget, ExportOutcome, Exporter, SystemShare};
use crate::exposure::ExposureRecipe;
use crate::render::{RenderPipeline, compositor};
use crate::session::Session;
use crate::storage::{PhotoStore, RecordMetadata, open_photo_store};
use crate::timing::{CancelFlag, Clock};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What happened to one shutter press
#[derive(Debug, Clone)]
pub struct ShotReport {
    pub artifact: CapturedArtifact,
    pub filename: String,
    pub export: Result<ExportOutcome, PhotoError>,
    /// Record id, or the storage error message
    pub stored: Result<String, String>,
}

impl ShotReport {
    /// One-line summary for the CLI and the status bar
    pub fn summary(&self) -> String {
        let export = match &self.export {
            Ok(ExportOutcome::Shared { target }) => format!("shared via {}", target),
            Ok(ExportOutcome::Downloaded { path }) => format!("saved to {}", path.display()),
            Err(e) => format!("export failed: {}", e),
        };
        let stored = match &self.stored {
            Ok(id) => format!("stored as {}", id),
            Err(e) => format!("not stored: {}", e),
        };
        format!("{} ({}, {})", self.filename, export, stored)
    }
}

/// Capture, export and store in one call
#[derive(Clone)]
pub struct PhotoBooth {
    orchestrator: CaptureOrchestrator,
    exporter: Exporter,
    store: Arc<dyn PhotoStore>,
}

impl PhotoBooth {
    pub fn new(
        orchestrator: CaptureOrchestrator,
        exporter: Exporter,
        store: Arc<dyn PhotoStore>,
    ) -> Self {
        Self {
            orchestrator,
            exporter,
            store,
        }
    }

    /// Booth wired from the user's configuration
    ///
    /// Photos go to the system viewer when `share` is set, otherwise (and
    /// whenever that fails) into the downloads directory.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>, share: bool) -> Self {
        let pipeline = RenderPipeline::new(compositor::probe(config.compositor));
        let orchestrator = CaptureOrchestrator::from_config(config, pipeline, clock);
        let download = DownloadTarget::new(config.download_directory());
        let exporter = if share {
            Exporter::new(Some(Arc::new(SystemShare::in_temp_dir())), download)
        } else {
            Exporter::download_only(download)
        };
        Self::new(orchestrator, exporter, open_photo_store(config))
    }

    pub fn orchestrator(&self) -> &CaptureOrchestrator {
        &self.orchestrator
    }

    pub fn store(&self) -> Arc<dyn PhotoStore> {
        Arc::clone(&self.store)
    }

    /// Take a photo with the session's current settings
    ///
    /// Ok(None) when the camera had no frame yet.
    pub async fn shoot(
        &self,
        source: &dyn FrameSource,
        session: &Session,
        recipe: &ExposureRecipe,
        cancel: &CancelFlag,
    ) -> Result<Option<ShotReport>, PhotoError> {
        let artifact = match self.orchestrator.capture(source, session, recipe, cancel).await {
            Ok(Some(artifact)) => artifact,
            Ok(None) => return Ok(None),
            Err(e) => {
                error!(error = %e, "Capture failed");
                return Err(e);
            }
        };

        let filename = artifact.filename();
        let bytes = artifact.shared_bytes();

        let exporter = self.exporter.clone();
        let export_bytes = Arc::clone(&bytes);
        let export_name = filename.clone();
        let export = tokio::task::spawn_blocking(move || exporter.export(&export_bytes, &export_name))
            .await
            .unwrap_or_else(|e| Err(PhotoError::ExportFailed(format!("Export task error: {}", e))));
        if let Err(e) = &export {
            warn!(error = %e, filename = %filename, "Export failed");
        }

        let store = Arc::clone(&self.store);
        let metadata = RecordMetadata::from_artifact(&artifact);
        let stored = tokio::task::spawn_blocking(move || store.save(&bytes, metadata))
            .await
            .map_err(|e| format!("Storage task error: {}", e))
            .and_then(|result| result.map_err(|e| e.to_string()));
        match &stored {
            Ok(id) => info!(id = %id, store = self.store.kind(), "Shot stored"),
            Err(e) => warn!(error = %e, "Shot not stored"),
        }

        Ok(Some(ShotReport {
            artifact,
            filename,
            export,
            stored,
        }))
    }
}
